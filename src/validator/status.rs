//! Validation outcomes and their stable codes

/// Stable status codes recorded by the validator
pub mod codes {
    pub const CLAIM_SIGNATURE_VALIDATED: &str = "claimSignature.validated";
    pub const CLAIM_SIGNATURE_MISMATCH: &str = "claimSignature.mismatch";
    pub const SIGNING_CREDENTIAL_TRUSTED: &str = "signingCredential.trusted";
    pub const SIGNING_CREDENTIAL_UNTRUSTED: &str = "signingCredential.untrusted";
    pub const ALGORITHM_UNSUPPORTED: &str = "algorithm.unsupported";
    pub const ASSERTION_HASHED_URI_MATCH: &str = "assertion.hashedURI.match";
    pub const ASSERTION_HASHED_URI_MISMATCH: &str = "assertion.hashedURI.mismatch";
    pub const ASSERTION_MISSING: &str = "assertion.missing";
    pub const ASSERTION_UNDECODABLE: &str = "assertion.undecodable";
    pub const ASSERTION_DATA_HASH_MATCH: &str = "assertion.dataHash.match";
    pub const ASSERTION_DATA_HASH_MISMATCH: &str = "assertion.dataHash.mismatch";
    pub const ASSERTION_BMFF_HASH_MATCH: &str = "assertion.bmffHash.match";
    pub const ASSERTION_BMFF_HASH_MISMATCH: &str = "assertion.bmffHash.mismatch";
    pub const TIMESTAMP_TRUSTED: &str = "timeStamp.trusted";
    pub const TIMESTAMP_MISMATCH: &str = "timeStamp.mismatch";
    pub const INGREDIENT_MANIFEST_VALIDATED: &str = "ingredient.manifest.validated";
    pub const INGREDIENT_MANIFEST_MISMATCH: &str = "ingredient.manifest.mismatch";
    pub const INGREDIENT_MANIFEST_MISSING: &str = "ingredient.manifest.missing";
}

/// One recorded check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Stable status code
    pub code: String,
    /// JUMBF URI of the subject, when one exists
    pub url: Option<String>,
    /// Human-readable detail
    pub explanation: String,
    /// Whether the check passed
    pub success: bool,
}

/// Ordered list of everything the validator checked
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Results in check order
    pub results: Vec<ValidationResult>,
    /// Label of the active manifest, when the store had one
    pub active_manifest: Option<String>,
}

impl ValidationReport {
    /// Record a passed check
    pub fn pass(&mut self, code: &str, url: Option<String>, explanation: impl Into<String>) {
        self.push(code, url, explanation, true);
    }

    /// Record a failed check
    pub fn fail(&mut self, code: &str, url: Option<String>, explanation: impl Into<String>) {
        self.push(code, url, explanation, false);
    }

    fn push(&mut self, code: &str, url: Option<String>, explanation: impl Into<String>, success: bool) {
        let explanation = explanation.into();
        tracing::debug!(code, success, %explanation, "validation result");
        self.results.push(ValidationResult {
            code: code.to_string(),
            url,
            explanation,
            success,
        });
    }

    /// Whether every recorded check passed
    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.success)
    }

    /// The failed checks, in order
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|result| !result.success)
    }
}
