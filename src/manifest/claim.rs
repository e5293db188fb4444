//! Claim: the signed core of a manifest
//!
//! Two CBOR dialects exist in the wild; both are recognized on read, and
//! the dialect written is an explicit setting on the claim.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Claim dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimVersion {
    /// `c2pa.claim` box label, v1 field set
    #[default]
    V1,
    /// `c2pa.claim.v2` box label, v2 field set
    V2,
}

impl ClaimVersion {
    /// The box label this dialect is stored under
    pub fn box_label(&self) -> &'static str {
        match self {
            Self::V1 => super::CLAIM_LABEL_V1,
            Self::V2 => super::CLAIM_LABEL_V2,
        }
    }
}

/// A reference to other content: a JUMBF URI plus a digest of the
/// referenced bytes under a named algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedUri {
    /// JUMBF URI of the referenced box
    pub url: String,
    /// Digest algorithm, when it differs from the claim's declared one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Digest over the referenced box's exact bytes
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
}

impl HashedUri {
    /// Create a hashed reference
    pub fn new(url: String, alg: Option<String>, hash: Vec<u8>) -> Self {
        Self { url, alg, hash }
    }
}

/// A claim: generator info, the signature reference, and the ordered list
/// of assertion references, sealed by the COSE signature next to it
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Dialect used when this claim is serialized
    pub version: ClaimVersion,
    /// Product string of the generator
    pub claim_generator: String,
    /// Asset title, if declared
    pub title: Option<String>,
    /// MIME type of the asset the claim binds to
    pub format: String,
    /// Unique id for this instance of the asset
    pub instance_id: String,
    /// Declared digest algorithm for assertion references
    pub alg: String,
    /// JUMBF URI of the claim signature box
    pub signature_ref: String,
    /// Ordered assertion references (v2: created assertions)
    pub assertions: Vec<HashedUri>,
    /// Assertions gathered from elsewhere (v2 only)
    pub gathered_assertions: Vec<HashedUri>,
}

// v1 wire schema
#[derive(Serialize, Deserialize)]
struct ClaimV1Cbor {
    claim_generator: String,
    #[serde(rename = "dc:title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "dc:format")]
    format: String,
    #[serde(rename = "instanceID")]
    instance_id: String,
    alg: String,
    signature: String,
    assertions: Vec<HashedUri>,
}

// v2 wire schema
#[derive(Serialize, Deserialize)]
struct ClaimV2Cbor {
    #[serde(rename = "instanceID")]
    instance_id: String,
    claim_generator_info: Vec<ClaimGeneratorInfo>,
    #[serde(rename = "dc:title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "dc:format")]
    format: String,
    alg: String,
    signature: String,
    created_assertions: Vec<HashedUri>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    gathered_assertions: Vec<HashedUri>,
}

#[derive(Serialize, Deserialize)]
struct ClaimGeneratorInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl Claim {
    /// Create an empty claim for the given generator and asset format
    pub fn new(
        claim_generator: impl Into<String>,
        format: impl Into<String>,
        version: ClaimVersion,
    ) -> Self {
        let instance_id = format!(
            "xmp:iid:{}",
            hex::encode(crate::crypto::random_bytes(16))
        );
        Self {
            version,
            claim_generator: claim_generator.into(),
            title: None,
            format: format.into(),
            instance_id,
            alg: crate::crypto::HashAlgorithm::Sha256.name().to_string(),
            signature_ref: super::self_uri(super::SIGNATURE_LABEL),
            assertions: Vec::new(),
            gathered_assertions: Vec::new(),
        }
    }

    /// Declared digest algorithm
    pub fn hash_alg(&self) -> Result<crate::crypto::HashAlgorithm> {
        crate::crypto::HashAlgorithm::from_name(&self.alg)
    }

    /// Append an assertion reference, preserving insertion order
    pub fn add_assertion_ref(&mut self, hashed_uri: HashedUri) {
        self.assertions.push(hashed_uri);
    }

    /// Serialize to claim CBOR in this claim's dialect
    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match self.version {
            ClaimVersion::V1 => {
                let wire = ClaimV1Cbor {
                    claim_generator: self.claim_generator.clone(),
                    title: self.title.clone(),
                    format: self.format.clone(),
                    instance_id: self.instance_id.clone(),
                    alg: self.alg.clone(),
                    signature: self.signature_ref.clone(),
                    assertions: self.assertions.clone(),
                };
                ciborium::ser::into_writer(&wire, &mut bytes)
            }
            ClaimVersion::V2 => {
                let wire = ClaimV2Cbor {
                    instance_id: self.instance_id.clone(),
                    claim_generator_info: vec![ClaimGeneratorInfo {
                        name: self.claim_generator.clone(),
                        version: None,
                    }],
                    title: self.title.clone(),
                    format: self.format.clone(),
                    alg: self.alg.clone(),
                    signature: self.signature_ref.clone(),
                    created_assertions: self.assertions.clone(),
                    gathered_assertions: self.gathered_assertions.clone(),
                };
                ciborium::ser::into_writer(&wire, &mut bytes)
            }
        }
        .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
        Ok(bytes)
    }

    /// Parse claim CBOR in the dialect implied by the box label
    pub fn from_cbor_bytes(version: ClaimVersion, bytes: &[u8]) -> Result<Self> {
        match version {
            ClaimVersion::V1 => {
                let wire: ClaimV1Cbor = ciborium::de::from_reader(bytes)
                    .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
                Ok(Self {
                    version,
                    claim_generator: wire.claim_generator,
                    title: wire.title,
                    format: wire.format,
                    instance_id: wire.instance_id,
                    alg: wire.alg,
                    signature_ref: wire.signature,
                    assertions: wire.assertions,
                    gathered_assertions: Vec::new(),
                })
            }
            ClaimVersion::V2 => {
                let wire: ClaimV2Cbor = ciborium::de::from_reader(bytes)
                    .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
                let claim_generator = wire
                    .claim_generator_info
                    .into_iter()
                    .next()
                    .map(|info| info.name)
                    .ok_or_else(|| Error::ClaimDecoding("claim_generator_info is empty".into()))?;
                Ok(Self {
                    version,
                    claim_generator,
                    title: wire.title,
                    format: wire.format,
                    instance_id: wire.instance_id,
                    alg: wire.alg,
                    signature_ref: wire.signature,
                    assertions: wire.created_assertions,
                    gathered_assertions: wire.gathered_assertions,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claim(version: ClaimVersion) -> Claim {
        let mut claim = Claim::new("provenance-core/0.1.0", "image/jpeg", version);
        claim.title = Some("test asset".into());
        claim.add_assertion_ref(HashedUri::new(
            "self#jumbf=c2pa.assertions/c2pa.hash.data".into(),
            None,
            vec![0xAB; 32],
        ));
        claim.add_assertion_ref(HashedUri::new(
            "self#jumbf=c2pa.assertions/c2pa.actions".into(),
            Some("sha256".into()),
            vec![0xCD; 32],
        ));
        claim
    }

    #[test]
    fn test_v1_round_trip() {
        let claim = sample_claim(ClaimVersion::V1);
        let bytes = claim.to_cbor_bytes().unwrap();
        let parsed = Claim::from_cbor_bytes(ClaimVersion::V1, &bytes).unwrap();
        assert_eq!(parsed, claim);
    }

    #[test]
    fn test_v2_round_trip() {
        let claim = sample_claim(ClaimVersion::V2);
        let bytes = claim.to_cbor_bytes().unwrap();
        let parsed = Claim::from_cbor_bytes(ClaimVersion::V2, &bytes).unwrap();
        assert_eq!(parsed, claim);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let claim = sample_claim(ClaimVersion::V1);
        assert_eq!(claim.to_cbor_bytes().unwrap(), claim.to_cbor_bytes().unwrap());
    }

    #[test]
    fn test_assertion_order_preserved() {
        let claim = sample_claim(ClaimVersion::V1);
        let bytes = claim.to_cbor_bytes().unwrap();
        let parsed = Claim::from_cbor_bytes(ClaimVersion::V1, &bytes).unwrap();
        assert_eq!(
            parsed.assertions[0].url,
            "self#jumbf=c2pa.assertions/c2pa.hash.data"
        );
        assert_eq!(
            parsed.assertions[1].url,
            "self#jumbf=c2pa.assertions/c2pa.actions"
        );
    }

    #[test]
    fn test_hash_is_cbor_byte_string() {
        // serde_bytes must produce a byte string (major type 2), not an array
        let claim = sample_claim(ClaimVersion::V1);
        let bytes = claim.to_cbor_bytes().unwrap();
        let value: ciborium::Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        let map = value.as_map().unwrap();
        let assertions = map
            .iter()
            .find(|(k, _)| k.as_text() == Some("assertions"))
            .map(|(_, v)| v)
            .unwrap();
        let first = &assertions.as_array().unwrap()[0];
        let hash = first
            .as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_text() == Some("hash"))
            .map(|(_, v)| v)
            .unwrap();
        assert!(hash.is_bytes());
    }
}
