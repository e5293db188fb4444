//! COSE_Sign1 verification

use crate::{
    crypto::{validate_chain, verify_raw, SigningAlg},
    error::{Error, Result},
    time_stamp::{verify_timestamp_token, TstContainer, VerifiedTimestamp},
};
use ciborium::value::Value;
use coset::{CborSerializable, CoseSign1, Label, TaggedCborSerializable};
use der::Decode as _;
use x509_cert::Certificate;

use super::signing_alg_from_cose;

/// Knobs for signature acceptance
///
/// All configuration is by explicit parameter; nothing here reads the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// DER trust anchors the chain must reach; empty delegates the trust
    /// decision to the caller
    pub trust_anchors_der: Vec<Vec<u8>>,
    /// Algorithms accepted for the leaf signature; `None` allows the full
    /// supported set. Chain certificates are exempt from this restriction.
    pub allowed_algs: Option<Vec<SigningAlg>>,
}

impl ValidationOptions {
    fn alg_allowed(&self, alg: SigningAlg) -> bool {
        match &self.allowed_algs {
            Some(allowed) => allowed.contains(&alg),
            None => true,
        }
    }
}

/// What a verified COSE signature tells us
#[derive(Debug)]
pub struct CoseValidationInfo {
    /// Signature algorithm of the leaf
    pub alg: SigningAlg,
    /// DER certificate chain from the x5chain header, leaf first
    pub cert_chain_der: Vec<Vec<u8>>,
    /// Subject of the signing certificate
    pub signer_subject: Option<String>,
    /// Countersignature verification outcome, when a token is present
    pub timestamp: Option<Result<VerifiedTimestamp>>,
}

/// Verify a COSE_Sign1 over `payload`.
///
/// Reconstructs the Sig_structure from the original protected-header bytes,
/// enforces the algorithm allow-list on the leaf only, verifies the
/// signature through the crypto provider, walks the x5chain, and checks any
/// embedded timestamp token. Chain certificates may use algorithms outside
/// the allow-list; only the leaf signature is restricted.
pub fn verify_cose(
    cose_bytes: &[u8],
    payload: &[u8],
    opts: &ValidationOptions,
) -> Result<CoseValidationInfo> {
    let sign1 = CoseSign1::from_tagged_slice(cose_bytes)
        .or_else(|_| CoseSign1::from_slice(cose_bytes))
        .map_err(|e| Error::CoseStructure(e.to_string()))?;

    let alg = sign1
        .protected
        .header
        .alg
        .as_ref()
        .and_then(signing_alg_from_cose)
        .ok_or_else(|| Error::UnsupportedAlgorithm("missing or unknown alg header".into()))?;

    if !opts.alg_allowed(alg) {
        return Err(Error::SignatureAlgorithmDisallowed(alg.to_string()));
    }

    let cert_chain_der = extract_x5chain(&sign1)?;
    let leaf = Certificate::from_der(&cert_chain_der[0])?;

    // The exact bytes both sides sign: Sig_structure over the original
    // protected header encoding
    let embedded = sign1.payload.clone();
    let tbs_payload = embedded.as_deref().unwrap_or(payload);
    let to_be_signed = coset::sig_structure_data(
        coset::SignatureContext::CoseSign1,
        sign1.protected.clone(),
        None,
        b"",
        tbs_payload,
    );

    let verified = verify_raw(
        alg,
        &leaf.tbs_certificate.subject_public_key_info,
        &to_be_signed,
        &sign1.signature,
    )?;
    if !verified {
        return Err(Error::SignatureInvalid);
    }

    validate_chain(&cert_chain_der, &opts.trust_anchors_der)?;

    let timestamp = extract_timestamp_token(&sign1).map(|token| {
        verify_timestamp_token(&token, &sign1.signature, None, &opts.trust_anchors_der)
    });

    Ok(CoseValidationInfo {
        alg,
        signer_subject: Some(leaf.tbs_certificate.subject.to_string()),
        cert_chain_der,
        timestamp,
    })
}

// x5chain lives in the protected headers; legacy writers put it in the
// unprotected bucket, and some use the registered integer label 33
fn extract_x5chain(sign1: &CoseSign1) -> Result<Vec<Vec<u8>>> {
    let find = |rest: &[(Label, Value)]| {
        rest.iter()
            .find(|(label, _)| {
                matches!(label, Label::Text(text) if text == "x5chain")
                    || matches!(label, Label::Int(33))
            })
            .map(|(_, value)| value.clone())
    };

    let value = find(&sign1.protected.header.rest)
        .or_else(|| find(&sign1.unprotected.rest))
        .ok_or_else(|| Error::CoseStructure("no x5chain header".into()))?;

    let certs = match value {
        Value::Bytes(single) => vec![single],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Bytes(der_bytes) => Ok(der_bytes),
                _ => Err(Error::CoseStructure("x5chain entry is not a byte string".into())),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(Error::CoseStructure("x5chain has unexpected shape".into())),
    };

    if certs.is_empty() {
        return Err(Error::CoseStructure("x5chain is empty".into()));
    }
    Ok(certs)
}

fn extract_timestamp_token(sign1: &CoseSign1) -> Option<Vec<u8>> {
    let container_value = sign1
        .unprotected
        .rest
        .iter()
        .find(|(label, _)| {
            matches!(label, Label::Text(text) if text == "sigTst" || text == "sigTst2")
        })
        .map(|(_, value)| value.clone())?;

    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&container_value, &mut bytes).ok()?;
    let container: TstContainer = ciborium::de::from_reader(bytes.as_slice()).ok()?;
    container.tst_tokens.into_iter().next().map(|token| token.val)
}
