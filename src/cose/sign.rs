//! COSE_Sign1 generation over claim bytes

use crate::{
    error::{Error, Result},
    manifest::ClaimVersion,
    time_stamp::{build_request, timestamp_token_der, TstContainer},
};
use ciborium::value::Value;
use coset::{CoseSign1, CoseSign1Builder, HeaderBuilder, Label, TaggedCborSerializable};

use super::{cose_alg, signer::Signer, verify::ValidationOptions, CLAIM_CONTENT_TYPE};

/// Generate a COSE signature for claim bytes, padded to exactly fill the
/// reserved signature box.
///
/// The claim must already be well-formed CBOR; the signature is verified
/// before being returned so a broken signer backend cannot produce an
/// unverifiable manifest.
pub fn sign_claim(
    claim_bytes: &[u8],
    signer: &dyn Signer,
    version: ClaimVersion,
    box_size: usize,
) -> Result<Vec<u8>> {
    let _: Value = ciborium::de::from_reader(claim_bytes)
        .map_err(|e| Error::ClaimDecoding(e.to_string()))?;

    let sig = cose_sign(signer, claim_bytes, version, box_size)?;

    // Sanity check: the signature must verify against its own chain
    super::verify::verify_cose(&sig, claim_bytes, &ValidationOptions::default())?;

    Ok(sig)
}

/// Returns tagged COSE_Sign1 bytes for `data` with a detached payload.
///
/// Protected headers: `alg`, content type, and the signer's `x5chain`.
/// Unprotected headers: the RFC 3161 countersignature (when the signer has
/// a time authority) and the zero padding that brings the structure to
/// `box_size` bytes.
pub fn cose_sign(
    signer: &dyn Signer,
    data: &[u8],
    version: ClaimVersion,
    box_size: usize,
) -> Result<Vec<u8>> {
    let alg = signer.alg();
    let certs = signer.certs()?;
    if certs.is_empty() {
        return Err(Error::CoseStructure("signer returned no certificates".into()));
    }

    // A single certificate is a bare byte string; a chain is an array
    let x5chain = match certs.len() {
        1 => Value::Bytes(certs[0].clone()),
        _ => Value::Array(certs.into_iter().map(Value::Bytes).collect()),
    };

    let protected = HeaderBuilder::new()
        .algorithm(cose_alg(alg))
        .content_type(CLAIM_CONTENT_TYPE.to_string())
        .text_value("x5chain".to_string(), x5chain)
        .build();

    let aad = b"";
    let mut sign1 = CoseSign1Builder::new()
        .protected(protected)
        .payload(data.to_vec())
        .try_create_signature(aad, |to_be_signed| signer.sign(to_be_signed))?
        .build();

    // The countersignature covers the signature value, so it lands in the
    // unprotected bucket after signing
    if let Some(time_authority) = signer.time_authority() {
        let req = build_request(alg.hash_alg(), &sign1.signature)?;
        let resp = time_authority.get_signed_timestamp(&req)?;
        let token = timestamp_token_der(&resp)?;

        let mut container_bytes = Vec::new();
        ciborium::ser::into_writer(&TstContainer::new(token), &mut container_bytes)
            .map_err(|e| Error::CoseStructure(e.to_string()))?;
        let container: Value = ciborium::de::from_reader(container_bytes.as_slice())
            .map_err(|e| Error::CoseStructure(e.to_string()))?;

        let label = match version {
            ClaimVersion::V1 => "sigTst",
            ClaimVersion::V2 => "sigTst2",
        };
        sign1
            .unprotected
            .rest
            .push((Label::Text(label.to_string()), container));
    }

    sign1.payload = None; // the payload is carried by the claim box

    pad_cose_sig(&mut sign1, box_size)
}

const PAD_LABEL: &str = "pad";
const PAD2_LABEL: &str = "pad2";
const PAD_OFFSET: usize = 7;

// Pad the CoseSign1 structure with 0s to match the reserved box size.
// Some sizes are impossible to hit with a single padding because the CBOR
// byte-string header length jumps; a second padding shifts the breakpoints.
fn pad_cose_sig(sign1: &mut CoseSign1, end_size: usize) -> Result<Vec<u8>> {
    let serialize = |sign1: &CoseSign1| {
        sign1
            .clone()
            .to_tagged_vec()
            .map_err(|e| Error::CoseStructure(e.to_string()))
    };

    let cur_vec = serialize(sign1)?;
    let cur_size = cur_vec.len();

    if cur_size == end_size {
        return Ok(cur_vec);
    }

    if cur_size + PAD_OFFSET > end_size {
        return Err(Error::SignatureBoxTooSmall {
            needed: cur_size + PAD_OFFSET,
            reserved: end_size,
        });
    }

    // Start close to the target, accounting for the label and header bytes
    let mut target_guess = end_size - cur_size - PAD_OFFSET;
    let mut last_pad = 0;
    loop {
        let mut padded = sign1.clone();
        padded
            .unprotected
            .rest
            .push((Label::Text(PAD_LABEL.to_string()), Value::Bytes(vec![0u8; target_guess])));

        let new_size = serialize(&padded)?.len();
        if new_size == end_size {
            return serialize(&padded);
        }
        if new_size > end_size {
            break;
        }
        last_pad = target_guess;
        target_guess += 1;
    }

    // Single padding jumped over the target; fix the first padding and let
    // a second one land on it
    sign1
        .unprotected
        .rest
        .push((Label::Text(PAD_LABEL.to_string()), Value::Bytes(vec![0u8; last_pad.saturating_sub(10)])));

    let mut pad2 = 0usize;
    loop {
        let mut padded = sign1.clone();
        padded
            .unprotected
            .rest
            .push((Label::Text(PAD2_LABEL.to_string()), Value::Bytes(vec![0u8; pad2])));
        let new_size = serialize(&padded)?.len();
        if new_size == end_size {
            return serialize(&padded);
        }
        if new_size > end_size {
            return Err(Error::CoseStructure(
                "cannot pad signature to reserved size".into(),
            ));
        }
        pad2 += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cose::LocalSigner;
    use crate::crypto::SigningAlg;

    fn test_signer() -> LocalSigner {
        let mut params = rcgen::CertificateParams::new(vec!["Claim Signer".to_string()]);
        params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
        let cert = rcgen::Certificate::from_params(params).unwrap();
        let cert_der = cert.serialize_der().unwrap();
        let key_der = cert.serialize_private_key_der();
        let keypair =
            crate::crypto::SigningKeyPair::from_pkcs8_der(SigningAlg::Es256, &key_der).unwrap();
        LocalSigner::new(keypair, vec![cert_der])
    }

    fn claim_cbor() -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(
            &Value::Map(vec![(
                Value::Text("claim_generator".into()),
                Value::Text("test/1.0".into()),
            )]),
            &mut bytes,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn test_signature_fills_reserved_box_exactly() {
        let signer = test_signer();
        let claim = claim_cbor();

        for box_size in [2048usize, 2049, 2050, 2051, 4096] {
            let sig = sign_claim(&claim, &signer, ClaimVersion::V1, box_size).unwrap();
            assert_eq!(sig.len(), box_size, "target {box_size}");
        }
    }

    #[test]
    fn test_box_too_small_rejected() {
        let signer = test_signer();
        let result = sign_claim(&claim_cbor(), &signer, ClaimVersion::V1, 64);
        assert!(matches!(result, Err(Error::SignatureBoxTooSmall { .. })));
    }

    #[test]
    fn test_payload_is_detached() {
        let signer = test_signer();
        let sig = sign_claim(&claim_cbor(), &signer, ClaimVersion::V1, 2048).unwrap();
        let parsed = CoseSign1::from_tagged_slice(&sig).unwrap();
        assert!(parsed.payload.is_none());
    }

    #[test]
    fn test_garbage_claim_rejected() {
        let signer = test_signer();
        assert!(matches!(
            sign_claim(&[0xbf, 0x00], &signer, ClaimVersion::V1, 2048),
            Err(Error::ClaimDecoding(_))
        ));
    }
}
