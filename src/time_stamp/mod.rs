//! RFC 3161 timestamping
//!
//! Request building, token verification, and the CMS structures a token is
//! made of. Providers implement [`TimestampProvider`]; the engine only
//! fixes the request/response byte contract, never the transport.

mod asn1;
mod local;

pub use asn1::{
    Accuracy, ContentInfo, EncapsulatedContentInfo, IssuerAndSerialNumber, MessageImprint,
    PkiStatusInfo, SignedData, SignerInfo, TimeStampReq, TimeStampResp, TstInfo,
};
pub use local::LocalTimestamper;

use crate::{
    crypto::{
        hash, hash_alg_for_oid, random_bytes, validate_chain, verify_with_sig_oid,
        HashAlgorithm, ID_CT_TST_INFO_OID, ID_MESSAGE_DIGEST_OID, ID_SIGNED_DATA_OID,
    },
    error::{Error, Result, TimestampFailure},
};
use der::{asn1::OctetString, Decode, Encode};
use serde::{Deserialize, Serialize};
use x509_cert::{spki::AlgorithmIdentifierOwned, Certificate};

/// PKIStatus granted
pub const STATUS_GRANTED: u32 = 0;
/// PKIStatus grantedWithMods
pub const STATUS_GRANTED_WITH_MODS: u32 = 1;

/// Source of signed timestamps
pub trait TimestampProvider {
    /// Produce a `TimeStampResp` for the request
    fn get_signed_timestamp(&self, req: &TimeStampReq) -> Result<TimeStampResp>;
}

/// Build a version-1 `TimeStampReq` over `signature`: an OID-tagged
/// message imprint, `certReq = true`, and a 10-byte random nonce
pub fn build_request(alg: HashAlgorithm, signature: &[u8]) -> Result<TimeStampReq> {
    let digest = hash(alg, signature);

    // Positive, minimally-encoded nonce
    let mut nonce = random_bytes(10);
    nonce[0] = (nonce[0] & 0x7F) | 0x40;

    Ok(TimeStampReq {
        version: 1,
        message_imprint: MessageImprint {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: alg.oid(),
                parameters: None,
            },
            hashed_message: OctetString::new(digest)?,
        },
        req_policy: None,
        nonce: Some(der::asn1::Int::new(&nonce)?),
        cert_req: true,
    })
}

/// Extract the DER timestamp token (a CMS `ContentInfo`) from a response,
/// verifying the status is granted
pub fn timestamp_token_der(resp: &TimeStampResp) -> Result<Vec<u8>> {
    if resp.status.status != STATUS_GRANTED && resp.status.status != STATUS_GRANTED_WITH_MODS {
        return Err(Error::TimestampInvalid(TimestampFailure::StatusNotGranted));
    }
    let token = resp
        .time_stamp_token
        .as_ref()
        .ok_or(Error::TimestampInvalid(TimestampFailure::Malformed))?;
    Ok(token.to_der()?)
}

/// A successfully verified timestamp token
#[derive(Debug, Clone)]
pub struct VerifiedTimestamp {
    /// Token generation time, seconds since the Unix epoch
    pub gen_time_unix: u64,
    /// DER certificate of the token signer
    pub signer_cert_der: Vec<u8>,
}

/// Verify a timestamp token against the signature it countersigns.
///
/// Checks, in order: token structure, message imprint, nonce echo (when
/// the caller kept the request nonce), token signature and signed
/// attributes, chain to a trusted root, and that `genTime` falls inside
/// the signing certificate's validity window. Each failure maps to a
/// distinct [`TimestampFailure`].
pub fn verify_timestamp_token(
    token_der: &[u8],
    signature: &[u8],
    expected_nonce: Option<&der::asn1::Int>,
    trust_anchors_der: &[Vec<u8>],
) -> Result<VerifiedTimestamp> {
    let malformed = || Error::TimestampInvalid(TimestampFailure::Malformed);

    let content_info = ContentInfo::from_der(token_der).map_err(|_| malformed())?;
    if content_info.content_type != ID_SIGNED_DATA_OID {
        return Err(malformed());
    }
    let signed_data: SignedData =
        content_info.content.decode_as().map_err(|_| malformed())?;

    if signed_data.encap_content_info.econtent_type != ID_CT_TST_INFO_OID {
        return Err(malformed());
    }
    let tst_bytes = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .ok_or_else(malformed)?
        .as_bytes()
        .to_vec();
    let tst_info = TstInfo::from_der(&tst_bytes).map_err(|_| malformed())?;

    // Imprint: the token must cover the signature bytes
    let imprint_alg = hash_alg_for_oid(&tst_info.message_imprint.hash_algorithm.oid)
        .ok_or_else(|| {
            Error::UnsupportedAlgorithm(tst_info.message_imprint.hash_algorithm.oid.to_string())
        })?;
    if tst_info.message_imprint.hashed_message.as_bytes() != hash(imprint_alg, signature) {
        return Err(Error::TimestampInvalid(TimestampFailure::ImprintMismatch));
    }

    // Nonce echo
    if let Some(expected) = expected_nonce {
        if tst_info.nonce.as_ref() != Some(expected) {
            return Err(Error::TimestampInvalid(TimestampFailure::NonceMismatch));
        }
    }

    // Token signer
    let signer_info = signed_data
        .signer_infos
        .as_slice()
        .first()
        .ok_or_else(malformed)?;
    let certs: Vec<Certificate> = signed_data
        .certificates
        .as_ref()
        .map(|set| {
            set.as_slice()
                .iter()
                .map(|any| any.decode_as::<Certificate>())
                .collect::<der::Result<Vec<_>>>()
        })
        .transpose()
        .map_err(|_| malformed())?
        .unwrap_or_default();
    let signer_cert = certs
        .iter()
        .find(|cert| {
            cert.tbs_certificate.serial_number == signer_info.sid.serial_number
                && cert.tbs_certificate.issuer == signer_info.sid.issuer
        })
        .ok_or_else(malformed)?;

    // Signed attributes must bind the TSTInfo digest, and the signature is
    // computed over the attribute set re-tagged as SET OF
    let signed_attrs = signer_info.signed_attrs.as_ref().ok_or_else(malformed)?;
    let digest_alg =
        hash_alg_for_oid(&signer_info.digest_algorithm.oid).ok_or_else(|| {
            Error::UnsupportedAlgorithm(signer_info.digest_algorithm.oid.to_string())
        })?;
    let expected_digest = hash(digest_alg, &tst_bytes);
    let message_digest_ok = signed_attrs.as_slice().iter().any(|attr| {
        attr.oid == ID_MESSAGE_DIGEST_OID
            && attr.values.as_slice().iter().any(|value| {
                value.decode_as::<OctetString>().ok().map(|os| os.as_bytes().to_vec())
                    == Some(expected_digest.clone())
            })
    });
    if !message_digest_ok {
        return Err(Error::TimestampInvalid(TimestampFailure::Malformed));
    }

    let attrs_der = signed_attrs.to_der().map_err(|_| malformed())?;
    let verified = verify_with_sig_oid(
        signer_info.signature_algorithm.oid,
        &signer_cert.tbs_certificate.subject_public_key_info,
        &attrs_der,
        signer_info.signature.as_bytes(),
    )
    .unwrap_or(false);
    if !verified {
        return Err(Error::TimestampInvalid(TimestampFailure::Malformed));
    }

    // Chain to a trusted root
    let chain_der: Vec<Vec<u8>> = {
        let mut chain = vec![signer_cert.to_der()?];
        for cert in &certs {
            let der_bytes = cert.to_der()?;
            if der_bytes != chain[0] {
                chain.push(der_bytes);
            }
        }
        chain
    };
    validate_chain(&chain_der, trust_anchors_der)
        .map_err(|_| Error::TimestampInvalid(TimestampFailure::ChainInvalid))?;

    // genTime within the signer certificate's validity window
    let gen_time = tst_info.gen_time.to_unix_duration().as_secs();
    let validity = &signer_cert.tbs_certificate.validity;
    let not_before = validity.not_before.to_unix_duration().as_secs();
    let not_after = validity.not_after.to_unix_duration().as_secs();
    if gen_time < not_before || gen_time > not_after {
        return Err(Error::TimestampInvalid(TimestampFailure::TimeOutsideValidity));
    }

    Ok(VerifiedTimestamp {
        gen_time_unix: gen_time,
        signer_cert_der: signer_cert.to_der()?,
    })
}

/// The `sigTst`/`sigTst2` unprotected-header payload: a list of tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TstContainer {
    /// Tokens, newest first
    #[serde(rename = "tstTokens")]
    pub tst_tokens: Vec<TstToken>,
}

/// One DER timestamp token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TstToken {
    /// DER bytes of the CMS ContentInfo
    #[serde(with = "serde_bytes")]
    pub val: Vec<u8>,
}

impl TstContainer {
    /// Wrap a single token
    pub fn new(token_der: Vec<u8>) -> Self {
        Self {
            tst_tokens: vec![TstToken { val: token_der }],
        }
    }
}
