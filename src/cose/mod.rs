//! COSE_Sign1 signing and verification for claims
//!
//! The signer side builds a tagged COSE_Sign1 with a detached payload,
//! protected `alg`/content-type/`x5chain` headers, an optional RFC 3161
//! countersignature, and zero padding to land exactly on the byte size
//! reserved for the signature box. The verifier side reconstructs the
//! Sig_structure from the original protected bytes, enforces the
//! algorithm allow-list on the leaf certificate only, and walks the
//! certificate chain.

mod sign;
mod signer;
mod verify;

pub use sign::{cose_sign, sign_claim};
pub use signer::{LocalSigner, Signer};
pub use verify::{verify_cose, CoseValidationInfo, ValidationOptions};

use crate::crypto::SigningAlg;
use coset::iana;

/// COSE content type for claim payloads
pub const CLAIM_CONTENT_TYPE: &str = "application/c2pa-claim";

pub(crate) fn cose_alg(alg: SigningAlg) -> iana::Algorithm {
    match alg {
        SigningAlg::Es256 => iana::Algorithm::ES256,
        SigningAlg::Es384 => iana::Algorithm::ES384,
        SigningAlg::Es512 => iana::Algorithm::ES512,
        SigningAlg::Ps256 => iana::Algorithm::PS256,
        SigningAlg::Ps384 => iana::Algorithm::PS384,
        SigningAlg::Ps512 => iana::Algorithm::PS512,
        SigningAlg::Ed25519 => iana::Algorithm::EdDSA,
    }
}

pub(crate) fn signing_alg_from_cose(alg: &coset::Algorithm) -> Option<SigningAlg> {
    match alg {
        coset::RegisteredLabelWithPrivate::Assigned(assigned) => match assigned {
            iana::Algorithm::ES256 => Some(SigningAlg::Es256),
            iana::Algorithm::ES384 => Some(SigningAlg::Es384),
            iana::Algorithm::ES512 => Some(SigningAlg::Es512),
            iana::Algorithm::PS256 => Some(SigningAlg::Ps256),
            iana::Algorithm::PS384 => Some(SigningAlg::Ps384),
            iana::Algorithm::PS512 => Some(SigningAlg::Ps512),
            iana::Algorithm::EdDSA => Some(SigningAlg::Ed25519),
            _ => None,
        },
        _ => None,
    }
}
