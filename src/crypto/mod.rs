//! Cryptographic provider: digests, signatures, randomness, OID registry
//!
//! Everything here is a thin, allocation-friendly dispatch over the
//! RustCrypto backends. No global mutable state: the OID registry and the
//! algorithm allow-list are initialized once and read-only afterward.

mod hash;
mod oid;
mod signing;

pub use hash::{hash, hash_stream, hash_stream_excluding, HashAlgorithm, StreamingHasher};
pub use oid::{
    hash_alg_for_oid, ECDSA_WITH_SHA256_OID, ECDSA_WITH_SHA384_OID, ECDSA_WITH_SHA512_OID,
    EC_PUBLIC_KEY_OID, ID_CONTENT_TYPE_OID, ID_CT_TST_INFO_OID, ID_ED25519_OID,
    ID_MESSAGE_DIGEST_OID, ID_SIGNED_DATA_OID, RSASSA_PSS_OID, RSA_ENCRYPTION_OID,
    SECP256R1_OID, SECP384R1_OID, SECP521R1_OID, SHA256_OID, SHA256_WITH_RSA_OID, SHA384_OID,
    SHA384_WITH_RSA_OID, SHA512_OID, SHA512_WITH_RSA_OID,
};
pub use signing::{
    random_bytes, validate_chain, verify_cert_signature, verify_raw, verify_with_sig_oid,
    SigningAlg, SigningKeyPair,
};
