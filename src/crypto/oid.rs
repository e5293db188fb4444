//! Object identifier registry
//!
//! Process-wide immutable tables. Initialized once, never mutated.

use super::hash::HashAlgorithm;
use der::asn1::ObjectIdentifier;
use once_cell::sync::Lazy;
use std::collections::HashMap;

// NIST digest algorithms
pub const SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const SHA384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const SHA512_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

// Public key algorithms
pub const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub const RSA_ENCRYPTION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const ID_ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

// Named curves
pub const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
pub const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
pub const SECP521R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

// X.509 signature algorithms
pub const ECDSA_WITH_SHA256_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const ECDSA_WITH_SHA384_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const ECDSA_WITH_SHA512_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
pub const SHA256_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
pub const RSASSA_PSS_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

// CMS / RFC 3161 content types and attributes
pub const ID_SIGNED_DATA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const ID_CT_TST_INFO_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
pub const ID_CONTENT_TYPE_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const ID_MESSAGE_DIGEST_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

static HASH_ALG_BY_OID: Lazy<HashMap<ObjectIdentifier, HashAlgorithm>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(SHA256_OID, HashAlgorithm::Sha256);
    map.insert(SHA384_OID, HashAlgorithm::Sha384);
    map.insert(SHA512_OID, HashAlgorithm::Sha512);
    map
});

/// Look up the digest algorithm for a NIST hash OID
pub fn hash_alg_for_oid(oid: &ObjectIdentifier) -> Option<HashAlgorithm> {
    HASH_ALG_BY_OID.get(oid).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_oid_lookup() {
        assert_eq!(hash_alg_for_oid(&SHA256_OID), Some(HashAlgorithm::Sha256));
        assert_eq!(hash_alg_for_oid(&SHA384_OID), Some(HashAlgorithm::Sha384));
        assert_eq!(hash_alg_for_oid(&SHA512_OID), Some(HashAlgorithm::Sha512));
        assert_eq!(hash_alg_for_oid(&EC_PUBLIC_KEY_OID), None);
    }

    #[test]
    fn test_oid_spellings() {
        assert_eq!(SHA256_OID.to_string(), "2.16.840.1.101.3.4.2.1");
        assert_eq!(ID_CT_TST_INFO_OID.to_string(), "1.2.840.113549.1.9.16.1.4");
    }
}
