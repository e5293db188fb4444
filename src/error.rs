//! Error types for provenance-core

use std::io;

/// Result type for provenance-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a timestamp token fails verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFailure {
    /// TSA returned a status other than granted/grantedWithMods
    StatusNotGranted,
    /// The nonce in the token does not echo the request nonce
    NonceMismatch,
    /// The message imprint does not match the signature bytes
    ImprintMismatch,
    /// genTime falls outside the signing certificate's validity window
    TimeOutsideValidity,
    /// The token's signing certificate does not chain to a trusted root
    ChainInvalid,
    /// The token is not a parseable RFC 3161 / CMS structure
    Malformed,
}

impl std::fmt::Display for TimestampFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StatusNotGranted => "status-not-granted",
            Self::NonceMismatch => "nonce-mismatch",
            Self::ImprintMismatch => "imprint-mismatch",
            Self::TimeOutsideValidity => "time-outside-validity",
            Self::ChainInvalid => "chain-invalid",
            Self::Malformed => "malformed-token",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while reading, building, signing, or validating
/// provenance data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JUMBF box length/type/structure violation
    #[error("malformed JUMBF box at offset {offset}: {reason}")]
    MalformedBox { offset: u64, reason: String },

    /// A specific box type was required but something else was found
    #[error("unexpected box type: expected {expected}, found {found}")]
    UnexpectedBoxType { expected: String, found: String },

    /// Magic-byte test failed for the named container kind
    #[error("not a valid {0} file")]
    NotAValidAsset(&'static str),

    /// No container implementation recognized the input
    #[error("unsupported format")]
    UnsupportedFormat,

    /// Asset contains no manifest-store region
    #[error("no manifest store present")]
    ManifestAbsent,

    /// A data/BMFF/assertion digest check failed
    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    /// Exclusion ranges overlap, are unsorted, or extend past the asset end
    #[error("invalid exclusion ranges: {0}")]
    ExclusionsInvalid(String),

    /// COSE signature failed cryptographic verification
    #[error("COSE signature invalid")]
    SignatureInvalid,

    /// The leaf certificate's signing algorithm is not allow-listed
    #[error("signature algorithm not allowed: {0}")]
    SignatureAlgorithmDisallowed(String),

    /// The x5chain does not form a valid path to a trusted root
    #[error("certificate chain invalid: {0}")]
    CertificateChainInvalid(String),

    /// RFC 3161 timestamp token failed a verification step
    #[error("timestamp invalid: {0}")]
    TimestampInvalid(TimestampFailure),

    /// Algorithm identifier (OID or label) is not supported
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Claim CBOR could not be decoded
    #[error("claim decoding error: {0}")]
    ClaimDecoding(String),

    /// Assertion content does not match its declared schema
    #[error("assertion decoding error in {label}: {reason}")]
    AssertionDecoding { label: String, reason: String },

    /// COSE structure could not be built or serialized
    #[error("COSE structure error: {0}")]
    CoseStructure(String),

    /// The reserved signature box is too small for the generated signature
    #[error("reserved signature box too small: need {needed}, have {reserved}")]
    SignatureBoxTooSmall { needed: usize, reserved: usize },

    /// Structural problem in a container segment
    #[error("invalid segment at offset {offset}: {reason}")]
    InvalidSegment { offset: u64, reason: String },

    /// Data exceeds what the container can carry in one record
    #[error("data too large: {size} bytes (max {max})")]
    DataTooLarge { size: usize, max: usize },

    /// ASN.1 encode/decode failure (certificates, RFC 3161, CMS)
    #[error("ASN.1 error: {0}")]
    Asn1(String),

    /// Key material could not be parsed
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Signing backend reported a failure
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::Asn1(e.to_string())
    }
}
