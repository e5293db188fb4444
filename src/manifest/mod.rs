//! Manifest model: claims, assertions, and the manifest store
//!
//! Maps JUMBF trees to typed objects and back. Parsed objects keep their
//! originating boxes so digests are always computed over the exact bytes
//! that were read, not a re-encoding.

pub mod assertions;
mod builder;
mod claim;
mod store;

pub use assertions::Assertion;
pub use builder::ManifestBuilder;
pub use claim::{Claim, ClaimVersion, HashedUri};
pub use store::{Manifest, ManifestStore};

/// Label of the assertion store box inside a manifest
pub const ASSERTION_STORE_LABEL: &str = "c2pa.assertions";
/// Label of the claim box (v1 dialect)
pub const CLAIM_LABEL_V1: &str = "c2pa.claim";
/// Label of the claim box (v2 dialect)
pub const CLAIM_LABEL_V2: &str = "c2pa.claim.v2";
/// Label of the claim signature box
pub const SIGNATURE_LABEL: &str = "c2pa.signature";
/// Label of the manifest store box
pub const STORE_LABEL: &str = "c2pa";

/// JUMBF URI for a box inside the current manifest
pub(crate) fn self_uri(path: &str) -> String {
    format!("self#jumbf={path}")
}

/// JUMBF URI for a manifest in the store
pub(crate) fn store_uri(manifest_label: &str) -> String {
    format!("self#jumbf=/c2pa/{manifest_label}")
}

/// Strip a hashed-URI down to the path inside the manifest or store
pub(crate) fn parse_self_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix("self#jumbf=")
}
