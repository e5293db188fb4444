//! Core provenance engine for C2PA manifests in media assets.
//!
//! This crate reads, validates, constructs, and signs C2PA manifests
//! embedded in JPEG, PNG, and MP3 assets.
//!
//! # Design Principles
//!
//! - **Streaming**: assets are hashed and rewritten in bounded memory
//! - **Byte-exact**: parsed JUMBF boxes replay their original bytes, and
//!   rewriting an asset touches only the manifest-store carriers
//! - **Record, don't throw**: the validator reports every check outcome
//!   and keeps walking
//! - **Explicit configuration**: trust anchors and algorithm policy are
//!   parameters, never ambient state
//!
//! # Example
//!
//! ```no_run
//! use provenance_core::{validate_asset, Asset, ValidationOptions};
//!
//! # fn main() -> provenance_core::Result<()> {
//! let mut asset = Asset::open("photo.jpg")?;
//! let report = validate_asset(&mut asset, &ValidationOptions::default())?;
//! for result in &report.results {
//!     println!("{} {}", if result.success { "ok " } else { "FAIL" }, result.code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod containers;
pub mod cose;
pub mod crypto;
mod error;
pub mod jumbf;
pub mod manifest;
mod segment;
mod structure;
pub mod time_stamp;
pub mod validator;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use asset::Asset;
pub use containers::{detect_from_extension, detect_from_mime, ContainerKind};
pub use cose::{LocalSigner, Signer, ValidationOptions};
pub use crypto::{HashAlgorithm, SigningAlg};
pub use error::{Error, Result, TimestampFailure};
pub use manifest::{
    Assertion, Claim, ClaimVersion, HashedUri, Manifest, ManifestBuilder, ManifestStore,
};
pub use segment::{ByteRange, ChunkedSegmentReader, Exclusion, Segment, SegmentKind};
pub use structure::Structure;
pub use time_stamp::{LocalTimestamper, TimestampProvider};
pub use validator::{validate_asset, ValidationReport, ValidationResult};
