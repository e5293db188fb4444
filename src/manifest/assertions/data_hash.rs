//! Data hash assertion (`c2pa.hash.data`)

use crate::{
    crypto::{hash_stream_excluding, HashAlgorithm},
    error::{Error, Result},
    jumbf::SuperBox,
    segment::Exclusion,
};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};

/// Binds every asset byte outside the declared exclusions to the claim.
///
/// The `pad` field exists so the assertion's encoded size can be fixed
/// before the final exclusion offsets and digest are known: the assertion
/// is first written with placeholder values, the layout is measured, and
/// the real values are patched in with the padding re-fit so the box size
/// never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataHashAssertion {
    /// Byte ranges excluded from the hash (the manifest-store carriers)
    pub exclusions: Vec<Exclusion>,
    /// Human-readable name of the hashed region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Digest algorithm; the claim's declared algorithm applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Digest over the non-excluded asset bytes
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    /// Size-stabilizing padding, always zeros
    #[serde(with = "serde_bytes")]
    pub pad: Vec<u8>,
    /// Second padding used when one padding cannot hit the target size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad2: Option<serde_bytes::ByteBuf>,
}

/// Initial padding size: covers the growth from placeholder exclusion
/// values to real file offsets (two u64s encode in at most 9 bytes each)
const INITIAL_PAD: usize = 34;

impl DataHashAssertion {
    /// Box label for this assertion
    pub const LABEL: &'static str = "c2pa.hash.data";

    /// Create a placeholder assertion: zero digest, zero-range exclusion,
    /// and enough padding to absorb the real values later
    pub fn new(alg: HashAlgorithm) -> Self {
        Self {
            exclusions: vec![Exclusion::new(0, 0)],
            name: Some("jumbf manifest".into()),
            alg: Some(alg.name().to_string()),
            hash: vec![0u8; alg.digest_len()],
            pad: vec![0u8; INITIAL_PAD],
            pad2: None,
        }
    }

    /// Digest algorithm declared on this assertion
    pub fn hash_alg(&self) -> Result<HashAlgorithm> {
        match &self.alg {
            Some(name) => HashAlgorithm::from_name(name),
            None => Ok(HashAlgorithm::Sha256),
        }
    }

    /// Recompute the digest over the asset and store it in `hash`.
    ///
    /// `container_exclusions` come from the asset layer; the assertion's
    /// own declared exclusions are merged in before hashing.
    pub fn compute_hash<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        stream_len: u64,
        container_exclusions: &[Exclusion],
    ) -> Result<()> {
        let digest = self.digest_asset(reader, stream_len, container_exclusions)?;
        self.hash = digest;
        Ok(())
    }

    /// Digest the asset under this assertion's exclusions without mutating it
    pub fn digest_asset<R: Read + Seek>(
        &self,
        reader: &mut R,
        stream_len: u64,
        container_exclusions: &[Exclusion],
    ) -> Result<Vec<u8>> {
        let mut exclusions = self.exclusions.clone();
        for exclusion in container_exclusions {
            if !exclusions.contains(exclusion) {
                exclusions.push(*exclusion);
            }
        }
        hash_stream_excluding(self.hash_alg()?, reader, stream_len, &exclusions)
    }

    /// Replace placeholder values with the final exclusions and digest,
    /// re-fitting the padding so the encoded assertion keeps `target_size`
    /// bytes exactly
    pub fn finalize(
        &mut self,
        exclusions: Vec<Exclusion>,
        hash: Vec<u8>,
        target_size: u64,
    ) -> Result<()> {
        self.exclusions = exclusions;
        self.hash = hash;
        self.fit_padding(target_size)
    }

    /// Size of the encoded assertion super box
    pub fn measure(&self) -> Result<u64> {
        Ok(self.to_jumbf()?.measure())
    }

    fn fit_padding(&mut self, target_size: u64) -> Result<()> {
        self.pad.clear();
        self.pad2 = None;

        let baseline = self.measure()?;
        if baseline > target_size {
            return Err(Error::AssertionDecoding {
                label: Self::LABEL.into(),
                reason: format!(
                    "final content ({baseline} bytes) exceeds reserved size ({target_size})"
                ),
            });
        }

        // A CBOR byte-string header grows with its length, so stepping the
        // padding up by the remaining delta can overshoot by a byte or two;
        // walk until exact
        let mut pad_len = (target_size - baseline) as usize;
        pad_len = pad_len.saturating_sub(2);
        loop {
            self.pad = vec![0u8; pad_len];
            let size = self.measure()?;
            if size == target_size {
                return Ok(());
            }
            if size > target_size {
                break;
            }
            pad_len += 1;
        }

        // A second padding shifts the header-size breakpoints
        self.pad = vec![0u8; pad_len.saturating_sub(12)];
        self.pad2 = Some(serde_bytes::ByteBuf::from(Vec::new()));
        let baseline = self.measure()?;
        if baseline > target_size {
            return Err(Error::AssertionDecoding {
                label: Self::LABEL.into(),
                reason: "cannot fit padding to reserved size".into(),
            });
        }
        let mut pad2_len = 0usize;
        loop {
            self.pad2 = Some(serde_bytes::ByteBuf::from(vec![0u8; pad2_len]));
            let size = self.measure()?;
            if size == target_size {
                return Ok(());
            }
            if size > target_size {
                return Err(Error::AssertionDecoding {
                    label: Self::LABEL.into(),
                    reason: "cannot fit padding to reserved size".into(),
                });
            }
            pad2_len += 1;
        }
    }

    /// Interpret an assertion super box
    pub fn from_jumbf(sbox: &SuperBox) -> Result<Self> {
        super::cbor_assertion_content(sbox)
    }

    /// Generate the super box carrying this assertion
    pub fn to_jumbf(&self) -> Result<SuperBox> {
        super::cbor_assertion_box(Self::LABEL, self)
    }
}
