//! Digest algorithms: one-shot, streaming, and exclusion-aware stream hashing

use crate::{
    error::{Error, Result},
    segment::{Exclusion, DEFAULT_CHUNK_SIZE},
};
use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::io::{Read, Seek, SeekFrom};

/// Digest algorithms accepted in claims and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// The label used in claim/assertion `alg` fields
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest output length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// NIST algorithm OID (2.16.840.1.101.3.4.2.x)
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => super::SHA256_OID,
            Self::Sha384 => super::SHA384_OID,
            Self::Sha512 => super::SHA512_OID,
        }
    }

    /// Parse a claim/assertion algorithm label
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One-shot digest
pub fn hash(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match alg {
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

enum HasherInner {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

/// Streaming digest context
///
/// The single stateful crypto primitive: created with [`StreamingHasher::new`],
/// fed with [`update`](StreamingHasher::update), consumed by
/// [`finish`](StreamingHasher::finish). Any chunking of the input produces
/// the same digest as the one-shot [`hash`] function.
pub struct StreamingHasher {
    inner: HasherInner,
}

impl StreamingHasher {
    /// Begin a new digest context
    pub fn new(alg: HashAlgorithm) -> Self {
        let inner = match alg {
            HashAlgorithm::Sha256 => HasherInner::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => HasherInner::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => HasherInner::Sha512(Sha512::new()),
        };
        Self { inner }
    }

    /// Feed bytes into the context
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            HasherInner::Sha256(h) => h.update(data),
            HasherInner::Sha384(h) => h.update(data),
            HasherInner::Sha512(h) => h.update(data),
        }
    }

    /// Consume the context and return the digest
    pub fn finish(self) -> Vec<u8> {
        match self.inner {
            HasherInner::Sha256(h) => h.finalize().to_vec(),
            HasherInner::Sha384(h) => h.finalize().to_vec(),
            HasherInner::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Hash `len` bytes from the reader's current position in bounded memory
pub fn hash_stream<R: Read>(alg: HashAlgorithm, reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut hasher = StreamingHasher::new(alg);
    copy_into_hasher(reader, &mut hasher, len)?;
    Ok(hasher.finish())
}

/// Hash a stream of `stream_len` bytes, skipping the excluded ranges
///
/// Exclusions are normalized first (sorted ascending, disjoint, in bounds);
/// hashing refuses to proceed otherwise. The digest is identical to hashing
/// the concatenation of the non-excluded ranges.
pub fn hash_stream_excluding<R: Read + Seek>(
    alg: HashAlgorithm,
    reader: &mut R,
    stream_len: u64,
    exclusions: &[Exclusion],
) -> Result<Vec<u8>> {
    let sorted = Exclusion::normalize(exclusions, stream_len)?;
    let ranges = Exclusion::hashable_ranges(&sorted, stream_len);

    let mut hasher = StreamingHasher::new(alg);
    for range in ranges {
        reader.seek(SeekFrom::Start(range.offset))?;
        copy_into_hasher(reader, &mut hasher, range.size)?;
    }
    Ok(hasher.finish())
}

fn copy_into_hasher<R: Read>(
    reader: &mut R,
    hasher: &mut StreamingHasher,
    len: u64,
) -> Result<()> {
    let mut remaining = len;
    let mut buffer = vec![0u8; DEFAULT_CHUNK_SIZE];

    while remaining > 0 {
        let to_read = remaining.min(buffer.len() as u64) as usize;
        reader.read_exact(&mut buffer[..to_read])?;
        hasher.update(&buffer[..to_read]);
        remaining -= to_read as u64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn patterned_buffer(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn test_streaming_matches_one_shot_for_any_chunking() {
        let data = patterned_buffer(1_048_576 + 500);
        let expected = hash(HashAlgorithm::Sha256, &data);

        for chunk_size in [1usize, 7, 4096, 65536, 1_000_000] {
            let mut hasher = StreamingHasher::new(HashAlgorithm::Sha256);
            for chunk in data.chunks(chunk_size) {
                hasher.update(chunk);
            }
            assert_eq!(hasher.finish(), expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_hash_stream_matches_buffered() {
        let data = patterned_buffer(1_048_576 + 500);
        let mut cursor = Cursor::new(&data);
        let streamed =
            hash_stream(HashAlgorithm::Sha256, &mut cursor, data.len() as u64).unwrap();
        assert_eq!(streamed, hash(HashAlgorithm::Sha256, &data));
    }

    #[test]
    fn test_exclusion_matches_spliced_buffer() {
        let data = patterned_buffer(1_048_576 + 500);
        let mut cursor = Cursor::new(&data);

        let excluded = hash_stream_excluding(
            HashAlgorithm::Sha256,
            &mut cursor,
            data.len() as u64,
            &[Exclusion::new(1000, 100)],
        )
        .unwrap();

        let mut spliced = data[..1000].to_vec();
        spliced.extend_from_slice(&data[1100..]);
        assert_eq!(excluded, hash(HashAlgorithm::Sha256, &spliced));
    }

    #[test]
    fn test_overlapping_exclusions_refused() {
        let data = patterned_buffer(4096);
        let mut cursor = Cursor::new(&data);
        let result = hash_stream_excluding(
            HashAlgorithm::Sha256,
            &mut cursor,
            data.len() as u64,
            &[Exclusion::new(0, 100), Exclusion::new(50, 100)],
        );
        assert!(matches!(result, Err(Error::ExclusionsInvalid(_))));
    }

    #[test]
    fn test_alg_labels_round_trip() {
        for alg in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(HashAlgorithm::from_name(alg.name()).unwrap(), alg);
        }
        assert!(HashAlgorithm::from_name("md5").is_err());
    }
}
