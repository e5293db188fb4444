//! BMFF hash assertion (`c2pa.hash.bmff.v2`)
//!
//! Hashes an ISO-BMFF box tree with xpath-style exclusions. Fragmented
//! content can carry a Merkle rollup instead of one flat digest; chunk
//! digests roll up pairwise to the root stored in the map.

use crate::{
    crypto::{hash, HashAlgorithm, StreamingHasher},
    error::{Error, Result},
    jumbf::SuperBox,
    segment::DEFAULT_CHUNK_SIZE,
};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};

/// An exclusion over the BMFF box tree, addressed by box path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BmffExclusion {
    /// Box path such as `/mdat` or `/moov/trak`
    pub xpath: String,
    /// Restrict the exclusion to boxes of exactly this length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl BmffExclusion {
    fn matches(&self, path: &str, size: u64) -> bool {
        if self.xpath != path {
            return false;
        }
        match self.length {
            Some(length) => length == size,
            None => true,
        }
    }
}

/// Merkle rollup for one run of fragmented media chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleMap {
    /// Identifies the track/fragment run this map covers
    #[serde(rename = "uniqueId")]
    pub unique_id: u64,
    /// Local id within the run
    #[serde(rename = "localId")]
    pub local_id: u64,
    /// Number of leaf chunks
    pub count: u64,
    /// Digest algorithm for the rollup, when it differs from the assertion's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Rollup root(s); a single root for a complete run
    pub hashes: Vec<serde_bytes::ByteBuf>,
}

/// Roll leaf digests up pairwise to a single root.
///
/// An odd leaf at any level is promoted unchanged.
pub fn merkle_root(alg: HashAlgorithm, leaves: &[Vec<u8>]) -> Vec<u8> {
    if leaves.is_empty() {
        return hash(alg, &[]);
    }

    let mut level: Vec<Vec<u8>> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let mut joined = pair[0].clone();
                joined.extend_from_slice(&pair[1]);
                next.push(hash(alg, &joined));
            } else {
                next.push(pair[0].clone());
            }
        }
        level = next;
    }
    level.remove(0)
}

/// Binds an ISO-BMFF asset's box tree to the claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmffHashAssertion {
    /// Excluded box paths
    pub exclusions: Vec<BmffExclusion>,
    /// Human-readable name of the hashed region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Digest algorithm; the claim's declared algorithm applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Flat digest over the non-excluded box tree
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    /// Merkle rollups for fragmented runs, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle: Option<Vec<MerkleMap>>,
}

// Boxes whose children are hashed individually so an exclusion can target
// a nested path
const CONTAINER_BOXES: &[&[u8; 4]] = &[
    b"moov", b"trak", b"mdia", b"minf", b"stbl", b"edts", b"dinf", b"udta", b"moof", b"traf",
];

impl BmffHashAssertion {
    /// Box label for this assertion
    pub const LABEL: &'static str = "c2pa.hash.bmff.v2";

    /// Create an assertion with the standard manifest exclusion
    pub fn new(alg: HashAlgorithm) -> Self {
        Self {
            exclusions: vec![BmffExclusion {
                xpath: "/uuid".into(),
                length: None,
            }],
            name: Some("bmff boxes".into()),
            alg: Some(alg.name().to_string()),
            hash: vec![0u8; alg.digest_len()],
            merkle: None,
        }
    }

    /// Digest algorithm declared on this assertion
    pub fn hash_alg(&self) -> Result<HashAlgorithm> {
        match &self.alg {
            Some(name) => HashAlgorithm::from_name(name),
            None => Ok(HashAlgorithm::Sha256),
        }
    }

    /// Recompute the flat digest over the box tree and store it in `hash`
    pub fn compute_hash<R: Read + Seek>(&mut self, reader: &mut R) -> Result<()> {
        self.hash = self.digest_box_tree(reader)?;
        Ok(())
    }

    /// Digest the box tree under this assertion's exclusions
    pub fn digest_box_tree<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let total = reader.seek(SeekFrom::End(0))?;
        let mut hasher = StreamingHasher::new(self.hash_alg()?);
        self.walk(reader, 0, total, "", &mut hasher)?;
        Ok(hasher.finish())
    }

    fn walk<R: Read + Seek>(
        &self,
        reader: &mut R,
        start: u64,
        end: u64,
        prefix: &str,
        hasher: &mut StreamingHasher,
    ) -> Result<()> {
        let mut offset = start;

        while offset < end {
            if end - offset < 8 {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: "truncated BMFF box header".into(),
                });
            }

            reader.seek(SeekFrom::Start(offset))?;
            let mut header = [0u8; 8];
            reader.read_exact(&mut header)?;
            let size32 = BigEndian::read_u32(&header[..4]) as u64;
            let box_type = [header[4], header[5], header[6], header[7]];

            let (size, header_len) = match size32 {
                0 => (end - offset, 8u64),
                1 => {
                    let mut ext = [0u8; 8];
                    reader.read_exact(&mut ext)?;
                    (BigEndian::read_u64(&ext), 16u64)
                }
                n => (n, 8u64),
            };

            if size < header_len || offset + size > end {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: format!(
                        "BMFF box {} has invalid size {size}",
                        String::from_utf8_lossy(&box_type)
                    ),
                });
            }

            let path = format!("{prefix}/{}", String::from_utf8_lossy(&box_type));
            let excluded = self.exclusions.iter().any(|e| e.matches(&path, size));

            if !excluded {
                if CONTAINER_BOXES.contains(&&box_type) {
                    // Hash the container's own header, then descend so a
                    // nested exclusion can take effect
                    hasher.update(&header);
                    if header_len == 16 {
                        hasher.update(&size.to_be_bytes());
                    }
                    self.walk(reader, offset + header_len, offset + size, &path, hasher)?;
                } else {
                    reader.seek(SeekFrom::Start(offset))?;
                    let mut remaining = size;
                    let mut buffer = vec![0u8; DEFAULT_CHUNK_SIZE];
                    while remaining > 0 {
                        let to_read = remaining.min(buffer.len() as u64) as usize;
                        reader.read_exact(&mut buffer[..to_read])?;
                        hasher.update(&buffer[..to_read]);
                        remaining -= to_read as u64;
                    }
                }
            }

            offset += size;
        }

        Ok(())
    }

    /// Verify a fragmented run's chunk digests against the stored rollup
    pub fn verify_merkle_run(&self, unique_id: u64, chunk_digests: &[Vec<u8>]) -> Result<bool> {
        let Some(maps) = &self.merkle else {
            return Ok(false);
        };
        let Some(map) = maps.iter().find(|m| m.unique_id == unique_id) else {
            return Ok(false);
        };

        if map.count != chunk_digests.len() as u64 {
            return Ok(false);
        }
        let alg = match &map.alg {
            Some(name) => HashAlgorithm::from_name(name)?,
            None => self.hash_alg()?,
        };
        let root = merkle_root(alg, chunk_digests);
        Ok(map.hashes.first().map(|h| h.as_slice()) == Some(root.as_slice()))
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bmff_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn sample_bmff() -> Vec<u8> {
        let mut data = bmff_box(b"ftyp", b"isom");
        let trak = bmff_box(b"trak", &bmff_box(b"tkhd", &[0x01; 12]));
        let mut moov_payload = bmff_box(b"mvhd", &[0x02; 16]);
        moov_payload.extend_from_slice(&trak);
        data.extend(bmff_box(b"moov", &moov_payload));
        data.extend(bmff_box(b"mdat", &[0x03; 64]));
        data.extend(bmff_box(b"uuid", &[0x04; 32]));
        data
    }

    #[test]
    fn test_round_trip() {
        let assertion = BmffHashAssertion::new(HashAlgorithm::Sha256);
        let sbox = assertion.to_jumbf().unwrap();
        let bytes = sbox.serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();
        assert_eq!(BmffHashAssertion::from_jumbf(&parsed).unwrap(), assertion);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_uuid_exclusion_ignores_manifest_box() {
        let data = sample_bmff();
        let mut assertion = BmffHashAssertion::new(HashAlgorithm::Sha256);
        assertion.compute_hash(&mut Cursor::new(&data)).unwrap();

        // Growing the uuid box must not change the digest
        let mut grown = sample_bmff();
        let uuid_box = bmff_box(b"uuid", &[0x09; 64]);
        let base_len = grown.len() - (8 + 32);
        grown.truncate(base_len);
        grown.extend(uuid_box);

        let digest = assertion.digest_box_tree(&mut Cursor::new(&grown)).unwrap();
        assert_eq!(digest, assertion.hash);
    }

    #[test]
    fn test_nested_exclusion_reaches_into_moov() {
        let data = sample_bmff();
        let mut assertion = BmffHashAssertion::new(HashAlgorithm::Sha256);
        assertion.exclusions.push(BmffExclusion {
            xpath: "/moov/trak".into(),
            length: None,
        });
        let with_trak_excluded = assertion.digest_box_tree(&mut Cursor::new(&data)).unwrap();

        let flat = BmffHashAssertion::new(HashAlgorithm::Sha256)
            .digest_box_tree(&mut Cursor::new(&data))
            .unwrap();
        assert_ne!(with_trak_excluded, flat);
    }

    #[test]
    fn test_mdat_change_changes_digest() {
        let data = sample_bmff();
        let assertion = {
            let mut a = BmffHashAssertion::new(HashAlgorithm::Sha256);
            a.compute_hash(&mut Cursor::new(&data)).unwrap();
            a
        };

        let mut tampered = data.clone();
        let mdat_payload_offset = data.len() - (8 + 32) - 64;
        tampered[mdat_payload_offset] ^= 0xFF;
        let digest = assertion
            .digest_box_tree(&mut Cursor::new(&tampered))
            .unwrap();
        assert_ne!(digest, assertion.hash);
    }

    #[test]
    fn test_merkle_rollup_round_trip() {
        let alg = HashAlgorithm::Sha256;
        let chunks: Vec<Vec<u8>> = (0u8..5)
            .map(|i| hash(alg, &[i; 100]))
            .collect();

        let mut assertion = BmffHashAssertion::new(alg);
        assertion.merkle = Some(vec![MerkleMap {
            unique_id: 1,
            local_id: 0,
            count: chunks.len() as u64,
            alg: Some(alg.name().to_string()),
            hashes: vec![serde_bytes::ByteBuf::from(merkle_root(alg, &chunks))],
        }]);

        assert!(assertion.verify_merkle_run(1, &chunks).unwrap());
        let mut wrong = chunks.clone();
        wrong[2] = hash(alg, b"tampered");
        assert!(!assertion.verify_merkle_run(1, &wrong).unwrap());
        assert!(!assertion.verify_merkle_run(9, &chunks).unwrap());
    }
}
