//! Segment types, byte ranges, and hash exclusions

use crate::error::{Error, Result};
use std::io::Read;

/// A byte range in an asset (offset and size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset from start of asset
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new byte range
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the end offset of this range
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }

    /// Check if this range is immediately followed by another (contiguous)
    pub fn is_contiguous_with(&self, other: &ByteRange) -> bool {
        self.end_offset() == other.offset
    }
}

/// Chunk size for streaming large segments (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Maximum size for a single segment to prevent runaway allocations (256 MB)
pub const MAX_SEGMENT_SIZE: u64 = 256 * 1024 * 1024;

/// A byte range excluded from data-hash computation
///
/// Exclusions designate regions of the asset (the manifest-store carrier
/// segments, the reserved signature bytes) that must be skipped when the
/// data hash binds the asset to a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Exclusion {
    /// Offset of the excluded region
    pub start: u64,
    /// Length of the excluded region
    pub length: u64,
}

impl Exclusion {
    /// Create a new exclusion
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// End offset (one past the last excluded byte)
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Sort exclusions ascending and verify they are disjoint and in bounds.
    ///
    /// Hashing refuses to proceed on overlap or out-of-bounds ranges, so
    /// a malformed assertion cannot silently unbind part of the asset.
    pub fn normalize(exclusions: &[Exclusion], stream_len: u64) -> Result<Vec<Exclusion>> {
        let mut sorted: Vec<Exclusion> =
            exclusions.iter().copied().filter(|e| e.length > 0).collect();
        sorted.sort_by_key(|e| e.start);

        for pair in sorted.windows(2) {
            if pair[0].end() > pair[1].start {
                return Err(Error::ExclusionsInvalid(format!(
                    "ranges {}+{} and {}+{} overlap",
                    pair[0].start, pair[0].length, pair[1].start, pair[1].length
                )));
            }
        }

        if let Some(last) = sorted.last() {
            if last.end() > stream_len {
                return Err(Error::ExclusionsInvalid(format!(
                    "range {}+{} extends past end of stream ({stream_len})",
                    last.start, last.length
                )));
            }
        }

        Ok(sorted)
    }

    /// Complement of the exclusion set: the ranges that remain hashable.
    ///
    /// `exclusions` must already be normalized.
    pub fn hashable_ranges(exclusions: &[Exclusion], stream_len: u64) -> Vec<ByteRange> {
        let mut ranges = Vec::new();
        let mut last_end = 0u64;

        for exclusion in exclusions {
            if last_end < exclusion.start {
                ranges.push(ByteRange::new(last_end, exclusion.start - last_end));
            }
            last_end = exclusion.end();
        }

        if last_end < stream_len {
            ranges.push(ByteRange::new(last_end, stream_len - last_end));
        }

        ranges
    }
}

/// Logical classification of a segment
///
/// This represents what the segment IS from the engine's perspective,
/// independent of how it's physically stored in any particular format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// File header/signature
    Header,
    /// Manifest-store (JUMBF) data
    ManifestStore,
    /// Compressed media data
    MediaData,
    /// Other/unknown segment type
    Other,
}

impl SegmentKind {
    /// Get a string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::ManifestStore => "manifest_store",
            Self::MediaData => "media_data",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical segment of an asset
///
/// Most segments have a single physical range; a manifest store
/// multiplexed across several JPEG APP11 markers has one range per
/// carrier segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// One or more byte ranges in the physical file
    pub ranges: Vec<ByteRange>,

    /// Logical classification
    pub kind: SegmentKind,

    /// Physical path in the format's structure (e.g. "app11", "caBX", "GEOB")
    pub path: Option<String>,
}

impl Segment {
    /// Create a new segment with a single range
    pub fn new(offset: u64, size: u64, kind: SegmentKind, path: Option<String>) -> Self {
        Self {
            ranges: vec![ByteRange::new(offset, size)],
            kind,
            path,
        }
    }

    /// Create a new segment with multiple ranges
    pub fn with_ranges(ranges: Vec<ByteRange>, kind: SegmentKind, path: Option<String>) -> Self {
        Self { ranges, kind, path }
    }

    /// Get the primary location (first range) of this segment
    pub fn location(&self) -> ByteRange {
        self.ranges[0]
    }

    /// Get the total size across all ranges
    pub fn total_size(&self) -> u64 {
        self.ranges.iter().map(|r| r.size).sum()
    }

    /// Get the span (from start of first range to end of last range)
    ///
    /// For non-contiguous multi-range segments this includes gaps.
    pub fn span(&self) -> ByteRange {
        let first = self.ranges.first().expect("segment has at least one range");
        let last = self.ranges.last().expect("segment has at least one range");
        ByteRange::new(first.offset, last.end_offset() - first.offset)
    }

    /// Check if this is a manifest-store segment
    pub fn is_manifest_store(&self) -> bool {
        self.kind == SegmentKind::ManifestStore
    }

    /// Get the path, or "" if none was recorded
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }
}

/// Iterator over chunks of segment data for streaming
///
/// This allows hashing large segments without loading them entirely into memory.
pub struct ChunkedSegmentReader<R: Read> {
    source: R,
    remaining: u64,
    chunk_size: usize,
}

impl<R: Read> ChunkedSegmentReader<R> {
    /// Create a new chunked reader for a segment
    pub fn new(source: R, size: u64, chunk_size: usize) -> Self {
        Self {
            source,
            remaining: size,
            chunk_size,
        }
    }

    /// Read the next chunk
    pub fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let to_read = (self.remaining as usize).min(self.chunk_size);
        let mut buffer = vec![0u8; to_read];
        self.source.read_exact(&mut buffer)?;
        self.remaining -= to_read as u64;

        Ok(Some(buffer))
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Iterator for ChunkedSegmentReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_chunk().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_accepts_disjoint() {
        let exclusions = vec![Exclusion::new(100, 10), Exclusion::new(10, 20)];
        let sorted = Exclusion::normalize(&exclusions, 200).unwrap();
        assert_eq!(sorted[0].start, 10);
        assert_eq!(sorted[1].start, 100);
    }

    #[test]
    fn test_normalize_rejects_overlap() {
        let exclusions = vec![Exclusion::new(10, 20), Exclusion::new(25, 5)];
        assert!(Exclusion::normalize(&exclusions, 200).is_err());
    }

    #[test]
    fn test_normalize_rejects_out_of_bounds() {
        let exclusions = vec![Exclusion::new(190, 20)];
        assert!(Exclusion::normalize(&exclusions, 200).is_err());
    }

    #[test]
    fn test_hashable_ranges_complement() {
        let exclusions = Exclusion::normalize(&[Exclusion::new(1000, 100)], 2000).unwrap();
        let ranges = Exclusion::hashable_ranges(&exclusions, 2000);
        assert_eq!(ranges, vec![ByteRange::new(0, 1000), ByteRange::new(1100, 900)]);
    }

    #[test]
    fn test_hashable_ranges_exclusion_at_edges() {
        let exclusions = Exclusion::normalize(&[Exclusion::new(0, 10)], 10).unwrap();
        assert!(Exclusion::hashable_ranges(&exclusions, 10).is_empty());
    }
}
