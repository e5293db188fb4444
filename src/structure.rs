//! Asset structure representation

use crate::{
    containers::ContainerKind,
    error::Result,
    segment::{ByteRange, ChunkedSegmentReader, Segment, SegmentKind},
};
use std::io::{Read, Seek, SeekFrom, Take};

/// The discovered structure of an asset: every segment, in file order,
/// with the manifest-store carriers indexed for quick access
#[derive(Debug)]
pub struct Structure {
    /// All segments in the file
    pub segments: Vec<Segment>,

    /// Container kind
    pub kind: ContainerKind,

    /// Total file size
    pub total_size: u64,

    /// Quick lookup: indices of manifest-store segments
    manifest_indices: Vec<usize>,
}

impl Structure {
    /// Create a new, empty structure
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            segments: Vec::new(),
            kind,
            total_size: 0,
            manifest_indices: Vec::new(),
        }
    }

    /// Add a segment and update indices
    pub fn add_segment(&mut self, segment: Segment) {
        if segment.kind == SegmentKind::ManifestStore {
            self.manifest_indices.push(self.segments.len());
        }
        self.segments.push(segment);
    }

    /// Indices of manifest-store segments (for container handlers)
    pub fn manifest_indices(&self) -> &[usize] {
        &self.manifest_indices
    }

    /// Whether the asset carries a manifest store
    pub fn has_manifest_store(&self) -> bool {
        !self.manifest_indices.is_empty()
    }

    /// Manifest-store segments in file order
    pub fn manifest_segments(&self) -> impl Iterator<Item = &Segment> {
        self.manifest_indices.iter().map(|i| &self.segments[*i])
    }

    /// The full span of the embedded manifest store, if present.
    ///
    /// For a store multiplexed over several carriers this covers from the
    /// first carrier's first byte to the last carrier's last byte.
    pub fn manifest_store_range(&self) -> Option<ByteRange> {
        let first = self.manifest_indices.first()?;
        let last = self.manifest_indices.last()?;
        let start = self.segments[*first].span().offset;
        let end = self.segments[*last].span().end_offset();
        Some(ByteRange::new(start, end - start))
    }

    /// Read a specific byte range from the asset
    pub fn read_range<R: Read + Seek>(&self, reader: &mut R, range: ByteRange) -> Result<Vec<u8>> {
        reader.seek(SeekFrom::Start(range.offset))?;
        let mut buffer = vec![0u8; range.size as usize];
        reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Create a chunked reader for a byte range.
    ///
    /// This allows streaming through a range without loading it all into
    /// memory; the hashing paths are built on it.
    pub fn read_range_chunked<'a, R: Read + Seek>(
        &self,
        reader: &'a mut R,
        range: ByteRange,
        chunk_size: usize,
    ) -> Result<ChunkedSegmentReader<Take<&'a mut R>>> {
        reader.seek(SeekFrom::Start(range.offset))?;
        let taken = reader.take(range.size);
        Ok(ChunkedSegmentReader::new(taken, range.size, chunk_size))
    }
}
