//! Format-agnostic asset handling
//!
//! A unified API for working with media assets without needing to know the
//! specific container format.

use crate::{
    containers::{detect_container, get_handler, Handler},
    crypto::{hash_stream_excluding, HashAlgorithm},
    error::Result,
    segment::{ByteRange, Exclusion},
    structure::Structure,
    ContainerKind,
};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A media asset that automatically detects and handles its container format
///
/// # Example
///
/// ```no_run
/// use provenance_core::Asset;
///
/// # fn main() -> provenance_core::Result<()> {
/// // Open any supported media file - format is auto-detected
/// let mut asset = Asset::open("image.jpg")?;
///
/// if let Some(store) = asset.read_manifest_store()? {
///     println!("manifest store: {} bytes", store.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Asset<R: Read + Seek> {
    reader: R,
    structure: Structure,
    handler: Handler,
}

impl Asset<File> {
    /// Open a media file from a path
    ///
    /// The container is automatically detected from the file header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> Asset<R> {
    /// Create an Asset from a reader, auto-detecting the container
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let kind = detect_container(&mut reader)?;
        Self::from_reader_with_kind(reader, kind)
    }

    /// Create an Asset from a reader with a known container kind
    pub fn from_reader_with_kind(mut reader: R, kind: ContainerKind) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let handler = get_handler(kind);
        let structure = handler.parse(&mut reader)?;

        Ok(Asset {
            reader,
            structure,
            handler,
        })
    }

    /// Get the detected container kind
    pub fn kind(&self) -> ContainerKind {
        self.structure.kind
    }

    /// Get the asset structure
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Get a mutable reference to the reader
    ///
    /// This allows advanced operations like chunked reading for hashing
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Locate the embedded manifest-store region, if any
    pub fn manifest_store_range(&self) -> Option<ByteRange> {
        self.structure.manifest_store_range()
    }

    /// Read and assemble the embedded manifest-store (JUMBF) bytes
    pub fn read_manifest_store(&mut self) -> Result<Option<Vec<u8>>> {
        self.handler
            .read_manifest_store(&self.structure, &mut self.reader)
    }

    /// Write a copy of the asset with the manifest store inserted, replaced,
    /// or (when `manifest` is `None`) removed. All other bytes are preserved.
    pub fn write_manifest_store<W: Write>(
        &mut self,
        writer: &mut W,
        manifest: Option<&[u8]>,
    ) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.handler
            .write_manifest_store(&self.structure, &mut self.reader, writer, manifest)
    }

    /// Byte ranges excluded from the data hash: the manifest-store carriers,
    /// plus the reserved signature range when one is supplied
    pub fn data_hash_exclusions(
        &self,
        placeholder_signature: Option<Exclusion>,
    ) -> Result<Vec<Exclusion>> {
        self.handler
            .data_hash_exclusions(&self.structure, placeholder_signature)
    }

    /// Compute the data hash over the asset, excluding the manifest-store
    /// carriers plus any additional assertion-declared exclusions
    pub fn data_hash(
        &mut self,
        alg: HashAlgorithm,
        extra_exclusions: &[Exclusion],
    ) -> Result<Vec<u8>> {
        let mut exclusions = self.data_hash_exclusions(None)?;
        exclusions.extend_from_slice(extra_exclusions);
        let total = self.structure.total_size;
        hash_stream_excluding(alg, &mut self.reader, total, &exclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;
    use std::io::Cursor;

    #[cfg(feature = "png")]
    #[test]
    fn test_detects_png_and_reports_absent_manifest() {
        let data = crate::test_utils::minimal_png();
        let mut asset = Asset::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(asset.kind(), ContainerKind::Png);
        assert!(asset.manifest_store_range().is_none());
        assert_eq!(asset.read_manifest_store().unwrap(), None);
    }

    #[cfg(feature = "jpeg")]
    #[test]
    fn test_manifest_embed_and_data_hash() {
        let data = crate::test_utils::minimal_jpeg();
        let mut asset = Asset::from_reader(Cursor::new(&data)).unwrap();

        let manifest = crate::test_utils::opaque_manifest(b"manifest payload");
        let mut output = Vec::new();
        asset
            .write_manifest_store(&mut output, Some(&manifest))
            .unwrap();

        let mut updated = Asset::from_reader(Cursor::new(&output)).unwrap();
        let range = updated.manifest_store_range().unwrap();
        assert!(range.size > 0);

        // Hashing with exclusions equals hashing the original segments
        let digest = updated.data_hash(HashAlgorithm::Sha256, &[]).unwrap();
        let exclusions = updated.data_hash_exclusions(None).unwrap();
        assert_eq!(exclusions.len(), 1);
        let mut expected_input =
            output[..exclusions[0].start as usize].to_vec();
        expected_input.extend_from_slice(&output[exclusions[0].end() as usize..]);
        assert_eq!(digest, hash(HashAlgorithm::Sha256, &expected_input));
    }
}
