//! PNG container I/O
//!
//! The manifest store lives in a dedicated `caBX` chunk placed before the
//! first `IDAT`. Chunk CRCs cover the type tag and data; everything else in
//! the file is copied through untouched.

use crate::{
    error::{Error, Result},
    segment::{Exclusion, Segment, SegmentKind},
    structure::Structure,
    ContainerKind,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use once_cell::sync::Lazy;
use std::io::{Read, Seek, SeekFrom, Write};

use super::{copy_bytes, ContainerIO};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

const MANIFEST_CHUNK: &[u8; 4] = b"caBX";
const IDAT: &[u8; 4] = b"IDAT";
const IEND: &[u8; 4] = b"IEND";

static CRC_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
        }
        *entry = c;
    }
    table
});

fn crc32(chunk_type: &[u8], data: &[u8]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for byte in chunk_type.iter().chain(data.iter()) {
        c = CRC_TABLE[((c ^ *byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

/// PNG container I/O implementation
pub struct PngIO;

impl PngIO {
    /// Create a new PNG handler
    pub fn new() -> Self {
        Self
    }

    fn parse_impl<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        let total_size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let mut signature = [0u8; 8];
        if source.read_exact(&mut signature).is_err() || signature != *PNG_SIGNATURE {
            return Err(Error::NotAValidAsset("PNG"));
        }

        let mut structure = Structure::new(ContainerKind::Png);
        structure.total_size = total_size;
        structure.add_segment(Segment::new(0, 8, SegmentKind::Header, None));

        let mut offset = 8u64;

        while offset < total_size {
            if total_size - offset < 12 {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: "truncated chunk header".into(),
                });
            }

            let data_len = source.read_u32::<BigEndian>()? as u64;
            let mut chunk_type = [0u8; 4];
            source.read_exact(&mut chunk_type)?;

            if data_len > crate::segment::MAX_SEGMENT_SIZE {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: format!("chunk declares {data_len} bytes"),
                });
            }

            let chunk_size = 12 + data_len;
            if offset + chunk_size > total_size {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: format!(
                        "chunk {} runs past end of file",
                        String::from_utf8_lossy(&chunk_type)
                    ),
                });
            }

            let (kind, path) = if chunk_type == *MANIFEST_CHUNK {
                (SegmentKind::ManifestStore, "caBX".to_string())
            } else if chunk_type == *IDAT {
                (SegmentKind::MediaData, "IDAT".to_string())
            } else {
                (
                    SegmentKind::Other,
                    String::from_utf8_lossy(&chunk_type).into_owned(),
                )
            };
            structure.add_segment(Segment::new(offset, chunk_size, kind, Some(path)));

            offset += chunk_size;
            source.seek(SeekFrom::Start(offset))?;

            if chunk_type == *IEND {
                break;
            }
        }

        // Anything after IEND is preserved verbatim
        if offset < total_size {
            structure.add_segment(Segment::new(
                offset,
                total_size - offset,
                SegmentKind::Other,
                Some("trailer".into()),
            ));
        }

        Ok(structure)
    }

    fn write_manifest_chunk<W: Write>(writer: &mut W, manifest: &[u8]) -> Result<()> {
        writer.write_u32::<BigEndian>(manifest.len() as u32)?;
        writer.write_all(MANIFEST_CHUNK)?;
        writer.write_all(manifest)?;
        writer.write_u32::<BigEndian>(crc32(MANIFEST_CHUNK, manifest))?;
        Ok(())
    }

    /// Index of the segment before which a new manifest chunk is inserted:
    /// immediately ahead of the first IDAT, or before IEND as a fallback
    fn insertion_index(structure: &Structure) -> usize {
        structure
            .segments
            .iter()
            .position(|s| s.kind == SegmentKind::MediaData || s.path() == "IEND")
            .unwrap_or(structure.segments.len())
    }
}

impl Default for PngIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerIO for PngIO {
    fn container_type() -> ContainerKind {
        ContainerKind::Png
    }

    fn extensions() -> &'static [&'static str] {
        &["png"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/png"]
    }

    fn can_read(prefix: &[u8]) -> bool {
        prefix.len() >= 8 && prefix[..8] == *PNG_SIGNATURE
    }

    fn parse<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        self.parse_impl(source)
    }

    fn read_manifest_store<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>> {
        let Some(segment) = structure.manifest_segments().next() else {
            return Ok(None);
        };

        let range = segment.location();
        source.seek(SeekFrom::Start(range.offset + 8))?;
        let mut data = vec![0u8; (range.size - 12) as usize];
        source.read_exact(&mut data)?;
        Ok(Some(data))
    }

    fn write_manifest_store<R: Read + Seek, W: Write>(
        &self,
        structure: &Structure,
        source: &mut R,
        writer: &mut W,
        manifest: Option<&[u8]>,
    ) -> Result<()> {
        let replacing = structure.has_manifest_store();
        let insert_at = if replacing {
            None
        } else {
            Some(Self::insertion_index(structure))
        };

        let mut written = false;
        for (index, segment) in structure.segments.iter().enumerate() {
            if Some(index) == insert_at {
                if let Some(manifest) = manifest {
                    Self::write_manifest_chunk(writer, manifest)?;
                    written = true;
                }
            }

            if segment.is_manifest_store() {
                if let Some(manifest) = manifest {
                    if !written {
                        Self::write_manifest_chunk(writer, manifest)?;
                        written = true;
                    }
                }
                continue;
            }

            let range = segment.location();
            source.seek(SeekFrom::Start(range.offset))?;
            copy_bytes(source, writer, range.size)?;
        }

        if !written {
            if let Some(manifest) = manifest {
                Self::write_manifest_chunk(writer, manifest)?;
            }
        }

        Ok(())
    }

    fn data_hash_exclusions(
        &self,
        structure: &Structure,
        placeholder_signature: Option<Exclusion>,
    ) -> Result<Vec<Exclusion>> {
        let mut exclusions: Vec<Exclusion> = Vec::new();

        for segment in structure.manifest_segments() {
            let range = segment.location();
            match exclusions.last_mut() {
                Some(last) if last.start + last.length == range.offset => {
                    last.length += range.size;
                }
                _ => exclusions.push(Exclusion::new(range.offset, range.size)),
            }
        }

        if let Some(placeholder) = placeholder_signature {
            if !exclusions.contains(&placeholder) {
                exclusions.push(placeholder);
            }
        }

        Ok(exclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&crc32(chunk_type, data).to_be_bytes());
        out
    }

    fn minimal_png() -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(chunk(b"IHDR", &[0u8; 13]));
        data.extend(chunk(b"IDAT", &[1, 2, 3, 4]));
        data.extend(chunk(b"IEND", &[]));
        data
    }

    #[test]
    fn test_can_read_magic() {
        assert!(PngIO::can_read(&[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00
        ]));
        assert!(!PngIO::can_read(&[
            0x89, 0x50, 0x4E, 0x47, 0x00, 0x00, 0x00, 0x00, 0x00
        ]));
        assert!(!PngIO::can_read(&[0x89, 0x50]));
    }

    #[test]
    fn test_crc_known_value() {
        // CRC of IEND with empty data is a published constant
        assert_eq!(crc32(b"IEND", &[]), 0xAE42_6082);
    }

    #[test]
    fn test_parse_minimal() {
        let data = minimal_png();
        let structure = PngIO::new().parse(&mut Cursor::new(&data)).unwrap();
        assert_eq!(structure.kind, ContainerKind::Png);
        assert!(!structure.has_manifest_store());
        let covered: u64 = structure.segments.iter().map(|s| s.total_size()).sum();
        assert_eq!(covered, data.len() as u64);
    }

    #[test]
    fn test_parse_rejects_bad_signature() {
        let mut data = minimal_png();
        data[4] = 0x00;
        assert!(matches!(
            PngIO::new().parse(&mut Cursor::new(&data)),
            Err(Error::NotAValidAsset("PNG"))
        ));
    }

    #[test]
    fn test_manifest_inserted_before_idat() {
        let data = minimal_png();
        let handler = PngIO::new();
        let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

        let manifest = b"jumbf bytes".to_vec();
        let mut output = Vec::new();
        handler
            .write_manifest_store(
                &structure,
                &mut Cursor::new(&data),
                &mut output,
                Some(&manifest),
            )
            .unwrap();

        let structure2 = handler.parse(&mut Cursor::new(&output)).unwrap();
        let manifest_index = structure2.manifest_indices()[0];
        let idat_index = structure2
            .segments
            .iter()
            .position(|s| s.kind == SegmentKind::MediaData)
            .unwrap();
        assert!(manifest_index < idat_index);

        let read_back = handler
            .read_manifest_store(&structure2, &mut Cursor::new(&output))
            .unwrap();
        assert_eq!(read_back, Some(manifest));
    }

    #[test]
    fn test_remove_manifest_restores_original() {
        let data = minimal_png();
        let handler = PngIO::new();
        let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

        let mut with_manifest = Vec::new();
        handler
            .write_manifest_store(
                &structure,
                &mut Cursor::new(&data),
                &mut with_manifest,
                Some(b"store"),
            )
            .unwrap();

        let structure2 = handler.parse(&mut Cursor::new(&with_manifest)).unwrap();
        let mut removed = Vec::new();
        handler
            .write_manifest_store(
                &structure2,
                &mut Cursor::new(&with_manifest),
                &mut removed,
                None,
            )
            .unwrap();

        assert_eq!(removed, data);
    }

    #[test]
    fn test_replace_keeps_other_chunks_byte_exact() {
        let data = minimal_png();
        let handler = PngIO::new();
        let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

        let mut first = Vec::new();
        handler
            .write_manifest_store(&structure, &mut Cursor::new(&data), &mut first, Some(b"one"))
            .unwrap();

        let structure2 = handler.parse(&mut Cursor::new(&first)).unwrap();
        let mut second = Vec::new();
        handler
            .write_manifest_store(
                &structure2,
                &mut Cursor::new(&first),
                &mut second,
                Some(b"two!!"),
            )
            .unwrap();

        // Stripping both copies leaves identical bytes
        let structure_a = handler.parse(&mut Cursor::new(&first)).unwrap();
        let mut stripped_a = Vec::new();
        handler
            .write_manifest_store(&structure_a, &mut Cursor::new(&first), &mut stripped_a, None)
            .unwrap();
        let structure_b = handler.parse(&mut Cursor::new(&second)).unwrap();
        let mut stripped_b = Vec::new();
        handler
            .write_manifest_store(&structure_b, &mut Cursor::new(&second), &mut stripped_b, None)
            .unwrap();
        assert_eq!(stripped_a, stripped_b);
    }
}
