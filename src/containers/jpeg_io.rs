//! JPEG container I/O
//!
//! The manifest store rides in APP11 marker segments using the JPEG XT
//! carriage: each segment carries a two-byte common identifier ("JP"), a
//! box-instance number, a packet sequence number, and a repeat of the JUMBF
//! box header, so one JUMBF box can span many 64KB-limited segments.

use crate::{
    error::{Error, Result},
    segment::{ByteRange, Exclusion, Segment, SegmentKind},
    structure::Structure,
    ContainerKind,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use super::{copy_bytes, ContainerIO};

// JPEG markers
const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP11: u8 = 0xEB; // JUMBF carriage
const SOS: u8 = 0xDA; // Start of Scan (entropy data follows)
const TEM: u8 = 0x01;

// Standalone markers without a length field
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

const XT_COMMON_IDENTIFIER: &[u8; 2] = b"JP";
const XT_BOX_INSTANCE: u16 = 0x0001;
const JUMB_TAG: &[u8; 4] = b"jumb";

const MAX_MARKER_SIZE: usize = 65533; // marker length field is u16, minus itself
// CI (2) + En (2) + Z (4) + LBox (4) + TBox (4)
const XT_HEADER_LEN: usize = 16;
const MAX_CHUNK: usize = MAX_MARKER_SIZE - XT_HEADER_LEN;

/// JPEG container I/O implementation
pub struct JpegIO;

impl JpegIO {
    /// Create a new JPEG handler
    pub fn new() -> Self {
        Self
    }

    /// Fast single-pass parser
    fn parse_impl<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        let total_size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        if source.read_u8()? != 0xFF || source.read_u8()? != SOI {
            return Err(Error::NotAValidAsset("JPEG"));
        }

        let mut structure = Structure::new(ContainerKind::Jpeg);
        structure.total_size = total_size;
        structure.add_segment(Segment::new(0, 2, SegmentKind::Header, None));

        let mut offset = 2u64;

        loop {
            let marker_prefix = source.read_u8()?;
            if marker_prefix != 0xFF {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: format!("expected 0xFF, got 0x{marker_prefix:02X}"),
                });
            }

            let mut marker = source.read_u8()?;
            let mut fill = 0u64;
            // Fill bytes before a marker are legal
            while marker == 0xFF {
                marker = source.read_u8()?;
                fill += 1;
            }

            match marker {
                EOI => {
                    structure.add_segment(Segment::new(
                        offset,
                        2 + fill,
                        SegmentKind::Other,
                        Some("eoi".into()),
                    ));
                    offset += 2 + fill;
                    // Preserve anything after EOI verbatim
                    if offset < total_size {
                        structure.add_segment(Segment::new(
                            offset,
                            total_size - offset,
                            SegmentKind::Other,
                            Some("trailer".into()),
                        ));
                    }
                    break;
                }

                SOS => {
                    // Entropy-coded data runs until EOI; treat the whole
                    // region (including the SOS header) as media data
                    let eoi_offset = find_eoi(source)?;
                    structure.add_segment(Segment::new(
                        offset,
                        eoi_offset - offset,
                        SegmentKind::MediaData,
                        Some("sos".into()),
                    ));
                    offset = eoi_offset;
                    source.seek(SeekFrom::Start(offset))?;
                }

                TEM | RST0..=RST7 => {
                    structure.add_segment(Segment::new(
                        offset,
                        2 + fill,
                        SegmentKind::Other,
                        Some(format!("0x{marker:02X}")),
                    ));
                    offset += 2 + fill;
                }

                APP11 => {
                    let size = source.read_u16::<BigEndian>()? as u64;
                    if size < 2 {
                        return Err(Error::InvalidSegment {
                            offset,
                            reason: "APP11 length shorter than its own field".into(),
                        });
                    }

                    let mut is_manifest = false;
                    if size as usize >= 2 + XT_HEADER_LEN {
                        let mut header = [0u8; XT_HEADER_LEN];
                        source.read_exact(&mut header)?;
                        is_manifest =
                            &header[..2] == XT_COMMON_IDENTIFIER && &header[12..16] == JUMB_TAG;
                    }

                    let kind = if is_manifest {
                        SegmentKind::ManifestStore
                    } else {
                        SegmentKind::Other
                    };
                    structure.add_segment(Segment::new(
                        offset,
                        fill + 2 + size,
                        kind,
                        Some("app11".into()),
                    ));
                    offset += fill + 2 + size;
                    source.seek(SeekFrom::Start(offset))?;
                }

                _ => {
                    // Standard marker with length
                    let size = source.read_u16::<BigEndian>()? as u64;
                    if size < 2 {
                        return Err(Error::InvalidSegment {
                            offset,
                            reason: format!("marker 0x{marker:02X} has invalid length"),
                        });
                    }
                    structure.add_segment(Segment::new(
                        offset,
                        fill + 2 + size,
                        SegmentKind::Other,
                        Some(format!("app_{marker:02x}")),
                    ));
                    offset += fill + 2 + size;
                    source.seek(SeekFrom::Start(offset))?;
                }
            }
        }

        Ok(structure)
    }

    /// Index of the segment before which a new manifest store is inserted:
    /// after the header and any leading APP0/APP1 markers
    fn insertion_index(structure: &Structure) -> usize {
        let mut index = 0;
        for (i, segment) in structure.segments.iter().enumerate() {
            let leading = segment.kind == SegmentKind::Header
                || matches!(segment.path(), "app_e0" | "app_e1");
            if leading {
                index = i + 1;
            } else {
                break;
            }
        }
        index
    }

    /// Write one or more APP11 packets carrying `manifest`
    fn write_manifest_segments<W: Write>(writer: &mut W, manifest: &[u8]) -> Result<()> {
        if manifest.len() < 8 {
            return Err(Error::MalformedBox {
                offset: 0,
                reason: "manifest store shorter than a box header".into(),
            });
        }

        // Every packet repeats the 8-byte JUMBF box header after the
        // sequence number; the chunks cover the remainder of the box
        let box_header = &manifest[..8];
        let payload = &manifest[8..];

        for (packet, chunk) in payload.chunks(MAX_CHUNK).enumerate() {
            writer.write_u8(0xFF)?;
            writer.write_u8(APP11)?;
            writer.write_u16::<BigEndian>((chunk.len() + XT_HEADER_LEN + 2) as u16)?;
            writer.write_all(XT_COMMON_IDENTIFIER)?;
            writer.write_u16::<BigEndian>(XT_BOX_INSTANCE)?;
            writer.write_u32::<BigEndian>((packet + 1) as u32)?;
            writer.write_all(box_header)?;
            writer.write_all(chunk)?;
        }

        Ok(())
    }
}

impl Default for JpegIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerIO for JpegIO {
    fn container_type() -> ContainerKind {
        ContainerKind::Jpeg
    }

    fn extensions() -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/jpeg", "image/jpg"]
    }

    fn can_read(prefix: &[u8]) -> bool {
        prefix.len() >= 2 && prefix[0] == 0xFF && prefix[1] == SOI
    }

    fn parse<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        self.parse_impl(source)
    }

    fn read_manifest_store<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>> {
        if !structure.has_manifest_store() {
            return Ok(None);
        }

        let mut manifest: Vec<u8> = Vec::new();

        for (index, segment) in structure.manifest_segments().enumerate() {
            let range = segment.location();
            source.seek(SeekFrom::Start(range.offset + 4))?; // skip FF EB + length

            let mut xt_header = [0u8; XT_HEADER_LEN];
            source.read_exact(&mut xt_header)?;

            if index == 0 {
                manifest.extend_from_slice(&xt_header[8..16]); // LBox + TBox
            }

            let chunk_len = range.size - 4 - XT_HEADER_LEN as u64;
            let mut chunk = vec![0u8; chunk_len as usize];
            source.read_exact(&mut chunk)?;
            manifest.extend_from_slice(&chunk);
        }

        Ok(Some(manifest))
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
                    Self::write_manifest_segments(writer, manifest)?;
                    written = true;
                }
            }

            if segment.is_manifest_store() {
                // New store replaces the first carrier run; removal skips it
                if let Some(manifest) = manifest {
                    if !written {
                        Self::write_manifest_segments(writer, manifest)?;
                        written = true;
                    }
                }
                continue;
            }

            let range = segment.location();
            source.seek(SeekFrom::Start(range.offset))?;
            copy_bytes(source, writer, range.size)?;
        }

        // Insertion point at end of segment list
        if !written {
            if let Some(manifest) = manifest {
                Self::write_manifest_segments(writer, manifest)?;
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
            let range: ByteRange = segment.location();
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

/// Scan forward for the EOI marker (FFD9); returns its offset
fn find_eoi<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let mut prev = 0u8;

    loop {
        let byte = reader.read_u8()?;
        if prev == 0xFF && byte == EOI {
            return Ok(reader.stream_position()? - 2);
        }
        prev = byte;
    }
}
