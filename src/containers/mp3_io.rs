//! MP3 container I/O
//!
//! The manifest store is wrapped in an ID3v2 `GEOB` frame with MIME type
//! `application/x-c2pa-manifest-store` and content description `c2pa`.
//! ID3v2.3 and v2.4 tags are both read; a freshly created tag is v2.4.
//! MPEG audio frames are never touched.

use crate::{
    error::{Error, Result},
    segment::{Exclusion, Segment, SegmentKind},
    structure::Structure,
    ContainerKind,
};
use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Seek, SeekFrom, Write};

use super::{copy_bytes, ContainerIO};

const ID3_MAGIC: &[u8; 3] = b"ID3";
const GEOB: &[u8; 4] = b"GEOB";
const MANIFEST_MIME: &[u8] = b"application/x-c2pa-manifest-store";
const MANIFEST_DESCRIPTION: &[u8] = b"c2pa";

const TAG_HEADER_LEN: u64 = 10;
const FRAME_HEADER_LEN: u64 = 10;

fn synchsafe_decode(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

fn synchsafe_encode(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// MP3 container I/O implementation
pub struct Mp3IO;

impl Mp3IO {
    /// Create a new MP3 handler
    pub fn new() -> Self {
        Self
    }

    fn parse_impl<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        let total_size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let mut prefix = [0u8; 10];
        let got = source.read(&mut prefix)?;

        let mut structure = Structure::new(ContainerKind::Mp3);
        structure.total_size = total_size;

        if got >= 10 && &prefix[..3] == ID3_MAGIC {
            let version = prefix[3];
            if version != 3 && version != 4 {
                return Err(Error::InvalidSegment {
                    offset: 0,
                    reason: format!("unsupported ID3v2.{version} tag"),
                });
            }
            let tag_size = synchsafe_decode(&prefix[6..10]) as u64;
            let tag_end = TAG_HEADER_LEN + tag_size;
            if tag_end > total_size {
                return Err(Error::InvalidSegment {
                    offset: 0,
                    reason: "ID3 tag runs past end of file".into(),
                });
            }

            structure.add_segment(Segment::new(
                0,
                TAG_HEADER_LEN,
                SegmentKind::Header,
                Some(format!("id3v{version}")),
            ));

            self.parse_frames(source, &mut structure, version, tag_end)?;

            if tag_end < total_size {
                structure.add_segment(Segment::new(
                    tag_end,
                    total_size - tag_end,
                    SegmentKind::MediaData,
                    Some("mpeg".into()),
                ));
            }
        } else if got >= 2 && prefix[0] == 0xFF && prefix[1] & 0xE0 == 0xE0 {
            // Bare MPEG stream, no tag
            structure.add_segment(Segment::new(
                0,
                total_size,
                SegmentKind::MediaData,
                Some("mpeg".into()),
            ));
        } else {
            return Err(Error::NotAValidAsset("MP3"));
        }

        Ok(structure)
    }

    fn parse_frames<R: Read + Seek>(
        &self,
        source: &mut R,
        structure: &mut Structure,
        version: u8,
        tag_end: u64,
    ) -> Result<()> {
        let mut offset = TAG_HEADER_LEN;
        source.seek(SeekFrom::Start(offset))?;

        while offset + FRAME_HEADER_LEN <= tag_end {
            let mut header = [0u8; 10];
            source.read_exact(&mut header)?;

            if header[0] == 0 {
                // Padding runs to the end of the tag
                structure.add_segment(Segment::new(
                    offset,
                    tag_end - offset,
                    SegmentKind::Other,
                    Some("padding".into()),
                ));
                return Ok(());
            }

            let data_len = if version == 4 {
                synchsafe_decode(&header[4..8]) as u64
            } else {
                BigEndian::read_u32(&header[4..8]) as u64
            };
            let frame_size = FRAME_HEADER_LEN + data_len;
            if offset + frame_size > tag_end {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: "ID3 frame runs past end of tag".into(),
                });
            }

            let frame_id = [header[0], header[1], header[2], header[3]];
            let is_manifest = frame_id == *GEOB && {
                let probe_len = (data_len as usize).min(1 + MANIFEST_MIME.len() + 1);
                let mut probe = vec![0u8; probe_len];
                source.read_exact(&mut probe)?;
                probe.len() > 1 + MANIFEST_MIME.len()
                    && &probe[1..1 + MANIFEST_MIME.len()] == MANIFEST_MIME
                    && probe[1 + MANIFEST_MIME.len()] == 0
            };

            let (kind, path) = if is_manifest {
                (SegmentKind::ManifestStore, "GEOB".to_string())
            } else {
                (
                    SegmentKind::Other,
                    String::from_utf8_lossy(&frame_id).into_owned(),
                )
            };
            structure.add_segment(Segment::new(offset, frame_size, kind, Some(path)));

            offset += frame_size;
            source.seek(SeekFrom::Start(offset))?;
        }

        // Leftover bytes too short for a frame header count as padding
        if offset < tag_end {
            structure.add_segment(Segment::new(
                offset,
                tag_end - offset,
                SegmentKind::Other,
                Some("padding".into()),
            ));
        }

        Ok(())
    }

    fn tag_version(structure: &Structure) -> Option<u8> {
        let header = structure.segments.first()?;
        match header.path() {
            "id3v3" => Some(3),
            "id3v4" => Some(4),
            _ => None,
        }
    }

    /// GEOB frame (header + data) carrying the manifest bytes
    fn build_manifest_frame(manifest: &[u8], version: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(manifest.len() + 64);
        data.push(0x00); // text encoding: Latin-1
        data.extend_from_slice(MANIFEST_MIME);
        data.push(0);
        data.push(0); // empty filename
        data.extend_from_slice(MANIFEST_DESCRIPTION);
        data.push(0);
        data.extend_from_slice(manifest);

        let mut frame = Vec::with_capacity(data.len() + FRAME_HEADER_LEN as usize);
        frame.extend_from_slice(GEOB);
        if version == 4 {
            frame.extend_from_slice(&synchsafe_encode(data.len() as u32));
        } else {
            frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
        }
        frame.extend_from_slice(&[0, 0]); // frame flags
        frame.extend_from_slice(&data);
        frame
    }
}

impl Default for Mp3IO {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerIO for Mp3IO {
    fn container_type() -> ContainerKind {
        ContainerKind::Mp3
    }

    fn extensions() -> &'static [&'static str] {
        &["mp3"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["audio/mpeg", "audio/mp3"]
    }

    fn can_read(prefix: &[u8]) -> bool {
        (prefix.len() >= 3 && &prefix[..3] == ID3_MAGIC)
            || (prefix.len() >= 2 && prefix[0] == 0xFF && prefix[1] & 0xE0 == 0xE0)
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
        source.seek(SeekFrom::Start(range.offset + FRAME_HEADER_LEN))?;
        let mut data = vec![0u8; (range.size - FRAME_HEADER_LEN) as usize];
        source.read_exact(&mut data)?;

        // encoding byte, MIME, filename, description, then the payload
        let malformed = || Error::InvalidSegment {
            offset: range.offset,
            reason: "GEOB manifest frame malformed".into(),
        };
        let mut pos = 1usize;
        for _ in 0..3 {
            let nul = data[pos..].iter().position(|b| *b == 0).ok_or_else(malformed)?;
            pos += nul + 1;
        }

        Ok(Some(data[pos..].to_vec()))
    }

    fn write_manifest_store<R: Read + Seek, W: Write>(
        &self,
        structure: &Structure,
        source: &mut R,
        writer: &mut W,
        manifest: Option<&[u8]>,
    ) -> Result<()> {
        let version = Self::tag_version(structure);

        // Rebuild the tag payload in memory; tags are small by construction
        let mut payload: Vec<u8> = Vec::new();
        let mut media_segments: Vec<&Segment> = Vec::new();

        for segment in &structure.segments {
            match segment.kind {
                SegmentKind::Header => {}
                SegmentKind::MediaData => media_segments.push(segment),
                SegmentKind::ManifestStore => {} // dropped; re-added below
                SegmentKind::Other => {
                    let range = segment.location();
                    source.seek(SeekFrom::Start(range.offset))?;
                    let mut bytes = vec![0u8; range.size as usize];
                    source.read_exact(&mut bytes)?;
                    payload.extend_from_slice(&bytes);
                }
            }
        }

        if let Some(manifest) = manifest {
            let frame = Self::build_manifest_frame(manifest, version.unwrap_or(4));
            payload.extend_from_slice(&frame);
        }

        if payload.len() > 0x0FFF_FFFF {
            return Err(Error::DataTooLarge {
                size: payload.len(),
                max: 0x0FFF_FFFF,
            });
        }

        if !payload.is_empty() {
            let version = version.unwrap_or(4);
            writer.write_all(ID3_MAGIC)?;
            writer.write_all(&[version, 0, 0])?;
            writer.write_all(&synchsafe_encode(payload.len() as u32))?;
            writer.write_all(&payload)?;
        }

        for segment in media_segments {
            let range = segment.location();
            source.seek(SeekFrom::Start(range.offset))?;
            copy_bytes(source, writer, range.size)?;
        }

        Ok(())
    }

    fn data_hash_exclusions(
        &self,
        structure: &Structure,
        placeholder_signature: Option<Exclusion>,
    ) -> Result<Vec<Exclusion>> {
        let mut exclusions: Vec<Exclusion> = structure
            .manifest_segments()
            .map(|segment| {
                let range = segment.location();
                Exclusion::new(range.offset, range.size)
            })
            .collect();

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

    fn bare_mpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xFB, 0x90, 0x00];
        data.extend_from_slice(&[0xAA; 64]);
        data
    }

    fn mp3_with_tag() -> Vec<u8> {
        // TIT2 frame with a short Latin-1 title
        let title = b"\x00hi";
        let mut frames = Vec::new();
        frames.extend_from_slice(b"TIT2");
        frames.extend_from_slice(&synchsafe_encode(title.len() as u32));
        frames.extend_from_slice(&[0, 0]);
        frames.extend_from_slice(title);

        let mut data = Vec::new();
        data.extend_from_slice(b"ID3");
        data.extend_from_slice(&[4, 0, 0]);
        data.extend_from_slice(&synchsafe_encode(frames.len() as u32));
        data.extend_from_slice(&frames);
        data.extend_from_slice(&bare_mpeg());
        data
    }

    #[test]
    fn test_can_read_magic() {
        assert!(Mp3IO::can_read(&[0x49, 0x44, 0x33, 0x04, 0x00]));
        assert!(Mp3IO::can_read(&[0xFF, 0xFB, 0x90]));
        assert!(!Mp3IO::can_read(&[0x00, 0x01, 0x02]));
    }

    #[test]
    fn test_synchsafe_round_trip() {
        for value in [0u32, 1, 127, 128, 0x0FFF_FFFF] {
            assert_eq!(synchsafe_decode(&synchsafe_encode(value)), value);
        }
    }

    #[test]
    fn test_parse_bare_stream() {
        let data = bare_mpeg();
        let structure = Mp3IO::new().parse(&mut Cursor::new(&data)).unwrap();
        assert!(!structure.has_manifest_store());
        assert_eq!(structure.segments.len(), 1);
        assert_eq!(structure.segments[0].kind, SegmentKind::MediaData);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Mp3IO::new().parse(&mut Cursor::new(vec![0x00, 0x01, 0x02])),
            Err(Error::NotAValidAsset("MP3"))
        ));
    }

    #[test]
    fn test_manifest_round_trip_with_existing_tag() {
        let data = mp3_with_tag();
        let handler = Mp3IO::new();
        let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

        let manifest = b"jumbf manifest bytes".to_vec();
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
        assert!(structure2.has_manifest_store());
        let read_back = handler
            .read_manifest_store(&structure2, &mut Cursor::new(&output))
            .unwrap();
        assert_eq!(read_back, Some(manifest));
    }

    #[test]
    fn test_manifest_round_trip_creates_tag() {
        let data = bare_mpeg();
        let handler = Mp3IO::new();
        let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

        let manifest = b"store".to_vec();
        let mut output = Vec::new();
        handler
            .write_manifest_store(
                &structure,
                &mut Cursor::new(&data),
                &mut output,
                Some(&manifest),
            )
            .unwrap();

        assert_eq!(&output[..3], b"ID3");
        let structure2 = handler.parse(&mut Cursor::new(&output)).unwrap();
        let read_back = handler
            .read_manifest_store(&structure2, &mut Cursor::new(&output))
            .unwrap();
        assert_eq!(read_back, Some(manifest));
    }

    #[test]
    fn test_remove_manifest_restores_original() {
        for data in [bare_mpeg(), mp3_with_tag()] {
            let handler = Mp3IO::new();
            let structure = handler.parse(&mut Cursor::new(&data)).unwrap();

            let mut with_manifest = Vec::new();
            handler
                .write_manifest_store(
                    &structure,
                    &mut Cursor::new(&data),
                    &mut with_manifest,
                    Some(b"manifest"),
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
    }
}
