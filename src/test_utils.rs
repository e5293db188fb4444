//! Synthetic asset fixtures for tests
//!
//! Minimal but structurally valid files for every supported container, plus
//! helpers for building opaque manifest-store stand-ins. Available to
//! downstream crates behind the `test-utils` feature.

/// Smallest structurally valid JPEG: SOI, a JFIF stub, one scan, EOI
pub fn minimal_jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
    data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, 0x01, 0x02]);
    data.extend_from_slice(&[0x10, 0x20, 0x30, 0x40, 0x50]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// Smallest structurally valid PNG: signature, IHDR, one IDAT, IEND
pub fn minimal_png() -> Vec<u8> {
    fn chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
        // Matching CRC is required for the output to re-parse
        let mut table = [0u32; 256];
        for (n, entry) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            }
            *entry = c;
        }
        let mut crc = 0xFFFF_FFFFu32;
        for byte in chunk_type.iter().chain(data.iter()) {
            crc = table[((crc ^ *byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        crc ^= 0xFFFF_FFFF;

        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
    data.extend(chunk(b"IDAT", &[0x08, 0xD7, 0x63, 0x60, 0x00, 0x00]));
    data.extend(chunk(b"IEND", &[]));
    data
}

/// Smallest structurally valid MP3: a bare MPEG frame-sync stream
pub fn minimal_mp3() -> Vec<u8> {
    let mut data = vec![0xFF, 0xFB, 0x90, 0x00];
    data.extend_from_slice(&[0x55; 96]);
    data
}

/// An MP3 with an ID3v2.4 tag carrying one TIT2 frame
pub fn minimal_mp3_with_tag() -> Vec<u8> {
    let title = b"\x00fixture";
    let mut frames = Vec::new();
    frames.extend_from_slice(b"TIT2");
    frames.extend_from_slice(&[
        ((title.len() >> 21) & 0x7F) as u8,
        ((title.len() >> 14) & 0x7F) as u8,
        ((title.len() >> 7) & 0x7F) as u8,
        (title.len() & 0x7F) as u8,
    ]);
    frames.extend_from_slice(&[0, 0]);
    frames.extend_from_slice(title);

    let mut data = Vec::new();
    data.extend_from_slice(b"ID3");
    data.extend_from_slice(&[4, 0, 0]);
    data.extend_from_slice(&[
        ((frames.len() >> 21) & 0x7F) as u8,
        ((frames.len() >> 14) & 0x7F) as u8,
        ((frames.len() >> 7) & 0x7F) as u8,
        (frames.len() & 0x7F) as u8,
    ]);
    data.extend_from_slice(&frames);
    data.extend_from_slice(&minimal_mp3());
    data
}

/// An opaque stand-in for a manifest store: a single JUMBF box header
/// wrapping `payload`. Good enough for container-level round-trips that
/// never parse the box contents.
pub fn opaque_manifest(payload: &[u8]) -> Vec<u8> {
    let mut manifest = Vec::with_capacity(payload.len() + 8);
    manifest.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    manifest.extend_from_slice(b"jumb");
    manifest.extend_from_slice(payload);
    manifest
}
