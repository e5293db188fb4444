//! Box type tags and content-type UUIDs

/// A 4CC box type tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    /// Super box
    pub const JUMB: BoxType = BoxType(*b"jumb");
    /// Description box
    pub const JUMD: BoxType = BoxType(*b"jumd");
    /// CBOR content box
    pub const CBOR: BoxType = BoxType(*b"cbor");
    /// JSON content box
    pub const JSON: BoxType = BoxType(*b"json");
    /// Raw binary data box
    pub const BIDB: BoxType = BoxType(*b"bidb");
    /// UUID-tagged content box
    pub const UUID: BoxType = BoxType(*b"uuid");
    /// JPEG 2000 code-stream box
    pub const JP2C: BoxType = BoxType(*b"jp2c");
    /// Embedded file description box
    pub const BFDB: BoxType = BoxType(*b"bfdb");
    /// Salt box attached to assertion content
    pub const C2SH: BoxType = BoxType(*b"c2sh");
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 4CCs are printable ASCII in every box this engine emits; anything
        // else (from a fallback box) renders as hex
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl std::fmt::Debug for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoxType({self})")
    }
}

/// Build a JUMBF content-type UUID from a 4CC prefix
///
/// Content-type UUIDs share the suffix 0011-0010-8000-00AA00389B71 with a
/// 4CC in the leading four bytes.
pub const fn jumbf_content_uuid(tag: [u8; 4]) -> [u8; 16] {
    [
        tag[0], tag[1], tag[2], tag[3], 0x00, 0x11, 0x00, 0x10, 0x80, 0x00, 0x00, 0xAA, 0x00,
        0x38, 0x9B, 0x71,
    ]
}

/// CBOR content type
pub const CBOR_CONTENT_UUID: [u8; 16] = jumbf_content_uuid(*b"cbor");
/// JSON content type
pub const JSON_CONTENT_UUID: [u8; 16] = jumbf_content_uuid(*b"json");
/// Code-stream content type
pub const CODESTREAM_CONTENT_UUID: [u8; 16] = jumbf_content_uuid(*b"jp2c");

/// C2PA manifest store
pub const MANIFEST_STORE_UUID: [u8; 16] = jumbf_content_uuid(*b"c2pa");
/// C2PA manifest
pub const MANIFEST_UUID: [u8; 16] = jumbf_content_uuid(*b"c2ma");
/// C2PA claim
pub const CLAIM_UUID: [u8; 16] = jumbf_content_uuid(*b"c2cl");
/// C2PA claim signature
pub const SIGNATURE_UUID: [u8; 16] = jumbf_content_uuid(*b"c2cs");
/// C2PA assertion store
pub const ASSERTION_STORE_UUID: [u8; 16] = jumbf_content_uuid(*b"c2as");

/// ISO embedded-file content type (bfdb + bidb pair)
pub const EMBEDDED_FILE_UUID: [u8; 16] = [
    0x40, 0xCB, 0x0C, 0x32, 0xBB, 0x8A, 0x48, 0x9D, 0xA7, 0x0B, 0x2A, 0xD6, 0xF4, 0x7F, 0x43,
    0x69,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_printable() {
        assert_eq!(BoxType::JUMB.to_string(), "jumb");
        assert_eq!(BoxType(*b"text").to_string(), "text");
    }

    #[test]
    fn test_display_non_printable_as_hex() {
        assert_eq!(BoxType([0x00, 0x01, 0x02, 0x03]).to_string(), "0x00010203");
    }

    #[test]
    fn test_content_uuid_layout() {
        assert_eq!(&CBOR_CONTENT_UUID[..4], b"cbor");
        assert_eq!(
            &CBOR_CONTENT_UUID[4..],
            &[0x00, 0x11, 0x00, 0x10, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71]
        );
    }
}
