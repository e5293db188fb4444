//! JUMBF (ISO/IEC 19566-5) box engine
//!
//! A typed-box container: length-prefixed, 4CC-tagged records, recursive
//! super-boxes, and a description box carrying content UUID, label, id,
//! and payload hash. Parsing is zero-assumption binary (big-endian fixed
//! width); every box retains the exact bytes it was read from, and the
//! write path replays them unless the box has been regenerated, so an
//! unmodified tree re-serializes byte-for-byte.

mod box_type;
mod data_box;
mod description_box;
mod super_box;

pub use box_type::{
    jumbf_content_uuid, BoxType, ASSERTION_STORE_UUID, CBOR_CONTENT_UUID, CLAIM_UUID,
    CODESTREAM_CONTENT_UUID, EMBEDDED_FILE_UUID, JSON_CONTENT_UUID, MANIFEST_STORE_UUID,
    MANIFEST_UUID, SIGNATURE_UUID,
};
pub use data_box::{
    BinaryBox, CborBox, CodestreamBox, DataBox, EmbeddedFileDescBox, JsonBox, SaltBox,
    UnknownBox, UuidBox,
};
pub use description_box::DescriptionBox;
pub use super_box::{ChildBox, SuperBox};

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Fixed header: 4-byte length + 4-byte type
pub const BOX_HEADER_LEN: u64 = 8;

/// A parsed box header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Total box size including the header itself
    pub size: u64,
    /// 4CC type tag
    pub box_type: BoxType,
    /// Bytes consumed by the header (8, or 16 with XLBox)
    pub header_len: u64,
}

impl BoxHeader {
    /// Payload length (total size minus header)
    pub fn payload_len(&self) -> u64 {
        self.size - self.header_len
    }
}

/// Read a box header from `data` at `offset`.
///
/// An LBox of 1 means a 64-bit XLBox follows; an LBox of 0 means the box
/// extends to the end of `data` (only legal for the last child of a parent).
pub(crate) fn read_box_header(data: &[u8], offset: u64) -> Result<BoxHeader> {
    let start = offset as usize;
    let remaining = data.len() as u64 - offset;

    if remaining < BOX_HEADER_LEN {
        return Err(Error::MalformedBox {
            offset,
            reason: format!("{remaining} bytes left, box header needs 8"),
        });
    }

    let lbox = BigEndian::read_u32(&data[start..start + 4]) as u64;
    let box_type = BoxType([
        data[start + 4],
        data[start + 5],
        data[start + 6],
        data[start + 7],
    ]);

    let (size, header_len) = match lbox {
        0 => (remaining, BOX_HEADER_LEN),
        1 => {
            if remaining < 16 {
                return Err(Error::MalformedBox {
                    offset,
                    reason: "XLBox header truncated".into(),
                });
            }
            let xlbox = BigEndian::read_u64(&data[start + 8..start + 16]);
            (xlbox, 16)
        }
        n => (n, BOX_HEADER_LEN),
    };

    if size < header_len || size > remaining {
        return Err(Error::MalformedBox {
            offset,
            reason: format!(
                "declared size {size} invalid ({remaining} bytes available)"
            ),
        });
    }

    Ok(BoxHeader {
        size,
        box_type,
        header_len,
    })
}

/// Write a box header for a payload of `payload_len` bytes.
///
/// Emits the 8-byte form unless the total would not fit in 32 bits.
pub(crate) fn write_box_header(out: &mut Vec<u8>, box_type: BoxType, payload_len: u64) {
    let total = payload_len + BOX_HEADER_LEN;
    if total <= u32::MAX as u64 {
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&box_type.0);
    } else {
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&box_type.0);
        out.extend_from_slice(&(total + 8).to_be_bytes());
    }
}

/// Header length that `write_box_header` will choose for a payload
pub(crate) fn header_len_for(payload_len: u64) -> u64 {
    if payload_len + BOX_HEADER_LEN <= u32::MAX as u64 {
        BOX_HEADER_LEN
    } else {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_read_header_short_form() {
        let data = hex!("0000001074657874 54727573744e5854");
        let header = read_box_header(&data, 0).unwrap();
        assert_eq!(header.size, 16);
        assert_eq!(header.box_type.to_string(), "text");
        assert_eq!(header.header_len, 8);
        assert_eq!(header.payload_len(), 8);
    }

    #[test]
    fn test_read_header_zero_extends_to_parent_end() {
        let mut data = hex!("00000000 63626f72").to_vec();
        data.extend_from_slice(&[0xf7; 5]);
        let header = read_box_header(&data, 0).unwrap();
        assert_eq!(header.size, 13);
        assert_eq!(header.payload_len(), 5);
    }

    #[test]
    fn test_read_header_xlbox() {
        let mut data = hex!("00000001 62696462 0000000000000015").to_vec();
        data.extend_from_slice(&[0xaa; 5]);
        let header = read_box_header(&data, 0).unwrap();
        assert_eq!(header.size, 21);
        assert_eq!(header.header_len, 16);
        assert_eq!(header.payload_len(), 5);
    }

    #[test]
    fn test_read_header_rejects_oversized_declaration() {
        let data = hex!("000000ff 63626f72 f7");
        assert!(matches!(
            read_box_header(&data, 0),
            Err(Error::MalformedBox { .. })
        ));
    }

    #[test]
    fn test_write_header_short_form() {
        let mut out = Vec::new();
        write_box_header(&mut out, BoxType(*b"cbor"), 1);
        assert_eq!(out, hex!("0000000963626f72"));
    }
}
