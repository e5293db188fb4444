//! Description box (`jumd`)

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

use super::{read_box_header, write_box_header, BoxType};

// Toggle bits
const TOGGLE_REQUESTABLE: u8 = 0x01;
const TOGGLE_LABEL: u8 = 0x02;
const TOGGLE_ID: u8 = 0x04;
const TOGGLE_HASH: u8 = 0x08;
const TOGGLE_PRIVATE: u8 = 0x10;

/// The mandatory first child of every super box: carries the 16-byte
/// content-type UUID plus optional label, numeric id, payload hash, and
/// private boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionBox {
    /// Content-type UUID for the parent super box's payload
    pub uuid: [u8; 16],
    /// Whether the super box can be requested by URI
    pub requestable: bool,
    /// Optional label (NUL-terminated UTF-8 on the wire)
    pub label: Option<String>,
    /// Optional 32-bit application id
    pub id: Option<u32>,
    /// Optional SHA-256 of the parent's payload
    pub hash: Option<[u8; 32]>,
    /// Raw bytes of any trailing private box(es), preserved verbatim
    pub private: Option<Vec<u8>>,
}

impl DescriptionBox {
    /// Create a labeled, requestable description box
    pub fn new(uuid: [u8; 16], label: impl Into<String>) -> Self {
        Self {
            uuid,
            requestable: true,
            label: Some(label.into()),
            id: None,
            hash: None,
            private: None,
        }
    }

    /// Attach a payload hash
    pub fn with_hash(mut self, hash: [u8; 32]) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Attach raw private box bytes
    pub fn with_private(mut self, private: Vec<u8>) -> Self {
        self.private = Some(private);
        self
    }

    /// Parse a description box from `data` at `offset`.
    ///
    /// Returns the box and the number of bytes consumed.
    pub fn parse(data: &[u8], offset: u64) -> Result<(Self, u64)> {
        let header = read_box_header(data, offset)?;
        if header.box_type != BoxType::JUMD {
            return Err(Error::UnexpectedBoxType {
                expected: BoxType::JUMD.to_string(),
                found: header.box_type.to_string(),
            });
        }

        let payload_start = (offset + header.header_len) as usize;
        let payload_end = (offset + header.size) as usize;
        let payload = &data[payload_start..payload_end];

        if payload.len() < 17 {
            return Err(Error::MalformedBox {
                offset,
                reason: format!("description payload {} bytes, need >= 17", payload.len()),
            });
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&payload[..16]);
        let toggles = payload[16];
        let mut pos = 17usize;

        let label = if toggles & TOGGLE_LABEL != 0 {
            let nul = payload[pos..].iter().position(|b| *b == 0).ok_or_else(|| {
                Error::MalformedBox {
                    offset,
                    reason: "label missing NUL terminator".into(),
                }
            })?;
            let label =
                String::from_utf8(payload[pos..pos + nul].to_vec()).map_err(|_| {
                    Error::MalformedBox {
                        offset,
                        reason: "label is not UTF-8".into(),
                    }
                })?;
            pos += nul + 1;
            Some(label)
        } else {
            None
        };

        let id = if toggles & TOGGLE_ID != 0 {
            if payload.len() < pos + 4 {
                return Err(Error::MalformedBox {
                    offset,
                    reason: "id field truncated".into(),
                });
            }
            let id = BigEndian::read_u32(&payload[pos..pos + 4]);
            pos += 4;
            Some(id)
        } else {
            None
        };

        let hash = if toggles & TOGGLE_HASH != 0 {
            if payload.len() < pos + 32 {
                return Err(Error::MalformedBox {
                    offset,
                    reason: "signature field truncated".into(),
                });
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&payload[pos..pos + 32]);
            pos += 32;
            Some(hash)
        } else {
            None
        };

        let private = if toggles & TOGGLE_PRIVATE != 0 {
            let private = payload[pos..].to_vec();
            pos = payload.len();
            Some(private)
        } else {
            None
        };

        if pos != payload.len() {
            return Err(Error::MalformedBox {
                offset,
                reason: format!(
                    "description box has {} trailing bytes",
                    payload.len() - pos
                ),
            });
        }

        Ok((
            Self {
                uuid,
                requestable: toggles & TOGGLE_REQUESTABLE != 0,
                label,
                id,
                hash,
                private,
            },
            header.size,
        ))
    }

    fn payload_len(&self) -> u64 {
        let mut len = 17u64;
        if let Some(label) = &self.label {
            len += label.len() as u64 + 1;
        }
        if self.id.is_some() {
            len += 4;
        }
        if self.hash.is_some() {
            len += 32;
        }
        if let Some(private) = &self.private {
            len += private.len() as u64;
        }
        len
    }

    /// Total serialized size including the box header
    pub fn measure(&self) -> u64 {
        let payload = self.payload_len();
        super::header_len_for(payload) + payload
    }

    /// Serialize into `out`
    pub fn write(&self, out: &mut Vec<u8>) {
        write_box_header(out, BoxType::JUMD, self.payload_len());
        out.extend_from_slice(&self.uuid);

        let mut toggles = 0u8;
        if self.requestable {
            toggles |= TOGGLE_REQUESTABLE;
        }
        if self.label.is_some() {
            toggles |= TOGGLE_LABEL;
        }
        if self.id.is_some() {
            toggles |= TOGGLE_ID;
        }
        if self.hash.is_some() {
            toggles |= TOGGLE_HASH;
        }
        if self.private.is_some() {
            toggles |= TOGGLE_PRIVATE;
        }
        out.push(toggles);

        if let Some(label) = &self.label {
            out.extend_from_slice(label.as_bytes());
            out.push(0);
        }
        if let Some(id) = self.id {
            out.extend_from_slice(&id.to_be_bytes());
        }
        if let Some(hash) = &self.hash {
            out.extend_from_slice(hash);
        }
        if let Some(private) = &self.private {
            out.extend_from_slice(private);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jumbf::CBOR_CONTENT_UUID;

    fn round_trip(desc: &DescriptionBox) -> DescriptionBox {
        let mut bytes = Vec::new();
        desc.write(&mut bytes);
        assert_eq!(bytes.len() as u64, desc.measure());
        let (parsed, consumed) = DescriptionBox::parse(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len() as u64);
        parsed
    }

    #[test]
    fn test_label_round_trip() {
        let desc = DescriptionBox::new(CBOR_CONTENT_UUID, "c2pa.hash.data");
        let parsed = round_trip(&desc);
        assert_eq!(parsed, desc);
        assert!(parsed.requestable);
        assert_eq!(parsed.label.as_deref(), Some("c2pa.hash.data"));
    }

    #[test]
    fn test_all_fields_round_trip() {
        let desc = DescriptionBox {
            uuid: CBOR_CONTENT_UUID,
            requestable: true,
            label: Some("c2pa.assertions".into()),
            id: Some(7),
            hash: Some([0x5a; 32]),
            private: Some(vec![0, 0, 0, 9, b'c', b'2', b's', b'h', 0x01]),
        };
        assert_eq!(round_trip(&desc), desc);
    }

    #[test]
    fn test_unlabeled_round_trip() {
        let desc = DescriptionBox {
            uuid: CBOR_CONTENT_UUID,
            requestable: false,
            label: None,
            id: None,
            hash: None,
            private: None,
        };
        let parsed = round_trip(&desc);
        assert_eq!(parsed, desc);
        assert_eq!(parsed.measure(), 8 + 17);
    }

    #[test]
    fn test_missing_nul_rejected() {
        let desc = DescriptionBox::new(CBOR_CONTENT_UUID, "label");
        let mut bytes = Vec::new();
        desc.write(&mut bytes);
        let truncated = &bytes[..bytes.len() - 1];
        // Fix up the length so only the NUL is missing
        let mut data = truncated.to_vec();
        let new_len = data.len() as u32;
        data[..4].copy_from_slice(&new_len.to_be_bytes());
        assert!(DescriptionBox::parse(&data, 0).is_err());
    }
}
