//! Content box variants
//!
//! Every variant keeps the payload bytes it was parsed from (or encoded to
//! at construction) so writing an unmodified box replays the exact image.

use crate::error::{Error, Result};

use super::{read_box_header, write_box_header, BoxHeader, BoxType};

/// CBOR content box (`cbor`)
///
/// An absent content value encodes the 1-byte CBOR `undefined` (0xF7)
/// payload, which is how an empty box appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CborBox {
    content: Option<ciborium::Value>,
    raw: Vec<u8>,
}

impl CborBox {
    /// An empty box (CBOR undefined payload)
    pub fn empty() -> Self {
        Self {
            content: None,
            raw: vec![0xf7],
        }
    }

    /// Encode a CBOR value
    pub fn new(content: ciborium::Value) -> Self {
        let mut raw = Vec::new();
        ciborium::ser::into_writer(&content, &mut raw).expect("CBOR encoding to Vec");
        Self {
            content: Some(content),
            raw,
        }
    }

    /// Wrap bytes that are already well-formed CBOR (e.g. a tagged
    /// COSE_Sign1) without re-encoding them
    pub fn from_raw_cbor(raw: Vec<u8>) -> Result<Self> {
        let content = ciborium::de::from_reader(raw.as_slice())
            .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
        Ok(Self {
            content: Some(content),
            raw,
        })
    }

    /// Encode any serde-serializable value as CBOR
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> Result<Self> {
        let mut raw = Vec::new();
        ciborium::ser::into_writer(value, &mut raw)
            .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
        let content = ciborium::de::from_reader(raw.as_slice())
            .map_err(|e| Error::ClaimDecoding(e.to_string()))?;
        Ok(Self {
            content: Some(content),
            raw,
        })
    }

    fn from_payload(raw: &[u8], offset: u64) -> Result<Self> {
        if raw == [0xf7] {
            return Ok(Self {
                content: None,
                raw: raw.to_vec(),
            });
        }
        let content =
            ciborium::de::from_reader(raw).map_err(|e| Error::MalformedBox {
                offset,
                reason: format!("CBOR payload: {e}"),
            })?;
        Ok(Self {
            content: Some(content),
            raw: raw.to_vec(),
        })
    }

    /// Decoded content; `None` means undefined/empty
    pub fn content(&self) -> Option<&ciborium::Value> {
        self.content.as_ref()
    }

    /// Exact payload bytes
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Decode the payload into a serde-deserializable type
    pub fn to_deserializable<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        ciborium::de::from_reader(self.raw.as_slice())
            .map_err(|e| Error::ClaimDecoding(e.to_string()))
    }
}

/// JSON content box (`json`)
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBox {
    content: serde_json::Value,
    raw: Vec<u8>,
}

impl JsonBox {
    /// Encode a JSON value
    pub fn new(content: serde_json::Value) -> Self {
        let raw = serde_json::to_vec(&content).expect("JSON encoding to Vec");
        Self { content, raw }
    }

    fn from_payload(raw: &[u8], offset: u64) -> Result<Self> {
        let content = serde_json::from_slice(raw).map_err(|e| Error::MalformedBox {
            offset,
            reason: format!("JSON payload: {e}"),
        })?;
        Ok(Self {
            content,
            raw: raw.to_vec(),
        })
    }

    /// Decoded content
    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }

    /// Exact payload bytes
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Raw binary data box (`bidb`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBox {
    /// Payload bytes
    pub data: Vec<u8>,
}

/// UUID-tagged content box (`uuid`): a 16-byte UUID followed by opaque data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidBox {
    /// Vendor UUID identifying the payload semantics
    pub uuid: [u8; 16],
    /// Opaque payload
    pub data: Vec<u8>,
}

/// Code-stream box (`jp2c`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodestreamBox {
    /// Compressed code-stream bytes
    pub data: Vec<u8>,
}

/// Salt box (`c2sh`): opaque salt attached to assertion content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltBox {
    /// Salt bytes
    pub salt: Vec<u8>,
}

/// Embedded file description box (`bfdb`)
///
/// Pairs with a following `bidb` carrying the file bytes. The toggle byte's
/// low bit signals a file name; unknown toggle bits survive through `raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFileDescBox {
    /// Media type of the embedded file
    pub media_type: String,
    /// Optional original file name
    pub file_name: Option<String>,
    raw: Vec<u8>,
}

const EMBEDDED_FILE_TOGGLE_NAME: u8 = 0x01;

impl EmbeddedFileDescBox {
    /// Create a description for an embedded file
    pub fn new(media_type: impl Into<String>, file_name: Option<String>) -> Self {
        let media_type = media_type.into();
        let mut raw = Vec::new();
        let mut toggles = 0u8;
        if file_name.is_some() {
            toggles |= EMBEDDED_FILE_TOGGLE_NAME;
        }
        raw.push(toggles);
        raw.extend_from_slice(media_type.as_bytes());
        raw.push(0);
        if let Some(name) = &file_name {
            raw.extend_from_slice(name.as_bytes());
            raw.push(0);
        }
        Self {
            media_type,
            file_name,
            raw,
        }
    }

    fn from_payload(raw: &[u8], offset: u64) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedBox {
            offset,
            reason: reason.into(),
        };

        if raw.is_empty() {
            return Err(malformed("embedded file description empty"));
        }
        let toggles = raw[0];
        let rest = &raw[1..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| malformed("media type missing NUL"))?;
        let media_type = String::from_utf8(rest[..nul].to_vec())
            .map_err(|_| malformed("media type is not UTF-8"))?;

        let file_name = if toggles & EMBEDDED_FILE_TOGGLE_NAME != 0 {
            let rest = &rest[nul + 1..];
            let name_nul = rest
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| malformed("file name missing NUL"))?;
            Some(
                String::from_utf8(rest[..name_nul].to_vec())
                    .map_err(|_| malformed("file name is not UTF-8"))?,
            )
        } else {
            None
        };

        Ok(Self {
            media_type,
            file_name,
            raw: raw.to_vec(),
        })
    }
}

/// Fallback for any unrecognized box type: tag and payload preserved verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBox {
    /// Original type tag
    pub box_type: BoxType,
    /// Payload bytes
    pub data: Vec<u8>,
}

/// A non-super content box: a closed variant set plus the fallback
#[derive(Debug, Clone, PartialEq)]
pub enum DataBox {
    Cbor(CborBox),
    Json(JsonBox),
    Binary(BinaryBox),
    Uuid(UuidBox),
    Codestream(CodestreamBox),
    EmbeddedFileDesc(EmbeddedFileDescBox),
    Salt(SaltBox),
    Unknown(UnknownBox),
}

impl DataBox {
    /// The type tag this box writes
    pub fn box_type(&self) -> BoxType {
        match self {
            Self::Cbor(_) => BoxType::CBOR,
            Self::Json(_) => BoxType::JSON,
            Self::Binary(_) => BoxType::BIDB,
            Self::Uuid(_) => BoxType::UUID,
            Self::Codestream(_) => BoxType::JP2C,
            Self::EmbeddedFileDesc(_) => BoxType::BFDB,
            Self::Salt(_) => BoxType::C2SH,
            Self::Unknown(unknown) => unknown.box_type,
        }
    }

    /// Parse one content box from `data` at `offset`.
    ///
    /// Returns the box and the number of bytes consumed. The caller routes
    /// `jumb` to the super-box parser before calling this.
    pub(crate) fn parse(data: &[u8], offset: u64) -> Result<(Self, u64)> {
        let header = read_box_header(data, offset)?;
        Self::parse_with_header(data, offset, header)
    }

    pub(crate) fn parse_with_header(
        data: &[u8],
        offset: u64,
        header: BoxHeader,
    ) -> Result<(Self, u64)> {
        let payload_start = (offset + header.header_len) as usize;
        let payload_end = (offset + header.size) as usize;
        let payload = &data[payload_start..payload_end];

        let parsed = match header.box_type {
            BoxType::CBOR => Self::Cbor(CborBox::from_payload(payload, offset)?),
            BoxType::JSON => Self::Json(JsonBox::from_payload(payload, offset)?),
            BoxType::BIDB => Self::Binary(BinaryBox {
                data: payload.to_vec(),
            }),
            BoxType::UUID => {
                if payload.len() < 16 {
                    return Err(Error::MalformedBox {
                        offset,
                        reason: "uuid box payload shorter than 16 bytes".into(),
                    });
                }
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(&payload[..16]);
                Self::Uuid(UuidBox {
                    uuid,
                    data: payload[16..].to_vec(),
                })
            }
            BoxType::JP2C => Self::Codestream(CodestreamBox {
                data: payload.to_vec(),
            }),
            BoxType::BFDB => {
                Self::EmbeddedFileDesc(EmbeddedFileDescBox::from_payload(payload, offset)?)
            }
            BoxType::C2SH => Self::Salt(SaltBox {
                salt: payload.to_vec(),
            }),
            other => Self::Unknown(UnknownBox {
                box_type: other,
                data: payload.to_vec(),
            }),
        };

        Ok((parsed, header.size))
    }

    fn payload_len(&self) -> u64 {
        match self {
            Self::Cbor(b) => b.raw.len() as u64,
            Self::Json(b) => b.raw.len() as u64,
            Self::Binary(b) => b.data.len() as u64,
            Self::Uuid(b) => 16 + b.data.len() as u64,
            Self::Codestream(b) => b.data.len() as u64,
            Self::EmbeddedFileDesc(b) => b.raw.len() as u64,
            Self::Salt(b) => b.salt.len() as u64,
            Self::Unknown(b) => b.data.len() as u64,
        }
    }

    /// Total serialized size including the box header
    pub fn measure(&self) -> u64 {
        let payload = self.payload_len();
        super::header_len_for(payload) + payload
    }

    /// Serialize into `out`
    pub fn write(&self, out: &mut Vec<u8>) {
        write_box_header(out, self.box_type(), self.payload_len());
        match self {
            Self::Cbor(b) => out.extend_from_slice(&b.raw),
            Self::Json(b) => out.extend_from_slice(&b.raw),
            Self::Binary(b) => out.extend_from_slice(&b.data),
            Self::Uuid(b) => {
                out.extend_from_slice(&b.uuid);
                out.extend_from_slice(&b.data);
            }
            Self::Codestream(b) => out.extend_from_slice(&b.data),
            Self::EmbeddedFileDesc(b) => out.extend_from_slice(&b.raw),
            Self::Salt(b) => out.extend_from_slice(&b.salt),
            Self::Unknown(b) => out.extend_from_slice(&b.data),
        }
    }

    /// Serialize to a fresh buffer
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.measure() as usize);
        self.write(&mut out);
        out
    }
}
