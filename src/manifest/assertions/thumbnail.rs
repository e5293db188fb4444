//! Thumbnail assertion (`c2pa.thumbnail.*`)
//!
//! Carried as an embedded file: a `bfdb` description box with the media
//! type followed by a `bidb` box with the image bytes.

use crate::{
    error::{Error, Result},
    jumbf::{BinaryBox, DataBox, EmbeddedFileDescBox, SuperBox, EMBEDDED_FILE_UUID},
};

/// An embedded preview image for the claim or an ingredient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailAssertion {
    /// Full label, e.g. `c2pa.thumbnail.claim.jpeg`
    pub label: String,
    /// Media type of the embedded image
    pub media_type: String,
    /// Image bytes
    pub data: Vec<u8>,
}

impl ThumbnailAssertion {
    /// Labels for this assertion family start with this prefix
    pub const LABEL_PREFIX: &'static str = "c2pa.thumbnail";

    /// Create a claim thumbnail; `kind` is the label suffix such as
    /// `claim.jpeg` or `ingredient.png`
    pub fn new(kind: &str, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            label: format!("{}.{kind}", Self::LABEL_PREFIX),
            media_type: media_type.into(),
            data,
        }
    }

    /// Interpret an assertion super box
    pub fn from_jumbf(sbox: &SuperBox) -> Result<Self> {
        let label = sbox.label().unwrap_or("").to_string();
        let malformed = |reason: &str| Error::AssertionDecoding {
            label: label.clone(),
            reason: reason.into(),
        };

        let mut media_type = None;
        let mut data = None;
        for child in &sbox.children {
            match child.as_data_box() {
                Some(DataBox::EmbeddedFileDesc(desc)) => {
                    media_type = Some(desc.media_type.clone());
                }
                Some(DataBox::Binary(binary)) => {
                    data = Some(binary.data.clone());
                }
                _ => {}
            }
        }

        let media_type = media_type.ok_or_else(|| malformed("missing bfdb description"))?;
        let data = data.ok_or_else(|| malformed("missing bidb payload"))?;

        Ok(Self {
            label,
            media_type,
            data,
        })
    }

    /// Generate the super box carrying this assertion
    pub fn to_jumbf(&self) -> Result<SuperBox> {
        let mut sbox = SuperBox::new(EMBEDDED_FILE_UUID, &self.label);
        sbox.add_data(DataBox::EmbeddedFileDesc(EmbeddedFileDescBox::new(
            &self.media_type,
            None,
        )));
        sbox.add_data(DataBox::Binary(BinaryBox {
            data: self.data.clone(),
        }));
        Ok(sbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let assertion =
            ThumbnailAssertion::new("claim.jpeg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(assertion.label, "c2pa.thumbnail.claim.jpeg");

        let sbox = assertion.to_jumbf().unwrap();
        let bytes = sbox.serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();
        let decoded = ThumbnailAssertion::from_jumbf(&parsed).unwrap();
        assert_eq!(decoded, assertion);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_missing_payload_rejected() {
        let sbox = SuperBox::new(EMBEDDED_FILE_UUID, "c2pa.thumbnail.claim.jpeg");
        assert!(matches!(
            ThumbnailAssertion::from_jumbf(&sbox),
            Err(Error::AssertionDecoding { .. })
        ));
    }
}
