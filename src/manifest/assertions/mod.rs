//! Assertion variants
//!
//! Each assertion is a super box whose label is its type tag. Known types
//! decode to typed content; anything else is preserved verbatim as an
//! unknown assertion. Every variant round-trips both its decoded fields
//! and its original bytes.

mod actions;
mod bmff_hash;
mod data_hash;
mod ingredient;
mod thumbnail;

pub use actions::{Action, ActionsAssertion};
pub use bmff_hash::{BmffExclusion, BmffHashAssertion, MerkleMap};
pub use data_hash::DataHashAssertion;
pub use ingredient::{IngredientAssertion, Relationship};
pub use thumbnail::ThumbnailAssertion;

use crate::{
    error::{Error, Result},
    jumbf::{CborBox, DataBox, SuperBox, CBOR_CONTENT_UUID},
};

/// A typed statement about the asset, carried inside a JUMBF super box
#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    /// `c2pa.hash.data` - binds the asset bytes outside the exclusions
    DataHash(DataHashAssertion),
    /// `c2pa.hash.bmff.v2` - binds an ISO-BMFF box tree
    BmffHash(BmffHashAssertion),
    /// `c2pa.ingredient` - references another asset or manifest
    Ingredient(IngredientAssertion),
    /// `c2pa.actions` - edit/creation history
    Actions(ActionsAssertion),
    /// `c2pa.thumbnail.*` - embedded preview image
    Thumbnail(ThumbnailAssertion),
    /// Any other label; the super box is preserved verbatim
    Unknown(SuperBox),
}

impl Assertion {
    /// The label this assertion is stored under
    pub fn label(&self) -> &str {
        match self {
            Self::DataHash(_) => DataHashAssertion::LABEL,
            Self::BmffHash(_) => BmffHashAssertion::LABEL,
            Self::Ingredient(_) => IngredientAssertion::LABEL,
            Self::Actions(_) => ActionsAssertion::LABEL,
            Self::Thumbnail(thumbnail) => &thumbnail.label,
            Self::Unknown(sbox) => sbox.label().unwrap_or(""),
        }
    }

    /// Interpret an assertion super box by its label
    pub fn from_jumbf(sbox: &SuperBox) -> Result<Self> {
        let label = sbox.label().unwrap_or("");
        match label {
            DataHashAssertion::LABEL => {
                Ok(Self::DataHash(DataHashAssertion::from_jumbf(sbox)?))
            }
            BmffHashAssertion::LABEL => {
                Ok(Self::BmffHash(BmffHashAssertion::from_jumbf(sbox)?))
            }
            IngredientAssertion::LABEL => {
                Ok(Self::Ingredient(IngredientAssertion::from_jumbf(sbox)?))
            }
            ActionsAssertion::LABEL => Ok(Self::Actions(ActionsAssertion::from_jumbf(sbox)?)),
            other if other.starts_with(ThumbnailAssertion::LABEL_PREFIX) => {
                Ok(Self::Thumbnail(ThumbnailAssertion::from_jumbf(sbox)?))
            }
            _ => Ok(Self::Unknown(sbox.clone())),
        }
    }

    /// Generate the super box carrying this assertion
    pub fn to_jumbf(&self) -> Result<SuperBox> {
        match self {
            Self::DataHash(a) => a.to_jumbf(),
            Self::BmffHash(a) => a.to_jumbf(),
            Self::Ingredient(a) => a.to_jumbf(),
            Self::Actions(a) => a.to_jumbf(),
            Self::Thumbnail(a) => a.to_jumbf(),
            Self::Unknown(sbox) => Ok(sbox.clone()),
        }
    }
}

/// Build the standard CBOR-content assertion super box
pub(crate) fn cbor_assertion_box<T: serde::Serialize>(
    label: &str,
    content: &T,
) -> Result<SuperBox> {
    let mut sbox = SuperBox::new(CBOR_CONTENT_UUID, label);
    sbox.add_data(DataBox::Cbor(CborBox::from_serializable(content)?));
    Ok(sbox)
}

/// Decode the CBOR content of an assertion super box
pub(crate) fn cbor_assertion_content<T: serde::de::DeserializeOwned>(
    sbox: &SuperBox,
) -> Result<T> {
    let label = sbox.label().unwrap_or("").to_string();
    let cbor = match sbox.data_box() {
        Some(DataBox::Cbor(cbor)) => cbor,
        _ => {
            return Err(Error::AssertionDecoding {
                label,
                reason: "expected a CBOR content box".into(),
            })
        }
    };
    cbor.to_deserializable()
        .map_err(|e| Error::AssertionDecoding {
            label,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jumbf::MANIFEST_UUID;

    #[test]
    fn test_unknown_assertion_round_trips_verbatim() {
        let mut sbox = SuperBox::new(CBOR_CONTENT_UUID, "org.example.custom");
        sbox.add_data(DataBox::Cbor(CborBox::new(ciborium::Value::Text(
            "custom".into(),
        ))));
        let bytes = sbox.serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();

        let assertion = Assertion::from_jumbf(&parsed).unwrap();
        assert!(matches!(assertion, Assertion::Unknown(_)));
        assert_eq!(assertion.label(), "org.example.custom");
        assert_eq!(assertion.to_jumbf().unwrap().serialize(), bytes);
    }

    #[test]
    fn test_dispatch_by_label() {
        let data_hash = DataHashAssertion::new(crate::crypto::HashAlgorithm::Sha256);
        let sbox = data_hash.to_jumbf().unwrap();
        let assertion = Assertion::from_jumbf(&sbox).unwrap();
        assert!(matches!(assertion, Assertion::DataHash(_)));
    }

    #[test]
    fn test_wrong_content_box_rejected() {
        let sbox = SuperBox::new(MANIFEST_UUID, DataHashAssertion::LABEL);
        assert!(matches!(
            Assertion::from_jumbf(&sbox),
            Err(Error::AssertionDecoding { .. })
        ));
    }
}
