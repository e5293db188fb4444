//! Ingredient assertion (`c2pa.ingredient`)

use crate::{error::Result, jumbf::SuperBox, manifest::HashedUri};
use serde::{Deserialize, Serialize};

/// How an ingredient relates to the asset carrying the claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    /// The asset was derived from this ingredient
    #[serde(rename = "parentOf")]
    ParentOf,
    /// The ingredient is composited into the asset
    #[serde(rename = "componentOf")]
    ComponentOf,
    /// The ingredient supplies data referenced by the asset
    #[serde(rename = "inputTo")]
    InputTo,
}

/// References another asset that contributed to this one, optionally with
/// the manifest it carried at the time of use.
///
/// Manifest references are labels resolved against the store's table, not
/// owning pointers, so ingredient graphs cannot form cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientAssertion {
    /// Title of the ingredient asset
    #[serde(rename = "dc:title")]
    pub title: String,
    /// MIME type of the ingredient asset
    #[serde(rename = "dc:format")]
    pub format: String,
    /// Instance id of the ingredient asset
    #[serde(rename = "instanceID", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Document id of the ingredient asset
    #[serde(rename = "documentID", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Relationship of the ingredient to this asset
    pub relationship: Relationship,
    /// Reference to the ingredient's active manifest in this store
    #[serde(rename = "c2pa_manifest", skip_serializing_if = "Option::is_none")]
    pub manifest_ref: Option<HashedUri>,
    /// Reference to the ingredient manifest's claim signature
    #[serde(rename = "claim_signature", skip_serializing_if = "Option::is_none")]
    pub claim_signature_ref: Option<HashedUri>,
    /// Reference to a thumbnail assertion for the ingredient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<HashedUri>,
    /// Validation results recorded when the ingredient was imported
    #[serde(rename = "validationStatus", skip_serializing_if = "Option::is_none")]
    pub validation_status: Option<Vec<String>>,
}

impl IngredientAssertion {
    /// Box label for this assertion
    pub const LABEL: &'static str = "c2pa.ingredient";

    /// Create an ingredient reference without a manifest link
    pub fn new(
        title: impl Into<String>,
        format: impl Into<String>,
        relationship: Relationship,
    ) -> Self {
        Self {
            title: title.into(),
            format: format.into(),
            instance_id: None,
            document_id: None,
            relationship,
            manifest_ref: None,
            claim_signature_ref: None,
            thumbnail: None,
            validation_status: None,
        }
    }

    /// Link this ingredient to a manifest in the same store
    pub fn with_manifest_ref(mut self, manifest_ref: HashedUri) -> Self {
        self.manifest_ref = Some(manifest_ref);
        self
    }

    /// Interpret an assertion super box
    pub fn from_jumbf(sbox: &SuperBox) -> Result<Self> {
        super::cbor_assertion_content(sbox)
    }

    /// Generate the super box carrying this assertion
    pub fn to_jumbf(&self) -> Result<SuperBox> {
        super::cbor_assertion_box(Self::LABEL, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_manifest_ref() {
        let assertion = IngredientAssertion::new(
            "source.jpg",
            "image/jpeg",
            Relationship::ParentOf,
        )
        .with_manifest_ref(HashedUri::new(
            "self#jumbf=/c2pa/urn:uuid:deadbeef".into(),
            Some("sha256".into()),
            vec![0x11; 32],
        ));

        let sbox = assertion.to_jumbf().unwrap();
        let bytes = sbox.serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();
        let decoded = IngredientAssertion::from_jumbf(&parsed).unwrap();
        assert_eq!(decoded, assertion);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_relationship_labels() {
        let assertion =
            IngredientAssertion::new("part.png", "image/png", Relationship::ComponentOf);
        let sbox = assertion.to_jumbf().unwrap();
        let value: ciborium::Value = match sbox.data_box().unwrap() {
            crate::jumbf::DataBox::Cbor(cbor) => cbor.to_deserializable().unwrap(),
            _ => unreachable!(),
        };
        let map = value.as_map().unwrap();
        let relationship = map
            .iter()
            .find(|(k, _)| k.as_text() == Some("relationship"))
            .map(|(_, v)| v)
            .unwrap();
        assert_eq!(relationship.as_text(), Some("componentOf"));
    }
}
