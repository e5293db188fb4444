//! Actions assertion (`c2pa.actions`)

use crate::{error::Result, jumbf::SuperBox};
use serde::{Deserialize, Serialize};

/// One step in the asset's edit/creation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action label, e.g. `c2pa.created` or `c2pa.edited`
    pub action: String,
    /// When the action happened (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// The tool that performed the action
    #[serde(rename = "softwareAgent", skip_serializing_if = "Option::is_none")]
    pub software_agent: Option<String>,
    /// IPTC digital source type URI
    #[serde(rename = "digitalSourceType", skip_serializing_if = "Option::is_none")]
    pub digital_source_type: Option<String>,
    /// Free-form action parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ciborium::Value>,
}

impl Action {
    /// Create an action with just a label
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            when: None,
            software_agent: None,
            digital_source_type: None,
            parameters: None,
        }
    }

    /// Record the performing tool
    pub fn with_software_agent(mut self, agent: impl Into<String>) -> Self {
        self.software_agent = Some(agent.into());
        self
    }

    /// Record the IPTC digital source type
    pub fn with_digital_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.digital_source_type = Some(source_type.into());
        self
    }
}

/// The asset's ordered edit/creation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsAssertion {
    /// Actions in the order they happened
    pub actions: Vec<Action>,
    /// Assertion-level metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ciborium::Value>,
}

impl ActionsAssertion {
    /// Box label for this assertion
    pub const LABEL: &'static str = "c2pa.actions";

    /// Create an empty history
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            metadata: None,
        }
    }

    /// Append an action
    pub fn add_action(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
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

impl Default for ActionsAssertion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_order() {
        let mut assertion = ActionsAssertion::new();
        assertion
            .add_action(
                Action::new("c2pa.created")
                    .with_software_agent("provenance-core/0.1.0")
                    .with_digital_source_type(
                        "http://cv.iptc.org/newscodes/digitalsourcetype/digitalCapture",
                    ),
            )
            .add_action(Action::new("c2pa.edited"));

        let sbox = assertion.to_jumbf().unwrap();
        let bytes = sbox.serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();
        let decoded = ActionsAssertion::from_jumbf(&parsed).unwrap();
        assert_eq!(decoded, assertion);
        assert_eq!(decoded.actions[0].action, "c2pa.created");
        assert_eq!(decoded.actions[1].action, "c2pa.edited");
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_parameters_survive_as_cbor() {
        let mut assertion = ActionsAssertion::new();
        let mut action = Action::new("c2pa.resized");
        action.parameters = Some(ciborium::Value::Map(vec![(
            ciborium::Value::Text("width".into()),
            ciborium::Value::Integer(1024.into()),
        )]));
        assertion.add_action(action);

        let sbox = assertion.to_jumbf().unwrap();
        let decoded = ActionsAssertion::from_jumbf(&sbox).unwrap();
        assert_eq!(decoded, assertion);
    }
}
