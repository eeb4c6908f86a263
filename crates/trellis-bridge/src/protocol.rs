//! Wire messages exchanged with the external crawling agent.
//!
//! Messages are tagged records (`"action"` discriminant) over whatever
//! byte channel the surrounding shell provides. Field names are stable —
//! the agent and the persistence layer key on them. A malformed inbound
//! message is logged and dropped; it never tears the channel down.

use serde::{Deserialize, Serialize};
use tracing::warn;

use trellis_core::{PageType, Structure};

/// Messages the agent sends to this process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Start (or restart) training for a captured page.
    OpenTrainingScreen {
        /// Opaque reference the page fetcher resolves to the captured page.
        page_ref: String,
        platform_url: String,
        /// Known when retraining; None on a first pass.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_type: Option<PageType>,
    },
    /// Replay a (possibly agent-adjusted) structure for confirmation.
    DoubleCheck { session: String, structure: Structure },
    /// End the whole training process.
    Terminate,
}

/// Messages this process sends to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GuiMessage {
    /// A submitted training pass: the trained structure for one page type.
    Structure {
        session: String,
        #[serde(flatten)]
        structure: Structure,
    },
    /// Operator verdict on a double-check pass.
    Confirmation { session: String, accepted: bool },
}

/// Decode an inbound agent message. Lenient surface: malformed input is
/// warned about and dropped, keeping the channel alive.
pub fn decode_agent(raw: &str) -> Option<AgentMessage> {
    match serde_json::from_str(raw) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(%err, "dropping malformed agent message");
            None
        }
    }
}

/// Encode an outbound message for the channel.
pub fn encode_gui(message: &GuiMessage) -> anyhow::Result<String> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Label, PathLocator, Strategy};

    #[test]
    fn open_training_screen_decodes() {
        let raw = r#"{
            "action": "open_training_screen",
            "page_ref": "page-42",
            "platform_url": "forum.example",
            "page_type": "ThreadPage"
        }"#;
        let msg = decode_agent(raw).unwrap();
        assert_eq!(
            msg,
            AgentMessage::OpenTrainingScreen {
                page_ref: "page-42".into(),
                platform_url: "forum.example".into(),
                page_type: Some(PageType::ThreadPage),
            }
        );
    }

    #[test]
    fn page_type_defaults_to_none_on_first_pass() {
        let raw = r#"{
            "action": "open_training_screen",
            "page_ref": "page-1",
            "platform_url": "forum.example"
        }"#;
        let Some(AgentMessage::OpenTrainingScreen { page_type, .. }) = decode_agent(raw) else {
            panic!("expected open_training_screen");
        };
        assert_eq!(page_type, None);
    }

    #[test]
    fn malformed_messages_are_dropped_not_fatal() {
        assert_eq!(decode_agent("not json"), None);
        assert_eq!(decode_agent(r#"{"action": "launch_missiles"}"#), None);
        assert_eq!(decode_agent(r#"{"action": "double_check"}"#), None);
        assert_eq!(decode_agent(""), None);
    }

    #[test]
    fn structure_message_flattens_wire_fields() {
        let mut structure = Structure::empty(PageType::LoginPage);
        structure.set(
            Label::UsernameInput,
            Some(PathLocator::new(Strategy::ByPath(
                "/html[1]/body[1]/form[1]/input[1]".into(),
            ))),
        );
        let msg = GuiMessage::Structure {
            session: "01HZX".into(),
            structure,
        };
        let json = encode_gui(&msg).unwrap();
        assert!(json.contains(r#""action":"structure""#));
        assert!(json.contains(r#""page_type":"LoginPage""#));
        assert!(json.contains(r#""structural_elements""#));
        assert!(json.contains(r#""script":"""#));

        let back: GuiMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn confirmation_round_trip() {
        let msg = GuiMessage::Confirmation {
            session: "01HZX".into(),
            accepted: false,
        };
        let json = encode_gui(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"action":"confirmation","session":"01HZX","accepted":false}"#
        );
    }

    #[test]
    fn double_check_carries_structure() {
        let structure = Structure::empty(PageType::FrontPage);
        let msg = AgentMessage::DoubleCheck {
            session: "01HZX".into(),
            structure: structure.clone(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back = decode_agent(&json).unwrap();
        assert_eq!(back, msg);
    }
}
