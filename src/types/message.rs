//! Triggers, messaging actions and host event descriptors

use serde::{Deserialize, Serialize};
use crate::error::ParseError;
use crate::types::CycleOutput;

/// What caused a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Page load or auto-activation
    Load,
    /// Debounced input inside a recognized field
    Input,
    /// Change event inside a recognized field
    Change,
    /// Change-detection poll
    Poll,
    /// Explicit calculate command
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::Load => "load",
            Trigger::Input => "input",
            Trigger::Change => "change",
            Trigger::Poll => "poll",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Messaging verbs understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Activate,
    Deactivate,
    GetStatus,
    Calculate,
}

impl std::str::FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activate" => Ok(Action::Activate),
            "deactivate" => Ok(Action::Deactivate),
            "getstatus" | "status" => Ok(Action::GetStatus),
            "calculate" | "calc" => Ok(Action::Calculate),
            other => Err(ParseError::UnknownAction(other.to_string())),
        }
    }
}

/// Messaging request envelope: `{"action": "calculate"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
}

/// Acknowledgment returned for every action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CycleOutput>,
}

impl Ack {
    pub fn ok(message: impl Into<String>, active: bool) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            active,
            output: None,
        }
    }

    pub fn status(active: bool) -> Self {
        Self {
            success: true,
            message: None,
            active,
            output: None,
        }
    }

    pub fn with_output(mut self, output: CycleOutput) -> Self {
        self.output = Some(output);
        self
    }
}

/// Kind of host event reported by the page bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEventKind {
    Input,
    Change,
    Blur,
}

impl std::fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HostEventKind::Input => "input",
            HostEventKind::Change => "change",
            HostEventKind::Blur => "blur",
        };
        f.write_str(name)
    }
}

/// Event dispatched on the host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEvent {
    pub kind: HostEventKind,
    pub bubbles: bool,
}

impl HostEvent {
    /// Bubbling event, the kind the host's bindings listen for
    pub fn bubbling(kind: HostEventKind) -> Self {
        Self { kind, bubbles: true }
    }

    /// The sequence a human edit produces, in order
    pub fn commit_sequence() -> [HostEvent; 3] {
        [
            Self::bubbling(HostEventKind::Input),
            Self::bubbling(HostEventKind::Change),
            Self::bubbling(HostEventKind::Blur),
        ]
    }
}

/// Element that received a user edit on the host page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub test_id: String,
    /// Target sits inside a modal or dialog
    #[serde(default)]
    pub in_modal: bool,
}

/// User edit reported by the page bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEdit {
    pub kind: HostEventKind,
    pub target: EventTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let req: Request = serde_json::from_str(r#"{"action":"getStatus"}"#).unwrap();
        assert_eq!(req.action, Action::GetStatus);
        let json = serde_json::to_string(&Action::Calculate).unwrap();
        assert_eq!(json, "\"calculate\"");
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("Activate".parse::<Action>(), Ok(Action::Activate));
        assert_eq!("status".parse::<Action>(), Ok(Action::GetStatus));
        assert_eq!(
            "reload".parse::<Action>(),
            Err(ParseError::UnknownAction("reload".to_string()))
        );
    }

    #[test]
    fn test_commit_sequence_order() {
        let kinds: Vec<_> = HostEvent::commit_sequence().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![HostEventKind::Input, HostEventKind::Change, HostEventKind::Blur]);
        assert!(HostEvent::commit_sequence().iter().all(|e| e.bubbles));
    }

    #[test]
    fn test_status_ack_omits_message() {
        let json = serde_json::to_string(&Ack::status(true)).unwrap();
        assert_eq!(json, r#"{"success":true,"active":true}"#);
    }
}
