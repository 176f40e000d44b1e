use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys an outbound `user_action` frame owns; extra data may not shadow them.
pub const RESERVED_ACTION_KEYS: &[&str] = &["type", "action", "threadId"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UiComponentData {
    #[serde(default)]
    pub name: String,
    #[serde(default = "empty_props")]
    pub props: Value,
}

impl Default for UiComponentData {
    fn default() -> Self {
        Self {
            name: String::new(),
            props: empty_props(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageData {
    #[serde(default)]
    pub content: String,
}

/// Frames pushed by the agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerFrame {
    UiComponent {
        #[serde(default)]
        data: UiComponentData,
    },
    Message {
        #[serde(default)]
        data: MessageData,
    },
    ConnectionEstablished {
        #[serde(default)]
        thread_id: String,
    },
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub fn ui_component(name: impl Into<String>, props: Value) -> Self {
        ServerFrame::UiComponent {
            data: UiComponentData {
                name: name.into(),
                props,
            },
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        ServerFrame::Message {
            data: MessageData {
                content: content.into(),
            },
        }
    }
}

/// Frames originated by the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientFrame {
    UserAction {
        action: String,
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    UserMessage {
        content: String,
        #[serde(rename = "threadId")]
        thread_id: String,
    },
}

impl ClientFrame {
    /// Builds a `user_action` frame, discarding extra keys that collide with reserved ones.
    pub fn user_action(
        action: impl Into<String>,
        thread_id: impl Into<String>,
        mut extra: Map<String, Value>,
    ) -> Self {
        extra.retain(|k, _| !RESERVED_ACTION_KEYS.contains(&k.as_str()));
        ClientFrame::UserAction {
            action: action.into(),
            thread_id: thread_id.into(),
            extra,
        }
    }

    pub fn user_message(content: impl Into<String>, thread_id: impl Into<String>) -> Self {
        ClientFrame::UserMessage {
            content: content.into(),
            thread_id: thread_id.into(),
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            ClientFrame::UserAction { thread_id, .. } => thread_id,
            ClientFrame::UserMessage { thread_id, .. } => thread_id,
        }
    }
}

pub fn empty_props() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ui_component_defaults_missing_fields() {
        let frame: ServerFrame = serde_json::from_str(r#"{"type":"ui_component"}"#).unwrap();
        assert_eq!(frame, ServerFrame::ui_component("", json!({})));

        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"ui_component","data":{"name":"x"}}"#).unwrap();
        assert_eq!(frame, ServerFrame::ui_component("x", json!({})));
    }

    #[test]
    fn unknown_type_maps_to_unknown() {
        let frame: ServerFrame = serde_json::from_str(r#"{"type":"typing","data":{}}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown);
    }

    #[test]
    fn user_action_extra_cannot_shadow_thread_id() {
        let mut extra = Map::new();
        extra.insert("threadId".to_string(), json!("spoofed"));
        extra.insert("type".to_string(), json!("user_message"));
        extra.insert("quote_id".to_string(), json!("q-7"));

        let frame = ClientFrame::user_action("approve_quote", "thread-1", extra);
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "user_action",
                "action": "approve_quote",
                "threadId": "thread-1",
                "quote_id": "q-7",
            })
        );
    }

    #[test]
    fn user_message_wire_shape() {
        let v = serde_json::to_value(ClientFrame::user_message("hi", "t")).unwrap();
        assert_eq!(v, json!({"type": "user_message", "content": "hi", "threadId": "t"}));
    }
}
