use crate::modules::protocol::{ClientFrame, ServerFrame};
use serde_json::Value;
use thiserror::Error;

/// Which UI unit to show and with what data. Consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstruction {
    pub component_name: String,
    pub props: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Render(RenderInstruction),
    Message(String),
    ConnectionEstablished { thread_id: String },
    /// Valid JSON object with a `type` this client does not handle, or none at all.
    Ignored,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid json: {0}")]
    Malformed(serde_json::Error),
    #[error("frame is not a json object")]
    NotAnObject,
    #[error("frame does not match its declared type: {0}")]
    Schema(serde_json::Error),
    #[error("failed to encode frame: {0}")]
    Encode(serde_json::Error),
}

pub fn decode_frame(raw: &str) -> Result<FrameEvent, FrameError> {
    let value: Value = serde_json::from_str(raw).map_err(FrameError::Malformed)?;
    let Some(obj) = value.as_object() else {
        return Err(FrameError::NotAnObject);
    };
    if !obj.get("type").is_some_and(Value::is_string) {
        return Ok(FrameEvent::Ignored);
    }

    let frame: ServerFrame = serde_json::from_value(value).map_err(FrameError::Schema)?;
    Ok(match frame {
        ServerFrame::UiComponent { data } => FrameEvent::Render(RenderInstruction {
            component_name: data.name,
            props: data.props,
        }),
        ServerFrame::Message { data } => FrameEvent::Message(data.content),
        ServerFrame::ConnectionEstablished { thread_id } => {
            FrameEvent::ConnectionEstablished { thread_id }
        }
        ServerFrame::Unknown => FrameEvent::Ignored,
    })
}

pub fn encode_frame(frame: &ClientFrame) -> Result<String, FrameError> {
    serde_json::to_string(frame).map_err(FrameError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ui_component_props_pass_through_unchanged() {
        let raw = r#"{"type":"ui_component","data":{"name":"quote_approval_card","props":{"vendor":"Acme","total_amount":300,"lines":[{"sku":"A-1","qty":2}]}}}"#;
        let event = decode_frame(raw).unwrap();
        assert_eq!(
            event,
            FrameEvent::Render(RenderInstruction {
                component_name: "quote_approval_card".to_string(),
                props: json!({"vendor": "Acme", "total_amount": 300, "lines": [{"sku": "A-1", "qty": 2}]}),
            })
        );
    }

    #[test]
    fn message_and_connection_frames() {
        assert_eq!(
            decode_frame(r#"{"type":"message","data":{"content":"hello"}}"#).unwrap(),
            FrameEvent::Message("hello".to_string())
        );
        assert_eq!(
            decode_frame(r#"{"type":"connection_established","thread_id":"t-9"}"#).unwrap(),
            FrameEvent::ConnectionEstablished {
                thread_id: "t-9".to_string()
            }
        );
    }

    #[test]
    fn unknown_or_missing_type_is_ignored() {
        for raw in [
            r#"{"type":"typing_indicator","data":{}}"#,
            r#"{"data":{"name":"x"}}"#,
            r#"{"type":7}"#,
            r#"{}"#,
        ] {
            assert_eq!(decode_frame(raw).unwrap(), FrameEvent::Ignored, "{raw}");
        }
    }

    #[test]
    fn malformed_and_non_object_frames_are_errors() {
        assert!(matches!(decode_frame("{invalid"), Err(FrameError::Malformed(_))));
        assert!(matches!(decode_frame(""), Err(FrameError::Malformed(_))));
        assert!(matches!(decode_frame("[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(decode_frame("\"ui_component\""), Err(FrameError::NotAnObject)));
    }

    #[test]
    fn mistyped_known_frame_is_schema_error() {
        let raw = r#"{"type":"ui_component","data":{"name":5,"props":{}}}"#;
        assert!(matches!(decode_frame(raw), Err(FrameError::Schema(_))));
    }

    #[test]
    fn non_object_props_are_kept_as_sent() {
        let raw = r#"{"type":"ui_component","data":{"name":"vendor_list","props":null}}"#;
        let FrameEvent::Render(instr) = decode_frame(raw).unwrap() else {
            panic!("expected render");
        };
        assert_eq!(instr.props, Value::Null);
    }
}
