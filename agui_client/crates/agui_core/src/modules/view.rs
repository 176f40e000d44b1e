use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Result of handing a user action to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The adapter is not connected; nothing was written.
    NotConnected,
    /// The outbound channel was full; nothing was written.
    Dropped,
}

/// Callback a rendered view uses to re-enter the transport.
pub trait ActionSink: Send + Sync {
    fn send_user_action(&self, action: &str, data: Map<String, Value>) -> SendOutcome;
}

/// Everything a renderer gets: the instruction it was resolved for and a way to act on it.
pub struct RenderContext<'a> {
    pub component: &'a str,
    pub props: &'a Value,
    sink: Arc<dyn ActionSink>,
}

impl<'a> RenderContext<'a> {
    pub fn new(component: &'a str, props: &'a Value, sink: Arc<dyn ActionSink>) -> Self {
        Self {
            component,
            props,
            sink,
        }
    }

    pub fn action(
        &self,
        label: impl Into<String>,
        action: impl Into<String>,
        data: Map<String, Value>,
    ) -> BoundAction {
        BoundAction {
            label: label.into(),
            action: action.into(),
            data,
            sink: Arc::clone(&self.sink),
        }
    }
}

pub struct BoundAction {
    pub label: String,
    pub action: String,
    pub data: Map<String, Value>,
    sink: Arc<dyn ActionSink>,
}

impl BoundAction {
    pub fn fire(&self) -> SendOutcome {
        self.sink.send_user_action(&self.action, self.data.clone())
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("label", &self.label)
            .field("action", &self.action)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct View {
    pub component: String,
    pub title: String,
    pub lines: Vec<String>,
    pub actions: Vec<BoundAction>,
    pub fallback: bool,
}

impl View {
    pub fn new(component: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            title: title.into(),
            lines: Vec::new(),
            actions: Vec::new(),
            fallback: false,
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn with_action(mut self, action: BoundAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Fires the 1-based action `n`, as listed when the view is displayed.
    pub fn fire(&self, n: usize) -> Option<SendOutcome> {
        let action = self.actions.get(n.checked_sub(1)?)?;
        Some(action.fire())
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.title.contains(needle) || self.lines.iter().any(|l| l.contains(needle))
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for line in &self.lines {
            writeln!(f, "  {line}")?;
        }
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  [{}] {}", i + 1, action.label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every action instead of sending it.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl ActionSink for RecordingSink {
        fn send_user_action(&self, action: &str, data: Map<String, Value>) -> SendOutcome {
            self.sent
                .lock()
                .expect("sink lock")
                .push((action.to_string(), data));
            SendOutcome::Sent
        }
    }
}
