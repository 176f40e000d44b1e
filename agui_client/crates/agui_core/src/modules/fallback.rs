use crate::modules::registry::Renderer;
use crate::modules::view::{RenderContext, View};

/// Placeholder for component names nothing is registered under.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackRenderer;

impl Renderer for FallbackRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> View {
        let mut view = View::new(ctx.component, "Unsupported component");
        view.fallback = true;

        let shown = if ctx.component.is_empty() {
            "<unnamed>"
        } else {
            ctx.component
        };
        view.push_line(format!("Component \"{shown}\" is not available in this client."));

        if let Some(message) = ctx.props.get("message").and_then(|m| m.as_str()) {
            view.push_line(message.to_string());
        }
        view
    }
}
