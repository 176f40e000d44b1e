use crate::modules::frames::RenderInstruction;
use crate::modules::registry::ComponentRegistry;
use crate::modules::view::{ActionSink, RenderContext, View};
use std::sync::Arc;

/// Turns render instructions into views using a fixed registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ComponentRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn dispatch(&self, instruction: &RenderInstruction, actions: Arc<dyn ActionSink>) -> View {
        let handle = self.registry.resolve(&instruction.component_name);
        if handle.is_fallback() {
            tracing::debug!(
                component = %instruction.component_name,
                "no renderer registered; using fallback"
            );
        }
        let ctx = RenderContext::new(&instruction.component_name, &instruction.props, actions);
        handle.render(&ctx)
    }
}
