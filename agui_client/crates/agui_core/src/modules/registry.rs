use crate::modules::fallback::FallbackRenderer;
use crate::modules::renderers;
use crate::modules::view::{RenderContext, View};
use std::collections::HashMap;

/// A renderable UI unit, keyed by component name in a [`ComponentRegistry`].
pub trait Renderer: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> View;
}

impl<F> Renderer for F
where
    F: Fn(&RenderContext<'_>) -> View + Send + Sync,
{
    fn render(&self, ctx: &RenderContext<'_>) -> View {
        self(ctx)
    }
}

/// What `resolve` hands back. Always renderable.
pub enum RendererHandle<'a> {
    Registered {
        name: &'a str,
        renderer: &'a dyn Renderer,
    },
    Fallback(&'a FallbackRenderer),
}

impl RendererHandle<'_> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, RendererHandle::Fallback(_))
    }

    /// Registered key, `None` for the fallback.
    pub fn name(&self) -> Option<&str> {
        match self {
            RendererHandle::Registered { name, .. } => Some(*name),
            RendererHandle::Fallback(_) => None,
        }
    }

    pub fn render(&self, ctx: &RenderContext<'_>) -> View {
        match self {
            RendererHandle::Registered { renderer, .. } => renderer.render(ctx),
            RendererHandle::Fallback(fallback) => fallback.render(ctx),
        }
    }
}

/// Immutable name → renderer table. Built once, then shared read-only.
pub struct ComponentRegistry {
    entries: HashMap<String, Box<dyn Renderer>>,
    fallback: FallbackRenderer,
}

impl ComponentRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The procurement components the SupplyGraph agent knows how to emit.
    pub fn procurement() -> Self {
        renderers::register_procurement(Self::builder()).build()
    }

    pub fn resolve(&self, name: &str) -> RendererHandle<'_> {
        match self.entries.get_key_value(name) {
            Some((key, renderer)) => RendererHandle::Registered {
                name: key.as_str(),
                renderer: renderer.as_ref(),
            },
            None => RendererHandle::Fallback(&self.fallback),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, Box<dyn Renderer>>,
}

impl RegistryBuilder {
    /// Later registrations under the same name replace earlier ones.
    pub fn register(mut self, name: impl Into<String>, renderer: impl Renderer + 'static) -> Self {
        let name = name.into();
        if self.entries.insert(name.clone(), Box::new(renderer)).is_some() {
            tracing::warn!(component = %name, "renderer registered twice; keeping the last one");
        }
        self
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            entries: self.entries,
            fallback: FallbackRenderer,
        }
    }
}
