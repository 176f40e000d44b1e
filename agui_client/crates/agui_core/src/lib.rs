mod modules;

pub use modules::{
    backoff, config, dispatcher, fallback, frames, protocol, registry, renderers, transport, view,
};
