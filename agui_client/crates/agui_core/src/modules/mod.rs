pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod fallback;
pub mod frames;
pub mod protocol;
pub mod registry;
pub mod renderers;
pub mod transport;
pub mod view;
