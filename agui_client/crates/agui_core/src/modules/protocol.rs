pub use supplygraph_protocol::{
    empty_props, ClientFrame, MessageData, ServerFrame, UiComponentData, RESERVED_ACTION_KEYS,
};
