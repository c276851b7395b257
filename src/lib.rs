pub mod config;
pub mod context;
pub mod graph;
pub mod model;
pub mod render;
pub mod server;
pub mod snapshot;
pub mod source;
#[doc(hidden)]
pub mod test_support;
pub mod view;
