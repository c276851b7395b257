pub mod builder;
pub mod dot;
pub mod node;
pub mod resolve;

pub use builder::{GraphOptions, build_dependency_graph, build_overview_graph};
pub use node::{GraphvizNode, GraphvizNodeKind};
pub use resolve::{ComponentResolver, resolve};
