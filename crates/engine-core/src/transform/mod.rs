pub mod builtin;
pub mod pipeline;
pub mod registry;

pub use pipeline::{Transform, TransformChain};
pub use registry::TransformRegistry;
