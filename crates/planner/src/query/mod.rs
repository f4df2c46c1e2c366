pub mod dialect;
pub mod pagination;
pub mod renderer;
pub mod select;
