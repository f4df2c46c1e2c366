pub mod column;
pub mod entity;
pub mod identifiers;
pub mod utils;
pub mod value;
