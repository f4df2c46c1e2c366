pub mod adapter;
pub mod classify;
pub mod encoder;
pub mod error;
pub mod utils;
