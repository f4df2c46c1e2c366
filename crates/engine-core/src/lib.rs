pub mod error;
pub mod loader;
pub mod retry;
pub mod schema;
pub mod state;
pub mod transform;
