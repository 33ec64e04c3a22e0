pub mod models;
pub mod error;
pub mod config;
pub mod engine;
pub mod diffing;
pub mod reporting;

// Re-export commonly used items
pub use models::*;
pub use error::*;
pub use config::*;
pub use engine::*;
pub use diffing::*;
pub use reporting::*;
