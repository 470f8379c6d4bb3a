pub mod config;
pub mod image;
pub mod models;
pub mod scene;
pub mod utils;
pub mod web;

// Main types
pub use config::Config;
pub use scene::{ClassLabel, ClassificationResult, SceneClassifier};
pub use utils::error::ClassifyError;

pub type Result<T> = std::result::Result<T, ClassifyError>;
