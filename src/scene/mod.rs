pub mod pipeline;
pub mod predictor;
pub mod types;

pub use pipeline::SceneClassifier;
pub use predictor::{PredictionVector, Predictor};
pub use types::{ClassLabel, ClassificationResult, RankedPrediction};
