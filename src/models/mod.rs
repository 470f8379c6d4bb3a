pub mod loader;
pub mod manager;
pub mod onnx;

#[cfg(test)]
pub(crate) mod testing;

pub use loader::{LoadedModel, LoaderChain, ModelLoader, SceneModel};
pub use manager::{ModelManager, ModelStats};
pub use onnx::{LoadMode, OnnxLoader, OnnxSceneModel};
