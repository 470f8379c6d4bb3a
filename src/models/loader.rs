use crate::config::InputSize;
use crate::image::ImageTensor;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::ArrayD;
use std::path::Path;
use std::sync::Arc;

/// A loaded inference model. Shared read-only across requests.
pub trait SceneModel: Send + Sync {
    /// Spatial size the model expects its input resized to.
    fn input_size(&self) -> InputSize;

    /// Forward pass on a single-image batch, returning the raw output tensor.
    fn run(&self, tensor: &ImageTensor) -> Result<ArrayD<f32>>;
}

/// One way of turning a model artifact on disk into a [`SceneModel`].
pub trait ModelLoader: Send + Sync {
    /// Short identifier used in logs and load diagnostics.
    fn name(&self) -> &str;

    fn load(&self, path: &Path) -> Result<Arc<dyn SceneModel>>;
}

/// A model together with the loader strategy that produced it.
#[derive(Clone)]
pub struct LoadedModel {
    pub model: Arc<dyn SceneModel>,
    pub strategy: String,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("strategy", &self.strategy)
            .field("input_size", &self.model.input_size())
            .finish()
    }
}

/// Ordered fallback loaders. The first success wins.
#[derive(Default)]
pub struct LoaderChain {
    loaders: Vec<Box<dyn ModelLoader>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: impl ModelLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn strategies(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Try every loader in order.
    ///
    /// A label mismatch means the artifact deserialized fine but does not
    /// fit the class list, so no later strategy can help and the chain stops.
    pub fn load(&self, path: &Path) -> Result<LoadedModel> {
        let mut failures = Vec::with_capacity(self.loaders.len());

        for loader in &self.loaders {
            match loader.load(path) {
                Ok(model) => {
                    if !failures.is_empty() {
                        tracing::warn!(
                            "Model loaded with fallback strategy '{}' after {} failure(s)",
                            loader.name(),
                            failures.len()
                        );
                    }
                    return Ok(LoadedModel {
                        model,
                        strategy: loader.name().to_string(),
                    });
                }
                Err(e @ ClassifyError::LabelMismatch { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!("Model loader '{}' failed: {}", loader.name(), e);
                    failures.push(format!("{}: {}", loader.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(ClassifyError::ModelLoad(
                "no model loaders configured".to_string(),
            ));
        }

        Err(ClassifyError::ModelLoad(format!(
            "all strategies failed for {} [{}]",
            path.display(),
            failures.join("; ")
        )))
    }
}
