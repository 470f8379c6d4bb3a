use crate::config::InputSize;
use crate::models::{LoadedModel, LoaderChain, OnnxLoader, SceneModel};
use crate::utils::error::ClassifyError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Owns the process-wide scene model.
///
/// The model is loaded at most once, on the first [`ModelManager::get_model`]
/// call. Concurrent first callers block until that single load finishes and
/// all of them observe its outcome. Failures are cached as well, so a broken
/// artifact is never retried; restarting the process is the only way to pick
/// up a new one.
pub struct ModelManager {
    model_path: PathBuf,
    loaders: LoaderChain,
    model: OnceCell<Result<LoadedModel>>,
}

impl ModelManager {
    pub fn new(model_path: impl Into<PathBuf>, loaders: LoaderChain) -> Self {
        Self {
            model_path: model_path.into(),
            loaders,
            model: OnceCell::new(),
        }
    }

    /// Strict ONNX loading first, then the relaxed fallback.
    pub fn from_config(config: &Config) -> Self {
        let loaders = LoaderChain::new()
            .with_loader(OnnxLoader::strict(config))
            .with_loader(OnnxLoader::relaxed(config));
        Self::new(config.model_path.clone(), loaders)
    }

    pub fn get_model(&self) -> Result<Arc<dyn SceneModel>> {
        self.get_or_load().map(|loaded| loaded.model)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    /// Cached load failure, if the load already ran and failed.
    pub fn load_error(&self) -> Option<ClassifyError> {
        match self.model.get() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn stats(&self) -> ModelStats {
        let loaded = match self.model.get() {
            Some(Ok(loaded)) => Some(loaded),
            _ => None,
        };

        ModelStats {
            model_path: self.model_path.display().to_string(),
            loaded: loaded.is_some(),
            strategy: loaded.map(|l| l.strategy.clone()),
            input_size: loaded.map(|l| l.model.input_size()),
            strategies: self.loaders.strategies().iter().map(|s| s.to_string()).collect(),
        }
    }

    fn get_or_load(&self) -> Result<LoadedModel> {
        self.model.get_or_init(|| self.load()).clone()
    }

    fn load(&self) -> Result<LoadedModel> {
        let start = Instant::now();
        tracing::info!(
            "Loading scene model from {} (strategies: {:?})",
            self.model_path.display(),
            self.loaders.strategies()
        );

        match self.loaders.load(&self.model_path) {
            Ok(loaded) => {
                tracing::info!(
                    "Scene model loaded: strategy={}, input={}, time={:.3}s",
                    loaded.strategy,
                    loaded.model.input_size(),
                    start.elapsed().as_secs_f32()
                );
                Ok(loaded)
            }
            Err(e) => {
                tracing::error!("Scene model unavailable: {}", e);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_path: String,
    pub loaded: bool,
    pub strategy: Option<String>,
    pub input_size: Option<InputSize>,
    pub strategies: Vec<String>,
}
