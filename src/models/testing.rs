//! In-memory models and loaders for tests.

use crate::config::InputSize;
use crate::image::ImageTensor;
use crate::models::{ModelLoader, SceneModel};
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Always returns the same output, shaped `[1, len]`.
pub struct FixedModel {
    pub output: Vec<f32>,
    pub input_size: InputSize,
}

impl FixedModel {
    pub fn new(output: Vec<f32>) -> Self {
        Self {
            output,
            input_size: InputSize::new(32, 32),
        }
    }
}

impl SceneModel for FixedModel {
    fn input_size(&self) -> InputSize {
        self.input_size
    }

    fn run(&self, tensor: &ImageTensor) -> Result<ArrayD<f32>> {
        assert_eq!(tensor.spatial_size(), self.input_size);
        ArrayD::from_shape_vec(IxDyn(&[1, self.output.len()]), self.output.clone())
            .map_err(|e| ClassifyError::UnknownInference(e.to_string()))
    }
}

/// Scores classes from the mean color of the image: blue-ish images read as
/// sea, bright images as glacier, green as forest, and gray-brown as
/// mountain. Deterministic for a given tensor.
pub struct ColorModel;

impl SceneModel for ColorModel {
    fn input_size(&self) -> InputSize {
        InputSize::new(24, 24)
    }

    fn run(&self, tensor: &ImageTensor) -> Result<ArrayD<f32>> {
        let view = tensor.view();
        let pixels = (view.shape()[1] * view.shape()[2]) as f32;
        let mut mean = [0.0f32; 3];
        for ((_, _, _, c), v) in view.indexed_iter() {
            mean[c] += v / pixels;
        }
        let [r, g, b] = mean;
        let brightness = (r + g + b) / 3.0;
        let gray = 1.0 - ((r - g).abs() + (g - b).abs() + (r - b).abs()) / 2.0;

        let glacier = if brightness > 0.85 { 0.9 } else { 0.0 };

        // buildings, forest, glacier, mountain, sea, street
        let scores = vec![
            0.05,
            (g - (r + b) / 2.0).max(0.0),
            glacier,
            gray * (1.0 - brightness) * 0.9,
            (b - (r + g) / 2.0).max(0.0),
            0.05,
        ];
        ArrayD::from_shape_vec(IxDyn(&[1, 6]), scores)
            .map_err(|e| ClassifyError::UnknownInference(e.to_string()))
    }
}

/// Panics on every forward pass.
pub struct PanickingModel;

impl SceneModel for PanickingModel {
    fn input_size(&self) -> InputSize {
        InputSize::new(8, 8)
    }

    fn run(&self, _tensor: &ImageTensor) -> Result<ArrayD<f32>> {
        panic!("native kernel fault")
    }
}

pub struct FixedLoader {
    name: String,
    output: Vec<f32>,
}

impl FixedLoader {
    pub fn new(name: &str, output: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            output,
        }
    }
}

impl ModelLoader for FixedLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, _path: &Path) -> Result<Arc<dyn SceneModel>> {
        Ok(Arc::new(FixedModel::new(self.output.clone())))
    }
}

pub struct FailingLoader {
    name: String,
    error: ClassifyError,
}

impl FailingLoader {
    pub fn new(name: &str, reason: &str) -> Self {
        Self::with_error(name, ClassifyError::ModelLoad(reason.to_string()))
    }

    pub fn with_error(name: &str, error: ClassifyError) -> Self {
        Self {
            name: name.to_string(),
            error,
        }
    }
}

impl ModelLoader for FailingLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, _path: &Path) -> Result<Arc<dyn SceneModel>> {
        Err(self.error.clone())
    }
}

/// Counts invocations and sleeps a little so concurrent first callers
/// overlap with the load.
pub struct CountingLoader<L> {
    pub inner: L,
    pub calls: Arc<AtomicUsize>,
}

impl<L: ModelLoader> CountingLoader<L> {
    pub fn new(inner: L) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<L: ModelLoader> ModelLoader for CountingLoader<L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn load(&self, path: &Path) -> Result<Arc<dyn SceneModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        self.inner.load(path)
    }
}

/// Loader handing out an already-built model.
pub struct StaticLoader(pub Arc<dyn SceneModel>);

impl ModelLoader for StaticLoader {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn load(&self, _path: &Path) -> Result<Arc<dyn SceneModel>> {
        Ok(Arc::clone(&self.0))
    }
}
