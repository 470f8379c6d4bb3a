use crate::config::{Config, InputSize};
use crate::image::ImageTensor;
use crate::models::{ModelLoader, SceneModel};
use crate::scene::ClassLabel;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::ArrayD;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::{Tensor, ValueType},
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Scene classifier backed by an ONNX Runtime session.
///
/// Expects NHWC input `[N, H, W, 3]` and a `[N, 6]` output.
pub struct OnnxSceneModel {
    // `Session::run` needs exclusive access; the weights themselves never change.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: InputSize,
}

impl OnnxSceneModel {
    pub fn from_session(session: Session, fallback_size: InputSize) -> Result<Self> {
        let input = session.inputs.first().ok_or_else(|| {
            ClassifyError::ModelLoad("Scene model has no inputs".to_string())
        })?;
        let output = session.outputs.first().ok_or_else(|| {
            ClassifyError::ModelLoad("Scene model has no outputs".to_string())
        })?;

        let input_dims = tensor_dims(&input.input_type);
        let input_size = input_size_from_dims(input_dims.as_deref(), fallback_size);

        if let Some(width) = declared_output_width(tensor_dims(&output.output_type).as_deref()) {
            if width != ClassLabel::COUNT {
                return Err(ClassifyError::LabelMismatch {
                    expected: ClassLabel::COUNT,
                    actual: width,
                });
            }
        }

        tracing::info!(
            "Scene model input '{}' {:?} -> {}, output '{}'",
            input.name,
            input_dims,
            input_size,
            output.name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Scene model output[{}]: '{}'", i, output.name);
        }

        let input_name = input.name.clone();
        let output_name = output.name.clone();

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size,
        })
    }
}

impl SceneModel for OnnxSceneModel {
    fn input_size(&self) -> InputSize {
        self.input_size
    }

    fn run(&self, tensor: &ImageTensor) -> Result<ArrayD<f32>> {
        let input_tensor = Tensor::from_array(tensor.view().to_owned())?;

        let predictions = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(ClassifyError::UnknownInference(format!(
                        "Scene model output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        Ok(predictions)
    }
}

/// How strictly the ONNX artifact is checked and optimized on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Full graph optimization at the configured level.
    Strict,
    /// No graph optimization, single thread, artifact read into memory first.
    /// Tolerates older opsets that trip optimizer passes.
    Relaxed,
}

pub struct OnnxLoader {
    mode: LoadMode,
    optimization_level: i32,
    intra_threads: usize,
    fallback_size: InputSize,
}

impl OnnxLoader {
    pub fn new(mode: LoadMode, config: &Config) -> Self {
        Self {
            mode,
            optimization_level: config.onnx_config.optimization_level,
            intra_threads: config.onnx_config.intra_threads,
            fallback_size: config.fallback_input_size,
        }
    }

    pub fn strict(config: &Config) -> Self {
        Self::new(LoadMode::Strict, config)
    }

    pub fn relaxed(config: &Config) -> Self {
        Self::new(LoadMode::Relaxed, config)
    }

    fn build_session(&self, path: &Path) -> Result<Session> {
        let session = match self.mode {
            LoadMode::Strict => self.strict_session(path),
            LoadMode::Relaxed => {
                let bytes = std::fs::read(path).map_err(|e| {
                    ClassifyError::ModelLoad(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::relaxed_session(&bytes)
            }
        };

        session.map_err(|e| ClassifyError::ModelLoad(e.to_string()))
    }

    fn strict_session(&self, path: &Path) -> ort::Result<Session> {
        Session::builder()?
            .with_optimization_level(optimization_level(self.optimization_level))?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(path)
    }

    fn relaxed_session(bytes: &[u8]) -> ort::Result<Session> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Disable)?
            .with_intra_threads(1)?
            .commit_from_memory(bytes)
    }
}

impl ModelLoader for OnnxLoader {
    fn name(&self) -> &str {
        match self.mode {
            LoadMode::Strict => "onnx-strict",
            LoadMode::Relaxed => "onnx-relaxed",
        }
    }

    fn load(&self, path: &Path) -> Result<Arc<dyn SceneModel>> {
        if !path.is_file() {
            return Err(ClassifyError::ModelLoad(format!(
                "Scene model not found: {}",
                path.display()
            )));
        }

        tracing::info!(
            "Loading scene model from: {} ({})",
            path.display(),
            self.name()
        );

        let session = self.build_session(path)?;

        let model = OnnxSceneModel::from_session(session, self.fallback_size)?;
        Ok(Arc::new(model))
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

/// Spatial size from an NHWC input shape. Symbolic dimensions are reported
/// by the runtime as non-positive values.
pub fn input_size_from_dims(dims: Option<&[i64]>, fallback: InputSize) -> InputSize {
    match dims {
        Some([_, height, width, ..]) if *height > 0 && *width > 0 => {
            InputSize::new(*height as usize, *width as usize)
        }
        _ => fallback,
    }
}

/// Concrete class count declared by the output shape, if any.
pub fn declared_output_width(dims: Option<&[i64]>) -> Option<usize> {
    match dims?.last() {
        Some(&width) if width > 0 => Some(width as usize),
        _ => None,
    }
}
