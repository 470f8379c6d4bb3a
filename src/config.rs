use crate::utils::error::ClassifyError;
use crate::Result;
use std::path::PathBuf;

/// Spatial size used when a model declares symbolic input dimensions.
pub const DEFAULT_INPUT_SIZE: InputSize = InputSize {
    height: 224,
    width: 224,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Serialized model artifact, resolved once at startup
    pub model_path: PathBuf,

    /// Worker thread count
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    /// Input size reported for models without concrete spatial dimensions
    pub fallback_input_size: InputSize,

    pub onnx_config: OnnxConfig,

    pub server_config: ServerConfig,
}

/// Model input height and width in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct InputSize {
    pub height: usize,
    pub width: usize,
}

impl InputSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl std::fmt::Display for InputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU threads for intra-op parallelism
    pub intra_threads: usize,

    /// Graph optimization level used by the strict loader
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body in bytes
    pub max_request_size: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        if workers == 0 {
            return Err(ClassifyError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1),
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 16 * 1024 * 1024,
        };

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            workers,
            dev_mode,
            fallback_input_size: DEFAULT_INPUT_SIZE,
            onnx_config,
            server_config,
        })
    }

    /// Overrides the size reported for models with symbolic input dimensions.
    pub fn with_fallback_input_size(mut self, height: usize, width: usize) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(ClassifyError::Config(format!(
                "fallback input size must be non-zero, got {height}x{width}"
            )));
        }
        self.fallback_input_size = InputSize::new(height, width);
        Ok(self)
    }
}
