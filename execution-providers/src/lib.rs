//! SD ONNX Execution Providers
//!
//! Execution provider descriptions for the ONNX Runtime backends a diffusion
//! pipeline can be converted for and run on. A provider is a name plus a bag of
//! options; an [`ExecutionTarget`] pins one provider together with the
//! onnxruntime version it will run under.
//!
//! Provider enumeration and hardware probing live outside this crate: callers
//! resolve a [`BackendType`] and hand it in.
//!
//! # Examples
//!
//! ```rust
//! use sdonnx_execution_providers::*;
//!
//! let rocm = ROCmExecutionProvider::new()
//!     .with_device_id(0)
//!     .with_tunable_op_enable(true)
//!     .build();
//!
//! let target = ExecutionTarget::new(rocm)
//!     .with_runtime_version("1.16.3".parse().unwrap());
//!
//! assert_eq!(target.name(), "ROCMExecutionProvider");
//! assert_eq!(target.device_name(), "gpu-rocm");
//! ```

use std::fmt::Debug;
use std::sync::Arc;
use std::collections::BTreeMap;

pub mod error;
pub mod constants;
pub mod target;

pub mod cpu;
pub mod cuda;
pub mod directml;
pub mod openvino;
pub mod rocm;

pub use error::{ProviderError, Result};
pub use target::{ExecutionTarget, RuntimeVersion, TargetOptions};
pub use cpu::CPUExecutionProvider;
pub use cuda::CUDAExecutionProvider;
pub use directml::DirectMLExecutionProvider;
pub use openvino::OpenVINOExecutionProvider;
pub use rocm::ROCmExecutionProvider;

/// Backend type enum - categorizes the hardware acceleration backends
/// a pipeline can be converted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendType {
    // NVIDIA
    Cuda,

    // AMD
    ROCm,

    // Intel
    OpenVINO,

    // Microsoft
    DirectML,

    // Fallback
    CPU,
}

impl BackendType {
    /// All backends, in the order they are tried when nothing is configured
    pub const ALL: [BackendType; 5] = [
        BackendType::Cuda,
        BackendType::ROCm,
        BackendType::DirectML,
        BackendType::OpenVINO,
        BackendType::CPU,
    ];

    /// ONNX Runtime's registered name for this backend
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Cuda => constants::CUDA_PROVIDER,
            Self::ROCm => constants::ROCM_PROVIDER,
            Self::OpenVINO => constants::OPENVINO_PROVIDER,
            Self::DirectML => constants::DIRECTML_PROVIDER,
            Self::CPU => constants::CPU_PROVIDER,
        }
    }

    /// Device label Olive uses when naming its footprint files
    pub fn device_name(&self) -> &'static str {
        match self {
            Self::Cuda => constants::DEVICE_GPU_CUDA,
            Self::ROCm => constants::DEVICE_GPU_ROCM,
            Self::OpenVINO => constants::DEVICE_GPU,
            Self::DirectML => constants::DEVICE_GPU_DML,
            Self::CPU => constants::DEVICE_CPU,
        }
    }

    /// Parse an ONNX Runtime provider name (e.g. "DmlExecutionProvider")
    pub fn from_provider_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.provider_name() == name)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// Generic configuration store for provider options
///
/// Ordered so the options render identically every time they are written
/// into a workflow file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    options: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.options.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.options.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.options.iter()
    }
}

/// Execution provider trait
///
/// Implemented by every provider builder in this crate. Deliberately free of
/// any `ort` types so the conversion side (Olive workflows) and the inference
/// side (onnx-loader) can share one description.
pub trait ExecutionProvider: Send + Sync + Debug {
    /// ONNX Runtime name (e.g., "CUDAExecutionProvider")
    fn name(&self) -> &'static str;

    /// Backend type for this provider
    fn backend_type(&self) -> BackendType;

    /// Check if this provider is supported on the current platform (compile-time)
    fn supported_by_platform(&self) -> bool;

    /// Configuration options for this provider
    fn config(&self) -> &ProviderConfig;
}

/// Type-erased execution provider for dynamic dispatch
pub type DynExecutionProvider = Arc<dyn ExecutionProvider>;

/// Macro to reduce boilerplate when implementing ExecutionProvider base methods
#[macro_export]
macro_rules! impl_provider_base {
    ($struct_name:ident, $backend:expr) => {
        impl $struct_name {
            pub fn new() -> Self {
                Self {
                    config: $crate::ProviderConfig::new(),
                }
            }

            pub fn build(self) -> std::sync::Arc<dyn $crate::ExecutionProvider> {
                std::sync::Arc::new(self)
            }

            fn get_name(&self) -> &'static str {
                $backend.provider_name()
            }

            fn get_backend_type(&self) -> $crate::BackendType {
                $backend
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Build a provider for `backend` carrying no options
pub fn provider_for(backend: BackendType) -> DynExecutionProvider {
    match backend {
        BackendType::Cuda => CUDAExecutionProvider::new().build(),
        BackendType::ROCm => ROCmExecutionProvider::new().build(),
        BackendType::OpenVINO => OpenVINOExecutionProvider::new().build(),
        BackendType::DirectML => DirectMLExecutionProvider::new().build(),
        BackendType::CPU => CPUExecutionProvider::new().build(),
    }
}
