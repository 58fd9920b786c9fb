//! Execution target: the one provider a pipeline is converted for, plus the
//! onnxruntime version it will run under.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ProviderError, Result};
use crate::{
    BackendType, CPUExecutionProvider, CUDAExecutionProvider, DirectMLExecutionProvider,
    DynExecutionProvider, OpenVINOExecutionProvider, ProviderConfig,
    ROCmExecutionProvider,
};

/// First onnxruntime release whose transformer optimizer handles SkipGroupNorm
/// fusion correctly on CUDA and ROCm.
pub const SKIP_GROUP_NORM_FIXED_IN: RuntimeVersion = RuntimeVersion::new(1, 17, 0);

/// onnxruntime version, compared numerically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl FromStr for RuntimeVersion {
    type Err = ProviderError;

    /// Accepts `MAJOR.MINOR[.PATCH]` with an optional pre-release or local
    /// suffix (`1.16.3`, `1.17.0-dev`, `1.16.1+rocm57`).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProviderError::InvalidRuntimeVersion(s.to_string());

        let core = s
            .trim()
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u32> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(true)?;
        let patch = next(false)?;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Inputs for the default option set of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Device ordinal (ignored by OpenVINO)
    pub device_id: i32,
    /// Whether half precision was requested for the optimized graphs
    pub float16: bool,
    /// OpenVINO heterogeneous execution; suppresses the `_FP16` device suffix
    pub openvino_hetero: bool,
    /// Raw OpenVINO device as reported by the host (e.g. `GPU`, `CPU`, `GPU.1`)
    pub openvino_device: String,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            device_id: 0,
            float16: true,
            openvino_hetero: false,
            openvino_device: "GPU".to_string(),
        }
    }
}

impl TargetOptions {
    /// OpenVINO device type with the precision suffix applied
    pub fn openvino_device_type(&self) -> String {
        if self.float16 && !self.openvino_hetero {
            format!("{}{}", self.openvino_device, OPENVINO_FP16_SUFFIX)
        } else {
            self.openvino_device.clone()
        }
    }
}

/// A resolved provider plus the runtime it targets
#[derive(Debug, Clone)]
pub struct ExecutionTarget {
    provider: DynExecutionProvider,
    runtime_version: Option<RuntimeVersion>,
}

impl ExecutionTarget {
    pub fn new(provider: DynExecutionProvider) -> Self {
        Self {
            provider,
            runtime_version: None,
        }
    }

    pub fn with_runtime_version(mut self, version: RuntimeVersion) -> Self {
        self.runtime_version = Some(version);
        self
    }

    /// Build the target for `backend` with its default option set
    ///
    /// Every provider gets `device_id` except OpenVINO, which is addressed by
    /// `device_type`. ROCm additionally turns on tunable ops.
    pub fn from_backend(backend: BackendType, options: &TargetOptions) -> Self {
        let provider = match backend {
            BackendType::CPU => CPUExecutionProvider::new()
                .with_device_id(options.device_id)
                .build(),
            BackendType::Cuda => CUDAExecutionProvider::new()
                .with_device_id(options.device_id)
                .build(),
            BackendType::DirectML => DirectMLExecutionProvider::new()
                .with_device_id(options.device_id)
                .build(),
            BackendType::ROCm => ROCmExecutionProvider::new()
                .with_device_id(options.device_id)
                .with_tunable_op_enable(true)
                .with_tunable_op_tuning_enable(true)
                .build(),
            BackendType::OpenVINO => OpenVINOExecutionProvider::new()
                .with_device_type(&options.openvino_device_type())
                .build(),
        };

        Self::new(provider)
    }

    /// ONNX Runtime provider name
    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn backend_type(&self) -> BackendType {
        self.provider.backend_type()
    }

    pub fn options(&self) -> &ProviderConfig {
        self.provider.config()
    }

    pub fn provider(&self) -> &DynExecutionProvider {
        &self.provider
    }

    /// Olive device label for this provider
    pub fn device_name(&self) -> &'static str {
        self.backend_type().device_name()
    }

    pub fn runtime_version(&self) -> Option<RuntimeVersion> {
        self.runtime_version
    }

    /// True for CUDA/ROCm on an onnxruntime older than 1.17.0
    ///
    /// Unknown versions are treated as current.
    pub fn needs_skip_group_norm_workaround(&self) -> bool {
        matches!(self.backend_type(), BackendType::Cuda | BackendType::ROCm)
            && self
                .runtime_version
                .is_some_and(|v| v < SKIP_GROUP_NORM_FIXED_IN)
    }
}
