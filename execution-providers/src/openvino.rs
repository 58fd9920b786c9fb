//! OpenVINO Execution Provider
//!
//! Intel OpenVINO for optimized inference on Intel CPUs and GPUs.
//! Unlike the other providers it is addressed by device type, not device id.

use crate::{BackendType, impl_provider_base, ExecutionProvider, ProviderConfig};
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct OpenVINOExecutionProvider {
    config: ProviderConfig,
}

impl_provider_base!(OpenVINOExecutionProvider, BackendType::OpenVINO);

impl OpenVINOExecutionProvider {
    /// Set device type: CPU, GPU, GPU.0, GPU_FP16, HETERO:GPU,CPU, ...
    pub fn with_device_type(mut self, device_type: &str) -> Self {
        self.config.set(DEVICE_TYPE, device_type);
        self
    }

    /// Set number of threads for CPU inference
    pub fn with_num_of_threads(mut self, threads: i32) -> Self {
        self.config.set(NUM_OF_THREADS, threads);
        self
    }

    /// Set cache directory for compiled models
    pub fn with_cache_dir(mut self, path: &str) -> Self {
        self.config.set(CACHE_DIR, path);
        self
    }

    /// Enable OpenCL queue throttling (GPU only)
    pub fn with_enable_opencl_throttling(mut self, enable: bool) -> Self {
        self.config.set(ENABLE_OPENCL_THROTTLING, enable);
        self
    }
}

impl ExecutionProvider for OpenVINOExecutionProvider {
    fn name(&self) -> &'static str {
        self.get_name()
    }

    fn backend_type(&self) -> BackendType {
        self.get_backend_type()
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn supported_by_platform(&self) -> bool {
        cfg!(any(target_os = "windows", target_os = "linux", target_os = "macos"))
    }
}
