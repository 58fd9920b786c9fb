//! CUDA Execution Provider
//!
//! NVIDIA GPU acceleration via CUDA. Only the options that matter for
//! diffusion graphs are exposed; anything else can be set through
//! [`CUDAExecutionProvider::with_option`].

use crate::{BackendType, impl_provider_base, ExecutionProvider, ProviderConfig};
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct CUDAExecutionProvider {
    config: ProviderConfig,
}

impl_provider_base!(CUDAExecutionProvider, BackendType::Cuda);

impl CUDAExecutionProvider {
    /// Set the CUDA device ID (default: 0)
    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.config.set(DEVICE_ID, device_id);
        self
    }

    /// Set GPU memory limit in bytes
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.config.set(GPU_MEM_LIMIT, limit);
        self
    }

    /// Set arena extend strategy
    /// - 0: kNextPowerOfTwo (default)
    /// - 1: kSameAsRequested
    pub fn with_arena_extend_strategy(mut self, strategy: i32) -> Self {
        self.config.set(ARENA_EXTEND_STRATEGY, strategy);
        self
    }

    /// Set cuDNN convolution algorithm search type
    /// - "EXHAUSTIVE": Exhaustive search (slowest, best performance)
    /// - "HEURISTIC": Heuristic search (default)
    /// - "DEFAULT": Use default algorithm
    pub fn with_cudnn_conv_algo_search(mut self, search_type: &str) -> Self {
        self.config.set(CUDNN_CONV_ALGO_SEARCH, search_type);
        self
    }

    /// Enable using max workspace size for cuDNN convolutions
    pub fn with_cudnn_conv_use_max_workspace(mut self, enable: bool) -> Self {
        self.config.set(CUDNN_CONV_USE_MAX_WORKSPACE, enable);
        self
    }

    /// Enable CUDA graph capture. UNet graphs with static shapes benefit most.
    pub fn with_enable_cuda_graph(mut self, enable: bool) -> Self {
        self.config.set(ENABLE_CUDA_GRAPH, enable);
        self
    }

    /// Enable TensorFloat-32 (TF32) mode for matrix multiplications
    pub fn with_use_tf32(mut self, enable: bool) -> Self {
        self.config.set(USE_TF32, enable);
        self
    }

    /// Prefer NHWC (channels-last) format for convolutions
    pub fn with_prefer_nhwc(mut self, enable: bool) -> Self {
        self.config.set(PREFER_NHWC, enable);
        self
    }

    /// Set tunable operation enable/disable
    pub fn with_tunable_op_enable(mut self, enable: bool) -> Self {
        self.config.set(TUNABLE_OP_ENABLE, u8::from(enable));
        self
    }

    /// Raw option passthrough
    pub fn with_option(mut self, key: &str, value: impl ToString) -> Self {
        self.config.set(key, value);
        self
    }
}

impl ExecutionProvider for CUDAExecutionProvider {
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
        cfg!(any(target_os = "windows", target_os = "linux"))
    }
}
