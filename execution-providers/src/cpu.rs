//! CPU Execution Provider
//!
//! Fallback provider that runs on CPU. Always supported.

use crate::{BackendType, impl_provider_base, ExecutionProvider, ProviderConfig};
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct CPUExecutionProvider {
    config: ProviderConfig,
}

impl_provider_base!(CPUExecutionProvider, BackendType::CPU);

impl CPUExecutionProvider {
    /// Accepted and ignored by onnxruntime; kept so every target carries one
    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.config.set(DEVICE_ID, device_id);
        self
    }

    pub fn with_arena_extend_strategy(mut self, strategy: i32) -> Self {
        self.config.set(ARENA_EXTEND_STRATEGY, strategy);
        self
    }

    pub fn with_enable_cpu_mem_arena(mut self, enable: bool) -> Self {
        self.config.set(ENABLE_CPU_MEM_ARENA, enable);
        self
    }
}

impl ExecutionProvider for CPUExecutionProvider {
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
        true
    }
}
