//! DirectML Execution Provider
//!
//! Microsoft DirectML for GPU acceleration on Windows (supports NVIDIA, AMD, Intel).

use crate::{BackendType, impl_provider_base, ExecutionProvider, ProviderConfig};
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct DirectMLExecutionProvider {
    config: ProviderConfig,
}

impl_provider_base!(DirectMLExecutionProvider, BackendType::DirectML);

impl DirectMLExecutionProvider {
    /// Set the DirectX device ID (default: 0)
    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.config.set(DEVICE_ID, device_id);
        self
    }

    /// Disable metacommands (optimized DirectML operators)
    pub fn with_disable_metacommands(mut self, disable: bool) -> Self {
        self.config.set(DISABLE_METACOMMANDS, disable);
        self
    }

    /// Enable dynamic graph fusion
    pub fn with_enable_dynamic_graph_fusion(mut self, enable: bool) -> Self {
        self.config.set(ENABLE_DYNAMIC_GRAPH_FUSION, enable);
        self
    }
}

impl ExecutionProvider for DirectMLExecutionProvider {
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
        cfg!(target_os = "windows")
    }
}
