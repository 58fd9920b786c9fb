//! Bridge between sdonnx-execution-providers and ort execution providers
//!
//! Converts the format-agnostic provider descriptions into ort dispatch
//! types. A provider whose cargo feature is off is skipped with a warning.

use crate::error::Result;
use sdonnx_execution_providers::{BackendType, DynExecutionProvider};

/// Convert execution providers to ort execution providers
///
/// Unsupported providers are logged and skipped; if nothing survives, the
/// CPU provider is used.
pub fn bridge_to_ort(
    providers: &[DynExecutionProvider],
) -> Result<Vec<ort::execution_providers::ExecutionProviderDispatch>> {
    let mut ort_providers = Vec::new();

    for provider in providers {
        match convert_provider(provider) {
            Some(ort_provider) => {
                log::info!("Bridged {} provider to ort", provider.name());
                ort_providers.push(ort_provider);
            }
            None => {
                log::warn!(
                    "Provider {} ({:?}) not enabled in this build, skipping",
                    provider.name(),
                    provider.backend_type()
                );
            }
        }
    }

    if ort_providers.is_empty() {
        log::warn!("No providers successfully bridged, falling back to CPU");
        ort_providers.push(ort::execution_providers::CPUExecutionProvider::default().build());
    }

    Ok(ort_providers)
}

/// Convert a single execution provider to ort format
#[allow(unused_variables)]
fn convert_provider(
    provider: &DynExecutionProvider,
) -> Option<ort::execution_providers::ExecutionProviderDispatch> {
    #[allow(unused_imports)]
    use sdonnx_execution_providers::constants::*;

    let config = provider.config();

    match provider.backend_type() {
        BackendType::Cuda => {
            #[cfg(feature = "cuda")]
            {
                let mut cuda = ort::execution_providers::CUDAExecutionProvider::default();

                if let Some(id) = config.get_as::<i32>(DEVICE_ID) {
                    cuda = cuda.with_device_id(id);
                }
                if let Some(limit) = config.get_as::<usize>(GPU_MEM_LIMIT) {
                    cuda = cuda.with_memory_limit(limit);
                }

                log::debug!("Configured CUDA provider with {} options", config.len());
                Some(cuda.build())
            }
            #[cfg(not(feature = "cuda"))]
            {
                log::warn!("CUDA provider requested but cuda feature not enabled");
                None
            }
        }

        BackendType::ROCm => {
            #[cfg(feature = "rocm")]
            {
                let mut rocm = ort::execution_providers::ROCmExecutionProvider::default();

                if let Some(id) = config.get_as::<i32>(DEVICE_ID) {
                    rocm = rocm.with_device_id(id);
                }
                if let Some(enable) = config.get_as::<u8>(TUNABLE_OP_ENABLE) {
                    rocm = rocm.with_tunable_op(enable != 0);
                }
                if let Some(enable) = config.get_as::<u8>(TUNABLE_OP_TUNING_ENABLE) {
                    rocm = rocm.with_tuning(enable != 0);
                }

                log::debug!("Configured ROCm provider with {} options", config.len());
                Some(rocm.build())
            }
            #[cfg(not(feature = "rocm"))]
            {
                log::warn!("ROCm provider requested but rocm feature not enabled");
                None
            }
        }

        BackendType::DirectML => {
            #[cfg(feature = "directml")]
            {
                let mut dml = ort::execution_providers::DirectMLExecutionProvider::default();

                if let Some(id) = config.get_as::<i32>(DEVICE_ID) {
                    dml = dml.with_device_id(id);
                }

                log::debug!("Configured DirectML provider");
                Some(dml.build())
            }
            #[cfg(not(feature = "directml"))]
            {
                log::warn!("DirectML provider requested but directml feature not enabled");
                None
            }
        }

        BackendType::OpenVINO => {
            #[cfg(feature = "openvino")]
            {
                let mut openvino = ort::execution_providers::OpenVINOExecutionProvider::default();

                if let Some(device_type) = config.get(DEVICE_TYPE) {
                    openvino = openvino.with_device_type(device_type);
                }

                log::debug!("Configured OpenVINO provider");
                Some(openvino.build())
            }
            #[cfg(not(feature = "openvino"))]
            {
                log::warn!("OpenVINO provider requested but openvino feature not enabled");
                None
            }
        }

        BackendType::CPU => {
            let cpu = ort::execution_providers::CPUExecutionProvider::default();
            log::debug!("Configured CPU provider");
            Some(cpu.build())
        }
    }
}
