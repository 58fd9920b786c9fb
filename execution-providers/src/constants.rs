//! Configuration key constants for the supported execution providers
//!
//! Keys match ONNX Runtime's provider option names so they can be forwarded
//! verbatim to `ort` and into Olive workflow files.

// ============================================================================
// Provider names (as registered by ONNX Runtime)
// ============================================================================

pub const CPU_PROVIDER: &str = "CPUExecutionProvider";
pub const CUDA_PROVIDER: &str = "CUDAExecutionProvider";
pub const DIRECTML_PROVIDER: &str = "DmlExecutionProvider";
pub const ROCM_PROVIDER: &str = "ROCMExecutionProvider";
pub const OPENVINO_PROVIDER: &str = "OpenVINOExecutionProvider";

// ============================================================================
// Olive device labels (used in footprint file names)
// ============================================================================

pub const DEVICE_CPU: &str = "cpu";
pub const DEVICE_GPU_DML: &str = "gpu-dml";
pub const DEVICE_GPU_CUDA: &str = "gpu-cuda";
pub const DEVICE_GPU_ROCM: &str = "gpu-rocm";
pub const DEVICE_GPU: &str = "gpu";

// ============================================================================
// Common Configuration Keys (used across multiple providers)
// ============================================================================

pub const DEVICE_ID: &str = "device_id";
pub const ARENA_EXTEND_STRATEGY: &str = "arena_extend_strategy";
pub const GPU_MEM_LIMIT: &str = "gpu_mem_limit";
pub const DO_COPY_IN_DEFAULT_STREAM: &str = "do_copy_in_default_stream";
pub const TUNABLE_OP_ENABLE: &str = "tunable_op_enable";
pub const TUNABLE_OP_TUNING_ENABLE: &str = "tunable_op_tuning_enable";
pub const TUNABLE_OP_MAX_TUNING_DURATION_MS: &str = "tunable_op_max_tuning_duration_ms";

// ============================================================================
// CPU Execution Provider
// ============================================================================

pub const ENABLE_CPU_MEM_ARENA: &str = "enable_cpu_mem_arena";

// ============================================================================
// CUDA Execution Provider
// ============================================================================

pub const CUDNN_CONV_ALGO_SEARCH: &str = "cudnn_conv_algo_search";
pub const CUDNN_CONV_USE_MAX_WORKSPACE: &str = "cudnn_conv_use_max_workspace";
pub const ENABLE_CUDA_GRAPH: &str = "enable_cuda_graph";
pub const USE_TF32: &str = "use_tf32";
pub const PREFER_NHWC: &str = "prefer_nhwc";

// ============================================================================
// ROCm Execution Provider
// ============================================================================

pub const MIOPEN_CONV_EXHAUSTIVE_SEARCH: &str = "miopen_conv_exhaustive_search";
pub const MIOPEN_CONV_USE_MAX_WORKSPACE: &str = "miopen_conv_use_max_workspace";

// ============================================================================
// DirectML Execution Provider
// ============================================================================

pub const DISABLE_METACOMMANDS: &str = "disable_metacommands";
pub const ENABLE_DYNAMIC_GRAPH_FUSION: &str = "enable_dynamic_graph_fusion";

// ============================================================================
// OpenVINO Execution Provider
// ============================================================================

pub const DEVICE_TYPE: &str = "device_type";
pub const NUM_OF_THREADS: &str = "num_of_threads";
pub const CACHE_DIR: &str = "cache_dir";
pub const ENABLE_OPENCL_THROTTLING: &str = "enable_opencl_throttling";

/// Suffix OpenVINO expects on a device type to run it in half precision
pub const OPENVINO_FP16_SUFFIX: &str = "_FP16";
