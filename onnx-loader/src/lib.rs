//! ONNX Runtime session loading for diffusion sub-component graphs
//!
//! Thin wrapper around `ort`:
//! - execution providers come from `sdonnx-execution-providers` and are
//!   bridged to `ort` dispatches
//! - [`SessionOptions`] pins the symbolic UNet dimensions to the run's
//!   batch size and resolution

pub mod error;
pub mod providers_bridge;
pub mod session;
pub mod session_options;

pub use error::{OnnxError, Result};
pub use session::OnnxSession;
pub use session_options::SessionOptions;
pub use providers_bridge::bridge_to_ort;

/// Re-export of `ort` for callers that need the raw session API
pub use ort;
