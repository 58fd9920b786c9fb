//! Microsoft Olive integration
//!
//! Workflows are rendered from JSON templates, patched per sub-component and
//! execution target, and run through a [`WorkflowEngine`]. The engine reports
//! a [`FootprintSet`]; callers pick the output of the pass they care about.

pub mod error;
pub mod engine;
pub mod footprint;
pub mod process;
pub mod template;

pub use error::{OliveError, Result};
pub use engine::{PythonOliveEngine, WorkflowEngine, OLIVE_RUN_MODULE};
pub use footprint::{Footprint, FootprintSet, CONVERSION_PASS, OPTIMIZATION_PASS};
pub use process::PythonCommand;
pub use template::{set_at, TemplateVars, Workflow};
