//! Staged ONNX conversion and Olive optimization of diffusion pipelines
//!
//! [`Orchestrator::open`] records a model; [`Orchestrator::prepare`] converts
//! it to ONNX graphs, optionally optimizes them for the execution target,
//! caches both results and assembles the pipeline handed to the inference
//! backend. Failed conversion falls back to the original model, failed
//! optimization to the converted one.

pub mod error;
pub mod types;
pub mod config;
pub mod registry;
pub mod component;
pub mod resolver;
pub mod assembler;
pub mod checkpoint;
pub mod ort_graph;
pub mod stage;
pub mod conversion;
pub mod optimization;
pub mod orchestrator;

pub use error::{PipelineError, Result};
pub use types::{Architecture, PipelineClass};
pub use config::{CacheIdentity, OnnxSettings, RunConfig};
pub use registry::{
    graph_reference, ComponentKind, ComponentLoader, ComponentRegistry, ConfigDirLoader,
    DynComponentLoader, SubmodelSpec,
};
pub use component::{
    AssembledPipeline, CarriedMetadata, Component, ConfiguredComponent, InferenceGraph,
    PipelineSource,
};
pub use resolver::{Resolution, SkippedComponent, SubmodelResolver};
pub use assembler::PipelineAssembler;
pub use checkpoint::{CheckpointExtractor, CheckpointInfo, PythonCheckpointExtractor};
pub use ort_graph::OrtGraphLoader;
pub use stage::{StageContext, StageInput};
pub use conversion::convert;
pub use optimization::optimize;
pub use orchestrator::{Orchestrator, PreparationOutcome, PreparedPipeline, RawPipeline};
