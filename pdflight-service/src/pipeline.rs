//! The lighten pipeline: options, invocation plans, scratch space and the
//! process runner.

pub mod invoker;
pub mod options;
pub mod plan;
pub mod workspace;

pub use options::{OptimizationOptions, OptimizationRequest, Oversample, Preset, RawOptions};
pub use plan::{OutputKind, build_plan};
pub use workspace::TempWorkspace;
