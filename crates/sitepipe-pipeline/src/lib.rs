//! sitepipe Pipeline Library
//!
//! Build stages and the task graph that runs them.
//!
//! # Modules
//!
//! - [`sources`] - Glob expansion into ordered source sets
//! - [`stage`] - Stages binding a transform to sources and a destination
//! - [`graph`] - Series and parallel task composition
//! - [`clean`] - Output directory removal
//! - [`styles`] - Sass compilation, prefixing, purging and minification
//! - [`purge`] - Unused-selector detection
//! - [`scripts`] - Script concatenation and minification
//! - [`images`] - Image copying and PNG recompression
//! - [`templates`] - Markup rendering with variables and includes
//! - [`plan`] - Per-mode pipeline assembly

pub mod clean;
pub mod error;
pub mod graph;
pub mod images;
pub mod plan;
pub mod purge;
pub mod scripts;
pub mod sources;
pub mod stage;
pub mod styles;
pub mod templates;

pub use clean::{CleanJob, clean_dir};
pub use error::{PipelineError, Result};
pub use graph::{Job, JobOutcome, JobRecord, RunReport, Task};
pub use plan::Pipeline;
pub use sources::{SourceFile, SourceSet, compile_patterns, matches_any};
pub use stage::{FailurePolicy, Stage, StageKind, StageReport, Transform};
pub use styles::{PurgeOptions, RenderedPages, StylesTransform};
pub use templates::{Renderer, TemplateContext, TemplateError};
