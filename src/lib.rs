//! TokenTerminator client core
//!
//! The engine behind the TokenTerminator demo client: submit a prompt to
//! the optimization service, show the original and optimized answers side
//! by side, and account for the tokens and energy the shorter prompt saved.
//!
//! ## Components
//!
//! - **Alignment** ([`align`]): marks which parts of the original prompt or
//!   answer survived optimization, for strike-out views
//! - **Savings ledger** ([`ledger`]): session totals, scaled projections,
//!   and the energy equivalence display
//! - **Ad trigger** ([`trigger`]): one-shot threshold watcher over the
//!   submission count
//! - **Pipeline** ([`pipeline`]): drives one submission through the
//!   optimize and analyze collaborators and owns the session state
//!
//! The optimization and similarity scoring themselves live in the remote
//! service; this crate only consumes their output.

pub mod align;
pub mod api;
pub mod config;
pub mod ledger;
pub mod pipeline;
pub mod render;
pub mod tokens;
pub mod trigger;

pub use align::{align, reconstruct, AlignMode, AlignmentSpan};
pub use api::{
    AnalysisResult, AnalyzeRequest, AnalyzeService, ApiConfig, ApiError, HttpCollaborator,
    OptimizationResult, OptimizeRequest, OptimizeService,
};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use ledger::{percent_saved, EnergyEquivalent, Projection, SessionLedger};
pub use pipeline::{
    FailureKind, OptimizationPipeline, PipelineConfig, PipelineError, PipelineState,
    SubmissionReport,
};
pub use trigger::AdTrigger;
