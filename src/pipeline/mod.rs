//! The analysis pipeline and its observable state.

pub mod runner;
pub mod session;
pub mod status;

pub use runner::{AnalysisRequest, Collaborators, Pipeline, PipelineSettings};
pub use session::AnalysisSession;
pub use status::PipelineStatus;
