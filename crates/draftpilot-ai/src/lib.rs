//! Language-model stages of the draftpilot pipeline.
//!
//! - `LanguageModel`: provider seam, with an Anthropic Messages API client
//! - `ContentAnalyzer`: VideoAsset -> ContentAnalysis
//! - `PlanGenerator`: ContentAnalysis + StyleConfig -> validated EditingPlan

pub mod analyzer;
pub mod anthropic;
pub mod error;
pub mod planner;
pub mod provider;

pub use analyzer::ContentAnalyzer;
pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use error::{AiError, AiResult};
pub use planner::PlanGenerator;
pub use provider::{extract_json, CompletionRequest, LanguageModel};
