//! Critique Core - screen critique analysis pipeline
//!
//! This crate turns extracted design screens into severity-classified UX
//! findings by way of interchangeable AI vision providers, and lays those
//! findings out as review comments on the screen.

pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod prompt;
pub mod provider;
pub mod secrets;

pub use api::{AnalysisMode, AnalyzePayload, AnalyzeResponse, ErrorResponse, ProbeResponse};
pub use batch::{Batch, BatchCoordinator, BatchReport, ImageSource};
pub use config::Config;
pub use error::{Error, Result};
pub use layout::{CommentAnchor, CommentLayout, CommentSink, LayoutMode, Tier};
pub use model::{
    AnalysisConfig, AnalysisRequest, Category, DesignType, Finding, Platform, ProviderCredential,
    ScreenResult, Severity,
};
pub use normalize::normalize;
pub use prompt::{build_prompt, PromptBuilder};
pub use provider::{Provider, ProviderRegistry, ProviderSettings};
pub use secrets::Secrets;
