//! CLI command implementations

pub mod analyze;
pub mod providers;
pub mod serve;

pub use analyze::AnalyzeArgs;
pub use providers::ProvidersArgs;
pub use serve::ServeArgs;
