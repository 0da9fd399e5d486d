//! Critique Figma - Figma integration for screen critique
//!
//! This crate provides the Figma REST calls the pipeline needs: rendering a
//! screen to PNG and pinning review comments to it. [`FigmaClient`] implements
//! the core `ImageSource` and `CommentSink` traits.

mod client;
mod error;

pub use client::{parse_file_key, FigmaClient};
pub use error::{Error, Result};
