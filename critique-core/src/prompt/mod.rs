//! Analysis prompt rendering
//!
//! The instruction text sent to every provider is a template with
//! `{{VARIABLE}}` placeholders. An embedded default is used unless the
//! configuration names a template file. Rendering is a single pass over the
//! template, so screen content that happens to contain `{{...}}` is never
//! substituted a second time.

use std::collections::HashMap;

use crate::config::PromptConfig;
use crate::model::{AnalysisConfig, AnalysisRequest, Category};
use crate::{Error, Result};

/// Embedded default analysis prompt
const ANALYSIS_PROMPT: &str = include_str!("analysis.md");

/// Layer outline stops descending past this depth
const MAX_STRUCTURE_DEPTH: usize = 4;

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Fill every variable the analysis template uses
    pub fn for_screen(request: &AnalysisRequest, config: &AnalysisConfig) -> Self {
        let purpose = request
            .flow_context
            .as_ref()
            .and_then(|c| c.purpose.clone())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "Not specified".to_string());

        Self::new()
            .with("DESIGN_TYPE", config.design_type.name())
            .with("PLATFORM", config.platform.name())
            .with("SCREEN_NAME", request.screen_name.as_str())
            .with("SCREEN_TYPE", request.screen_type())
            .with("PURPOSE", purpose)
            .with("WIDTH", request.pixel_width.to_string())
            .with("HEIGHT", request.pixel_height.to_string())
            .with("USER_CONTEXT_SECTION", user_context_section(&config.user_context))
            .with("TEXT_CONTENT", text_content(&request.extracted_text))
            .with(
                "INTERACTIVE_ELEMENTS",
                pretty_list(&request.interactive_elements, "No interactive elements identified"),
            )
            .with(
                "PROTOTYPE_LINKS",
                pretty_list(&request.prototype_links, "No prototype connections"),
            )
            .with("STRUCTURE", structure_outline(&request.structural_tree))
            .with("FRAMEWORKS_SECTION", frameworks_section(config))
            .with(
                "CATEGORIES",
                Category::all()
                    .iter()
                    .map(|c| c.label())
                    .collect::<Vec<_>>()
                    .join(" | "),
            )
    }
}

/// Render a template string with variable substitution
///
/// Unknown uppercase placeholders become "(not specified)"; anything else
/// between braces is left as written.
pub fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let name = &after[..end];
        let is_placeholder =
            !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_');

        if is_placeholder {
            match context.variables.get(name) {
                Some(value) => result.push_str(value),
                None => result.push_str("(not specified)"),
            }
        } else {
            result.push_str(&rest[start..start + 2 + end + 2]);
        }
        rest = &after[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Renders analysis prompts from a template
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    /// Builder using the embedded template
    pub fn new() -> Self {
        Self {
            template: ANALYSIS_PROMPT.to_string(),
        }
    }

    /// Builder using a caller-supplied template
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Builder honoring `[prompt] template_path`
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        match &config.template_path {
            Some(path) => {
                let template = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read prompt template {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Self::with_template(template))
            }
            None => Ok(Self::new()),
        }
    }

    /// The raw template text
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt for one screen
    pub fn build(&self, request: &AnalysisRequest, config: &AnalysisConfig) -> String {
        render_template(&self.template, &PromptContext::for_screen(request, config))
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the prompt for one screen with the embedded template
pub fn build_prompt(request: &AnalysisRequest, config: &AnalysisConfig) -> String {
    PromptBuilder::new().build(request, config)
}

fn user_context_section(user_context: &str) -> String {
    let trimmed = user_context.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!(
        "\n\n**USER PROVIDED CONTEXT:**\n{}\n\nPlease consider this context when providing feedback.",
        trimmed
    )
}

fn text_content(text: &[String]) -> String {
    if text.is_empty() {
        "No text content extracted".to_string()
    } else {
        text.join("\n")
    }
}

fn pretty_list<T: serde::Serialize>(items: &[T], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    serde_json::to_string_pretty(items).unwrap_or_else(|_| empty.to_string())
}

fn frameworks_section(config: &AnalysisConfig) -> String {
    let active = config.active_frameworks();
    if active.is_empty() {
        return String::new();
    }
    let lines = active
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n**FRAMEWORKS TO EMPHASIZE:**\n{}\n", lines)
}

fn structure_outline(tree: &serde_json::Value) -> String {
    if tree.is_null() {
        return "No layer structure provided".to_string();
    }
    let mut lines = Vec::new();
    push_outline(tree, 0, &mut lines);
    if lines.is_empty() {
        "No layer structure provided".to_string()
    } else {
        lines.join("\n")
    }
}

fn push_outline(node: &serde_json::Value, depth: usize, lines: &mut Vec<String>) {
    if depth > MAX_STRUCTURE_DEPTH {
        return;
    }
    let name = node.get("name").and_then(|v| v.as_str()).unwrap_or("?");
    let kind = node.get("type").and_then(|v| v.as_str()).unwrap_or("NODE");
    lines.push(format!("{}- {} ({})", "  ".repeat(depth), name, kind));

    if let Some(children) = node.get("children").and_then(|v| v.as_array()) {
        for child in children {
            push_outline(child, depth + 1, lines);
        }
    }
}
