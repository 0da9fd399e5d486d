//! Extraction of findings from free-text model replies
//!
//! Providers are asked for a bare JSON array but routinely wrap it in code
//! fences, prose preambles or trailing commentary. Extraction strips fences,
//! then considers the widest bracketed span (first `[` to last `]`) followed by
//! every balanced `[...]` span in order. The first candidate that yields at
//! least one [`Finding`] wins. Arrays holding only scalars (`step [1]`,
//! `["header","footer"]`) are prose, not findings, and are skipped. If no
//! candidate yields a finding, the first empty or object-bearing array decides
//! the result. Elements that do not coerce into a [`Finding`] are dropped.

use serde_json::Value;
use tracing::debug;

use crate::model::{Category, Finding, Severity};
use crate::{Error, Result};

/// Longest excerpt of the reply quoted in an unparsable-response error
const EXCERPT_LEN: usize = 300;

/// Extract the ordered list of well-formed findings from a model reply
pub fn normalize(raw_text: &str) -> Result<Vec<Finding>> {
    let cleaned = strip_code_fences(raw_text);
    let mut fallback: Option<Vec<Finding>> = None;

    for items in candidate_arrays(&cleaned) {
        if !items.is_empty() && !items.iter().any(Value::is_object) {
            debug!(len = items.len(), "Skipping scalar-only array");
            continue;
        }
        let findings = coerce_all(items);
        if !findings.is_empty() {
            return Ok(findings);
        }
        fallback.get_or_insert(findings);
    }

    fallback.ok_or_else(|| {
        Error::UnparsableResponse(format!("no findings array found in: {}", excerpt(raw_text)))
    })
}

/// Remove Markdown code-fence delimiters anywhere in the text
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Every bracketed span that parses as a JSON array, widest span first
fn candidate_arrays(text: &str) -> impl Iterator<Item = Vec<Value>> + '_ {
    let widest = match (text.find('['), text.rfind(']')) {
        (Some(first), Some(last)) if last > first => Some(&text[first..=last]),
        _ => None,
    };

    widest
        .into_iter()
        .chain(
            text.match_indices('[')
                .filter_map(move |(start, _)| balanced_span(text, start)),
        )
        .filter_map(|span| match serde_json::from_str::<Value>(span) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        })
}

fn coerce_all(items: Vec<Value>) -> Vec<Finding> {
    let total = items.len();
    let findings: Vec<Finding> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match coerce_finding(&item) {
            Ok(finding) => Some(finding),
            Err(reason) => {
                debug!(index, reason = %reason, "Dropping malformed finding");
                None
            }
        })
        .collect();

    debug!(total, kept = findings.len(), "Normalized model response");
    findings
}

/// The `[...]` span starting at `start` with matching depth, skipping
/// brackets inside JSON strings
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn coerce_finding(item: &Value) -> std::result::Result<Finding, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "element is not an object".to_string())?;

    let text_field = |name: &str| -> std::result::Result<String, String> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("missing or empty field '{}'", name))
    };

    let category: Category = text_field("category")?.parse()?;
    let severity: Severity = text_field("severity")?.parse()?;

    Ok(Finding {
        location: text_field("location")?,
        category,
        severity,
        finding: text_field("finding")?,
        recommendation: text_field("recommendation")?,
        principle: text_field("principle")?,
    })
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LEN {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_LEN).collect();
    format!("{}...", cut)
}
