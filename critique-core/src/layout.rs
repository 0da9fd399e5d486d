//! Comment layout engine
//!
//! Findings are grouped into three display tiers and rendered as review
//! comments pinned to fixed anchors on the screen. Two layouts exist:
//!
//! - [`LayoutMode::Clustered`]: a summary comment top-left plus one comment
//!   per non-empty tier down the right edge, paced by a fixed delay.
//! - [`LayoutMode::Flow`]: a single comment above the screen holding every tier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::model::{sanitize_screen_name, Finding, Severity};
use crate::Result;

/// Display tier a finding is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Critical,
    Moderate,
    Good,
}

impl Tier {
    /// Tiers in posting order
    pub fn all() -> &'static [Tier] {
        &[Tier::Critical, Tier::Moderate, Tier::Good]
    }

    /// Heading used by clustered tier comments
    pub fn title(&self) -> &'static str {
        match self {
            Tier::Critical => "CRITICAL ISSUES",
            Tier::Moderate => "MODERATE ISSUES",
            Tier::Good => "GOOD PRACTICES",
        }
    }

    /// Heading used inside the flow comment
    pub fn flow_heading(&self) -> &'static str {
        match self {
            Tier::Critical => "CRITICAL",
            Tier::Moderate => "MODERATE",
            Tier::Good => "GOOD",
        }
    }

    /// Label used by the summary counts
    pub fn summary_label(&self) -> &'static str {
        match self {
            Tier::Critical => "Critical",
            Tier::Moderate => "Moderate",
            Tier::Good => "Good",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Tier::Critical => "🔴",
            Tier::Moderate => "🟡",
            Tier::Good => "🟢",
        }
    }

    /// Where the clustered comment for this tier is pinned
    pub fn anchor(&self) -> CommentAnchor {
        match self {
            Tier::Critical => CommentAnchor::CRITICAL,
            Tier::Moderate => CommentAnchor::MODERATE,
            Tier::Good => CommentAnchor::GOOD,
        }
    }
}

impl From<Severity> for Tier {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::High => Tier::Critical,
            Severity::Medium => Tier::Moderate,
            Severity::Low | Severity::Positive => Tier::Good,
        }
    }
}

/// Comment position relative to the screen's bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommentAnchor {
    pub x: f64,
    pub y: f64,
}

impl CommentAnchor {
    pub const SUMMARY: CommentAnchor = CommentAnchor { x: 0.05, y: 0.05 };
    pub const CRITICAL: CommentAnchor = CommentAnchor { x: 0.95, y: 0.15 };
    pub const MODERATE: CommentAnchor = CommentAnchor { x: 0.95, y: 0.50 };
    pub const GOOD: CommentAnchor = CommentAnchor { x: 0.95, y: 0.85 };
    /// Just above the top edge, horizontally centred
    pub const FLOW: CommentAnchor = CommentAnchor { x: 0.5, y: -0.1 };
}

/// Comment layout policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Clustered,
    Flow,
}

/// Findings partitioned by tier, preserving the model's order within each tier
#[derive(Debug, Default)]
pub struct TieredFindings<'a> {
    pub critical: Vec<&'a Finding>,
    pub moderate: Vec<&'a Finding>,
    pub good: Vec<&'a Finding>,
}

impl<'a> TieredFindings<'a> {
    pub fn classify(findings: &'a [Finding]) -> Self {
        let mut tiers = Self::default();
        for finding in findings {
            match Tier::from(finding.severity) {
                Tier::Critical => tiers.critical.push(finding),
                Tier::Moderate => tiers.moderate.push(finding),
                Tier::Good => tiers.good.push(finding),
            }
        }
        tiers
    }

    pub fn get(&self, tier: Tier) -> &[&'a Finding] {
        match tier {
            Tier::Critical => &self.critical,
            Tier::Moderate => &self.moderate,
            Tier::Good => &self.good,
        }
    }

    pub fn total(&self) -> usize {
        self.critical.len() + self.moderate.len() + self.good.len()
    }

    /// Non-empty tiers in posting order
    pub fn non_empty(&self) -> impl Iterator<Item = Tier> + '_ {
        Tier::all()
            .iter()
            .copied()
            .filter(move |t| !self.get(*t).is_empty())
    }
}

/// Render the summary comment: counts per tier plus a generation footer
pub fn format_summary(
    screen_name: &str,
    tiers: &TieredFindings<'_>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = format!("UX Analysis: \"{}\"\n\n", sanitize_screen_name(screen_name));
    let _ = writeln!(out, "Found {} findings:", tiers.total());
    for tier in tiers.non_empty() {
        let _ = writeln!(out, "{}: {}", tier.summary_label(), tiers.get(tier).len());
    }
    out.push_str("\nSee detailed feedback in individual comments.\n");
    let _ = write!(
        out,
        "\nGenerated by UX Analysis Bot • {} UTC",
        generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p")
    );
    out
}

/// Render one clustered tier comment listing every finding in full
pub fn format_tier_comment(tier: Tier, items: &[&Finding]) -> String {
    let mut out = format!("{} {} ({})\n\n", tier.marker(), tier.title(), items.len());
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Finding {}: {}", index + 1, item.finding);
        let _ = writeln!(out, "Location: {}", item.location);
        let _ = writeln!(out, "Recommendation: {}", item.recommendation);
        let _ = writeln!(out, "({})", item.principle);
    }
    out
}

/// Render the single flow-mode comment
pub fn format_flow_comment(screen_name: &str, tiers: &TieredFindings<'_>) -> String {
    let mut out = format!("Frame: \"{}\"\n\n", sanitize_screen_name(screen_name));
    let sections: Vec<String> = tiers
        .non_empty()
        .map(|tier| {
            let items = tiers.get(tier);
            let mut section = format!("{} ({}):\n", tier.flow_heading(), items.len());
            for (index, item) in items.iter().enumerate() {
                let _ = writeln!(section, "{}. {}", index + 1, item.finding);
            }
            section
        })
        .collect();
    out.push_str(&sections.join("\n"));
    out
}

/// Destination for rendered comments (the host's commenting API)
#[async_trait]
pub trait CommentSink: Send + Sync {
    async fn post_comment(&self, screen_id: &str, message: &str, anchor: CommentAnchor)
        -> Result<()>;
}

/// One rendered comment ready to post
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedComment {
    pub message: String,
    pub anchor: CommentAnchor,
}

/// Lays out findings as comments and posts them with pacing
#[derive(Debug, Clone)]
pub struct CommentLayout {
    delay: Duration,
}

impl Default for CommentLayout {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

impl CommentLayout {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Render the comments for one screen without posting them
    pub fn plan(
        &self,
        findings: &[Finding],
        screen_name: &str,
        mode: LayoutMode,
        generated_at: DateTime<Utc>,
    ) -> Vec<PlannedComment> {
        let tiers = TieredFindings::classify(findings);
        match mode {
            LayoutMode::Flow => vec![PlannedComment {
                message: format_flow_comment(screen_name, &tiers),
                anchor: CommentAnchor::FLOW,
            }],
            LayoutMode::Clustered => {
                let mut comments = vec![PlannedComment {
                    message: format_summary(screen_name, &tiers, generated_at),
                    anchor: CommentAnchor::SUMMARY,
                }];
                comments.extend(tiers.non_empty().map(|tier| PlannedComment {
                    message: format_tier_comment(tier, tiers.get(tier)),
                    anchor: tier.anchor(),
                }));
                comments
            }
        }
    }

    /// Post the laid-out comments, returning how many were written.
    ///
    /// Stops at the first rejected write; comments already posted stay.
    pub async fn post_findings(
        &self,
        sink: &dyn CommentSink,
        findings: &[Finding],
        screen_name: &str,
        screen_id: &str,
        mode: LayoutMode,
    ) -> Result<u32> {
        let comments = self.plan(findings, screen_name, mode, Utc::now());
        let mut posted = 0u32;

        for (index, comment) in comments.iter().enumerate() {
            if index > 0 && mode == LayoutMode::Clustered && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            sink.post_comment(screen_id, &comment.message, comment.anchor)
                .await?;
            posted += 1;
            debug!(screen = %screen_id, x = comment.anchor.x, y = comment.anchor.y, "Posted comment");
        }

        info!(screen = %screen_id, mode = ?mode, comments = posted, "Comments posted");
        Ok(posted)
    }
}
