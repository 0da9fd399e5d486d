//! Batch coordinator
//!
//! Screens are processed strictly one after another. Each screen runs the
//! full pipeline (image, prompt, provider, normalize, comments) and any error
//! along the way is folded into that screen's [`ScreenResult`]; the loop
//! always continues with the next screen.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::layout::{CommentLayout, CommentSink, LayoutMode};
use crate::model::{AnalysisConfig, AnalysisRequest, ProviderCredential, ScreenResult};
use crate::normalize::normalize;
use crate::prompt::PromptBuilder;
use crate::provider::{Provider, ProviderRegistry};
use crate::{Error, Result};

/// Source of rendered screen images (the host's export API)
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Return PNG bytes for one screen
    async fn fetch_image(&self, screen_id: &str) -> Result<Vec<u8>>;
}

/// One unit of work handed to the coordinator
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub screens: &'a [AnalysisRequest],
    pub config: &'a AnalysisConfig,
    pub provider_id: &'a str,
    pub credential: &'a ProviderCredential,
    pub mode: LayoutMode,
}

/// Per-screen outcomes of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<ScreenResult>,
}

impl BatchReport {
    pub fn analyzed(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }

    pub fn comments_posted(&self) -> u32 {
        self.results.iter().map(|r| r.comments_posted).sum()
    }

    pub fn message(&self) -> String {
        format!(
            "Analysis complete! Processed {} frames.",
            self.results.len()
        )
    }
}

/// Drives a batch through the pipeline
pub struct BatchCoordinator<'a> {
    providers: &'a ProviderRegistry,
    images: &'a dyn ImageSource,
    comments: &'a dyn CommentSink,
    prompts: PromptBuilder,
    layout: CommentLayout,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        providers: &'a ProviderRegistry,
        images: &'a dyn ImageSource,
        comments: &'a dyn CommentSink,
    ) -> Self {
        Self {
            providers,
            images,
            comments,
            prompts: PromptBuilder::new(),
            layout: CommentLayout::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_layout(mut self, layout: CommentLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Run every screen of the batch.
    ///
    /// Fails as a whole only when a precondition is violated; otherwise the
    /// report holds exactly one result per input screen.
    pub async fn run_batch(&self, batch: Batch<'_>) -> Result<BatchReport> {
        if batch.credential.secret.trim().is_empty() {
            return Err(Error::Precondition(
                "No API key available. Please provide your API key in the plugin.".to_string(),
            ));
        }
        if batch.screens.is_empty() {
            return Err(Error::Precondition(
                "No screens to analyze. Please select at least one frame.".to_string(),
            ));
        }

        info!(
            screens = batch.screens.len(),
            provider = %batch.provider_id,
            mode = ?batch.mode,
            "Starting batch"
        );

        let provider = match self.providers.route(batch.provider_id) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(provider = %batch.provider_id, "Unknown provider, failing every screen");
                let message = e.to_string();
                return Ok(BatchReport {
                    results: batch
                        .screens
                        .iter()
                        .map(|screen| ScreenResult::failure(screen, message.clone()))
                        .collect(),
                });
            }
        };

        let mut report = BatchReport::default();
        for screen in batch.screens {
            let result = match self.analyze_screen(provider, screen, &batch).await {
                Ok(posted) => {
                    info!(screen = %screen.screen_name, comments = posted, "Analyzed screen");
                    ScreenResult::success(screen, posted)
                }
                Err(e) => {
                    warn!(screen = %screen.screen_name, error = %e, "Failed to analyze screen");
                    ScreenResult::failure(screen, e.to_string())
                }
            };
            report.results.push(result);
        }

        info!(
            analyzed = report.analyzed(),
            failed = report.failed(),
            "Batch complete"
        );
        Ok(report)
    }

    async fn analyze_screen(
        &self,
        provider: &dyn Provider,
        screen: &AnalysisRequest,
        batch: &Batch<'_>,
    ) -> Result<u32> {
        let image = if provider.sends_image() {
            self.images.fetch_image(&screen.screen_id).await?
        } else {
            Vec::new()
        };

        let prompt = self.prompts.build(screen, batch.config);
        debug!(screen = %screen.screen_name, prompt_chars = prompt.len(), "Built prompt");

        let raw = provider.analyze(&image, &prompt, batch.credential).await?;
        let findings = normalize(&raw)?;
        debug!(screen = %screen.screen_name, findings = findings.len(), "Normalized findings");

        self.layout
            .post_findings(
                self.comments,
                &findings,
                &screen.screen_name,
                &screen.screen_id,
                batch.mode,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CommentAnchor;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const FIVE_FINDINGS: &str = r#"```json
[
  {"location":"Hero","category":"Visual Design","severity":"critical","finding":"f1","recommendation":"r","principle":"p"},
  {"location":"Form","category":"UX Psychology","severity":"critical","finding":"f2","recommendation":"r","principle":"p"},
  {"location":"CTA","category":"Behavioral Patterns","severity":"medium","finding":"f3","recommendation":"r","principle":"p"},
  {"location":"Nav","category":"User Flows","severity":"positive","finding":"f4","recommendation":"r","principle":"p"},
  {"location":"Copy","category":"Microcopy","severity":"positive","finding":"f5","recommendation":"r","principle":"p"}
]
```"#;

    /// Replies keyed by a screen name that appears in the prompt
    struct ScriptedProvider {
        replies: HashMap<&'static str, std::result::Result<&'static str, u16>>,
        calls: Mutex<u32>,
        text_only: bool,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn label(&self) -> &'static str {
            "Scripted"
        }

        fn sends_image(&self) -> bool {
            !self.text_only
        }

        async fn analyze(
            &self,
            _image: &[u8],
            prompt: &str,
            _credential: &ProviderCredential,
        ) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            let reply = self
                .replies
                .iter()
                .find(|(name, _)| prompt.contains(*name))
                .map(|(_, reply)| *reply)
                .unwrap_or(Ok("[]"));
            match reply {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(Error::provider("Scripted", status, "boom")),
            }
        }
    }

    #[derive(Default)]
    struct FakeImages {
        failing: Vec<&'static str>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageSource for FakeImages {
        async fn fetch_image(&self, screen_id: &str) -> Result<Vec<u8>> {
            self.requested.lock().unwrap().push(screen_id.to_string());
            if self.failing.iter().any(|id| *id == screen_id) {
                return Err(Error::ImageExport("No image URL returned from Figma".to_string()));
            }
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    #[derive(Default)]
    struct FakeSink {
        rejecting: Vec<&'static str>,
        posts: Mutex<Vec<(String, CommentAnchor)>>,
    }

    #[async_trait]
    impl CommentSink for FakeSink {
        async fn post_comment(
            &self,
            screen_id: &str,
            _message: &str,
            anchor: CommentAnchor,
        ) -> Result<()> {
            if self.rejecting.iter().any(|id| *id == screen_id) {
                return Err(Error::CommentPost {
                    status: 403,
                    message: "Invalid scope".to_string(),
                });
            }
            self.posts.lock().unwrap().push((screen_id.to_string(), anchor));
            Ok(())
        }
    }

    fn registry(replies: Vec<(&'static str, std::result::Result<&'static str, u16>)>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(ScriptedProvider {
            replies: replies.into_iter().collect(),
            calls: Mutex::new(0),
            text_only: false,
        }));
        registry
    }

    fn screens(names: &[(&str, &str)]) -> Vec<AnalysisRequest> {
        names
            .iter()
            .map(|(id, name)| AnalysisRequest::new(*id, *name, 375.0, 812.0))
            .collect()
    }

    fn coordinator<'a>(
        registry: &'a ProviderRegistry,
        images: &'a FakeImages,
        sink: &'a FakeSink,
    ) -> BatchCoordinator<'a> {
        BatchCoordinator::new(registry, images, sink)
            .with_layout(CommentLayout::new(Duration::ZERO))
    }

    #[tokio::test]
    async fn test_export_failure_is_isolated() {
        let registry = registry(vec![("Screen A", Ok(FIVE_FINDINGS))]);
        let images = FakeImages {
            failing: vec!["2:2"],
            ..Default::default()
        };
        let sink = FakeSink::default();
        let screens = screens(&[("1:1", "Screen A"), ("2:2", "Screen B")]);
        let config = AnalysisConfig::default();
        let credential = ProviderCredential::new("scripted", "key");

        let report = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "scripted",
                credential: &credential,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap();

        assert_eq!(report.analyzed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.results[0].comments_posted, 4);
        assert!(report.results[0].succeeded);
        assert!(!report.results[1].succeeded);
        assert!(report.results[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("No image URL returned"));

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 4);
        assert!(posts.iter().all(|(id, _)| id == "1:1"));
    }

    #[tokio::test]
    async fn test_failure_at_any_stage_keeps_order() {
        let registry = registry(vec![
            ("Alpha", Ok("[]")),
            ("Beta", Err(503)),
            ("Gamma", Ok("I could not analyze this screen.")),
            ("Delta", Ok(FIVE_FINDINGS)),
        ]);
        let images = FakeImages::default();
        let sink = FakeSink::default();
        let screens = screens(&[("a", "Alpha"), ("b", "Beta"), ("c", "Gamma"), ("d", "Delta")]);
        let config = AnalysisConfig::default();
        let credential = ProviderCredential::new("scripted", "key");

        let report = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "scripted",
                credential: &credential,
                mode: LayoutMode::Flow,
            })
            .await
            .unwrap();

        let ids: Vec<&str> = report.results.iter().map(|r| r.screen_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        let ok: Vec<bool> = report.results.iter().map(|r| r.succeeded).collect();
        assert_eq!(ok, vec![true, false, false, true]);
        assert!(report.results[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("Scripted API error (503)"));
        assert_eq!(report.results[3].comments_posted, 1);
        assert_eq!(report.comments_posted(), 2);
    }

    #[tokio::test]
    async fn test_comment_rejection_is_isolated() {
        let registry = registry(vec![
            ("Alpha", Ok(FIVE_FINDINGS)),
            ("Beta", Ok(FIVE_FINDINGS)),
            ("Gamma", Ok(FIVE_FINDINGS)),
        ]);
        let images = FakeImages::default();
        let sink = FakeSink {
            rejecting: vec!["b"],
            ..Default::default()
        };
        let screens = screens(&[("a", "Alpha"), ("b", "Beta"), ("c", "Gamma")]);
        let config = AnalysisConfig::default();
        let credential = ProviderCredential::new("scripted", "key");

        let report = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "scripted",
                credential: &credential,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        let ok: Vec<bool> = report.results.iter().map(|r| r.succeeded).collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(
            report.results[1].error_message.as_deref(),
            Some("Comment post failed (403): Invalid scope")
        );
        assert_eq!(report.results[1].comments_posted, 0);
        assert_eq!(report.results[2].comments_posted, 4);

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.iter().filter(|(id, _)| id == "c").count(), 4);
        assert!(posts.iter().all(|(id, _)| id != "b"));
    }

    #[tokio::test]
    async fn test_text_only_provider_skips_export() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(ScriptedProvider {
            replies: [("Alpha", Ok(FIVE_FINDINGS))].into_iter().collect(),
            calls: Mutex::new(0),
            text_only: true,
        }));
        let images = FakeImages {
            failing: vec!["a"],
            ..Default::default()
        };
        let sink = FakeSink::default();
        let screens = screens(&[("a", "Alpha")]);
        let config = AnalysisConfig::default();
        let credential = ProviderCredential::new("scripted", "key");

        let report = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "scripted",
                credential: &credential,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap();

        assert_eq!(report.analyzed(), 1);
        assert_eq!(report.results[0].comments_posted, 4);
        assert!(images.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_every_screen() {
        let registry = registry(vec![]);
        let images = FakeImages::default();
        let sink = FakeSink::default();
        let screens = screens(&[("1", "One"), ("2", "Two")]);
        let config = AnalysisConfig::default();
        let credential = ProviderCredential::new("bard", "key");

        let report = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "bard",
                credential: &credential,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap();

        assert_eq!(report.failed(), 2);
        for result in &report.results {
            assert!(result
                .error_message
                .as_deref()
                .unwrap()
                .starts_with("Unsupported AI provider: bard"));
            assert_eq!(result.comments_posted, 0);
        }
        assert!(images.requested.lock().unwrap().is_empty());
        assert!(sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preconditions_abort_batch() {
        let registry = registry(vec![]);
        let images = FakeImages::default();
        let sink = FakeSink::default();
        let config = AnalysisConfig::default();
        let screens = screens(&[("1", "One")]);

        let blank = ProviderCredential::new("scripted", "  ");
        let err = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: "scripted",
                credential: &blank,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap_err();
        assert!(err.is_precondition());

        let credential = ProviderCredential::new("scripted", "key");
        let err = coordinator(&registry, &images, &sink)
            .run_batch(Batch {
                screens: &[],
                config: &config,
                provider_id: "scripted",
                credential: &credential,
                mode: LayoutMode::Clustered,
            })
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(images.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn test_report_message() {
        let screen = AnalysisRequest::new("1", "One", 1.0, 1.0);
        let report = BatchReport {
            results: vec![
                ScreenResult::success(&screen, 3),
                ScreenResult::failure(&screen, "boom"),
            ],
        };
        assert_eq!(report.message(), "Analysis complete! Processed 2 frames.");
        assert_eq!(report.comments_posted(), 3);
    }
}
