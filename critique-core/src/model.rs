//! Data model for screen critique
//!
//! The inbound shapes mirror what the design-tool plugin extracts for each
//! screen, so the serde names follow the plugin's JSON (`id`, `textContent`,
//! ...) while the Rust names follow the pipeline's vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of design being critiqued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesignType {
    Mobile,
    #[default]
    Web,
    Desktop,
    Landing,
}

impl DesignType {
    pub fn name(&self) -> &'static str {
        match self {
            DesignType::Mobile => "mobile",
            DesignType::Web => "web",
            DesignType::Desktop => "desktop",
            DesignType::Landing => "landing",
        }
    }
}

impl fmt::Display for DesignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Target platform whose guidelines apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    #[default]
    Web,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Analysis settings shared by every screen in a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default)]
    pub design_type: DesignType,
    #[serde(default)]
    pub platform: Platform,
    /// Named framework toggles (accessibility, heuristics, gestalt, ...)
    #[serde(default, alias = "frameworks")]
    pub enabled_frameworks: BTreeMap<String, bool>,
    /// Free-text context from the designer; empty means none
    #[serde(default)]
    pub user_context: String,
}

impl AnalysisConfig {
    /// Names of the frameworks switched on, in stable order
    pub fn active_frameworks(&self) -> Vec<&str> {
        self.enabled_frameworks
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// An interactive element detected in a screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A prototype connection leaving a screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeLink {
    #[serde(rename = "trigger", default, skip_serializing_if = "Option::is_none")]
    pub trigger_kind: Option<String>,
    #[serde(default)]
    pub from_node: String,
    #[serde(default)]
    pub to_node_id: String,
}

/// Where a screen sits in a user flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContext {
    #[serde(default)]
    pub screen_type: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Everything known about one screen before it is sent for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(rename = "id")]
    pub screen_id: String,
    #[serde(rename = "name", default)]
    pub screen_name: String,
    #[serde(rename = "width", default)]
    pub pixel_width: f64,
    #[serde(rename = "height", default)]
    pub pixel_height: f64,
    #[serde(rename = "structure", default)]
    pub structural_tree: serde_json::Value,
    #[serde(rename = "textContent", default)]
    pub extracted_text: Vec<String>,
    #[serde(default)]
    pub interactive_elements: Vec<InteractiveElement>,
    #[serde(default)]
    pub prototype_links: Vec<PrototypeLink>,
    #[serde(default)]
    pub flow_context: Option<FlowContext>,
}

impl AnalysisRequest {
    /// Create a request with only identity and size; the rest is empty
    pub fn new(id: impl Into<String>, name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            screen_id: id.into(),
            screen_name: name.into(),
            pixel_width: width,
            pixel_height: height,
            structural_tree: serde_json::Value::Null,
            extracted_text: Vec::new(),
            interactive_elements: Vec::new(),
            prototype_links: Vec::new(),
            flow_context: None,
        }
    }

    pub fn with_text(mut self, text: Vec<String>) -> Self {
        self.extracted_text = text;
        self
    }

    pub fn with_interactive_elements(mut self, elements: Vec<InteractiveElement>) -> Self {
        self.interactive_elements = elements;
        self
    }

    pub fn with_prototype_links(mut self, links: Vec<PrototypeLink>) -> Self {
        self.prototype_links = links;
        self
    }

    pub fn with_flow_context(mut self, context: FlowContext) -> Self {
        self.flow_context = Some(context);
        self
    }

    /// Screen type from the flow context, inferred from the name when absent
    pub fn screen_type(&self) -> String {
        self.flow_context
            .as_ref()
            .and_then(|c| c.screen_type.clone())
            .unwrap_or_else(|| screen_type_for_name(&self.screen_name).to_string())
    }
}

/// Guess a screen's role from its name
pub fn screen_type_for_name(name: &str) -> &'static str {
    let name = name.to_lowercase();
    if name.contains("login") || name.contains("signin") {
        "authentication"
    } else if name.contains("signup") || name.contains("register") {
        "registration"
    } else if name.contains("home") || name.contains("dashboard") {
        "dashboard"
    } else if name.contains("checkout") {
        "checkout"
    } else if name.contains("profile") {
        "profile"
    } else {
        "unknown"
    }
}

/// Strip characters the host renders as markup from a screen name
pub fn sanitize_screen_name(name: &str) -> String {
    name.replace(['<', '>'], "").trim().to_string()
}

/// Severity assigned by the model to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Positive,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Positive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Positive => "positive",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "positive" => Ok(Severity::Positive),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Analysis dimension a finding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Visual Design")]
    VisualDesign,
    #[serde(rename = "UX Psychology")]
    UxPsychology,
    #[serde(rename = "Behavioral Patterns")]
    BehavioralPatterns,
    #[serde(rename = "User Flows")]
    UserFlows,
    #[serde(rename = "Microcopy")]
    Microcopy,
    #[serde(rename = "Interaction Design")]
    InteractionDesign,
    #[serde(rename = "Information Architecture")]
    InformationArchitecture,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::VisualDesign,
            Category::UxPsychology,
            Category::BehavioralPatterns,
            Category::UserFlows,
            Category::Microcopy,
            Category::InteractionDesign,
            Category::InformationArchitecture,
        ]
    }

    /// Label as written in the output contract
    pub fn label(&self) -> &'static str {
        match self {
            Category::VisualDesign => "Visual Design",
            Category::UxPsychology => "UX Psychology",
            Category::BehavioralPatterns => "Behavioral Patterns",
            Category::UserFlows => "User Flows",
            Category::Microcopy => "Microcopy",
            Category::InteractionDesign => "Interaction Design",
            Category::InformationArchitecture => "Information Architecture",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the labels with any casing, spacing or punctuation
    /// ("Visual Design", "visual_design", "VisualDesign", "Microcopy & Content").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "visualdesign" => Ok(Category::VisualDesign),
            "uxpsychology" => Ok(Category::UxPsychology),
            "behavioralpatterns" => Ok(Category::BehavioralPatterns),
            "userflows" | "userflow" | "userflowanalysis" => Ok(Category::UserFlows),
            "microcopy" | "microcopycontent" => Ok(Category::Microcopy),
            "interactiondesign" => Ok(Category::InteractionDesign),
            "informationarchitecture" => Ok(Category::InformationArchitecture),
            _ => Err(format!("unknown category: {}", s.trim())),
        }
    }
}

/// One structured critique item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub location: String,
    pub category: Category,
    pub severity: Severity,
    pub finding: String,
    pub recommendation: String,
    pub principle: String,
}

/// Outcome for one screen in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenResult {
    #[serde(rename = "frameId")]
    pub screen_id: String,
    #[serde(rename = "frameName")]
    pub screen_name: String,
    #[serde(rename = "success")]
    pub succeeded: bool,
    pub comments_posted: u32,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScreenResult {
    pub fn success(request: &AnalysisRequest, comments_posted: u32) -> Self {
        Self {
            screen_id: request.screen_id.clone(),
            screen_name: request.screen_name.clone(),
            succeeded: true,
            comments_posted,
            error_message: None,
        }
    }

    pub fn failure(request: &AnalysisRequest, error: impl Into<String>) -> Self {
        Self {
            screen_id: request.screen_id.clone(),
            screen_name: request.screen_name.clone(),
            succeeded: false,
            comments_posted: 0,
            error_message: Some(error.into()),
        }
    }
}

/// Secret material for one AI provider call
#[derive(Clone)]
pub struct ProviderCredential {
    pub provider_id: String,
    pub secret: String,
    pub account_id: Option<String>,
}

impl ProviderCredential {
    pub fn new(provider_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            secret: secret.into(),
            account_id: None,
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider_id", &self.provider_id)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_screen() {
        let json = r#"{
            "id": "12:34",
            "name": "Login",
            "width": 375,
            "height": 812,
            "structure": {"name": "Login", "type": "FRAME", "depth": 0},
            "textContent": ["Welcome back", "Sign in"],
            "interactiveElements": [{"name": "Sign in button", "type": "INSTANCE"}],
            "prototypeLinks": [{"trigger": "ON_CLICK", "fromNode": "Sign in button", "toNodeId": "56:78"}],
            "flowContext": {"screenType": "authentication", "frameName": "Login"}
        }"#;
        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.screen_id, "12:34");
        assert_eq!(request.pixel_width, 375.0);
        assert_eq!(request.extracted_text.len(), 2);
        assert_eq!(request.interactive_elements[0].kind, "INSTANCE");
        assert_eq!(
            request.prototype_links[0].trigger_kind.as_deref(),
            Some("ON_CLICK")
        );
        assert_eq!(request.screen_type(), "authentication");
    }

    #[test]
    fn test_minimal_screen_defaults() {
        let request: AnalysisRequest = serde_json::from_str(r#"{"id": "1:2"}"#).unwrap();
        assert!(request.screen_name.is_empty());
        assert!(request.extracted_text.is_empty());
        assert!(request.flow_context.is_none());
    }

    #[test]
    fn test_screen_type_inference() {
        assert_eq!(screen_type_for_name("Login / Email"), "authentication");
        assert_eq!(screen_type_for_name("Register"), "registration");
        assert_eq!(screen_type_for_name("Home Dashboard"), "dashboard");
        assert_eq!(screen_type_for_name("Checkout step 2"), "checkout");
        assert_eq!(screen_type_for_name("User Profile"), "profile");
        assert_eq!(screen_type_for_name("Frame 17"), "unknown");
    }

    #[test]
    fn test_sanitize_screen_name() {
        assert_eq!(sanitize_screen_name("  <Hero> section "), "Hero section");
    }

    #[test]
    fn test_config_accepts_plugin_frameworks_key() {
        let json = r#"{
            "designType": "mobile",
            "platform": "ios",
            "frameworks": {"accessibility": true, "gestalt": false, "heuristics": true},
            "mode": "single"
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.design_type, DesignType::Mobile);
        assert_eq!(config.platform, Platform::Ios);
        assert_eq!(config.active_frameworks(), vec!["accessibility", "heuristics"]);
        assert!(config.user_context.is_empty());
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(" HIGH ".parse::<Severity>(), Ok(Severity::High));
        assert!("urgent".parse::<Severity>().is_err());
        for severity in Severity::all() {
            assert_eq!(severity.name().parse::<Severity>(), Ok(*severity));
        }
    }

    #[test]
    fn test_category_from_str_variants() {
        assert_eq!("Visual Design".parse::<Category>(), Ok(Category::VisualDesign));
        assert_eq!("ux_psychology".parse::<Category>(), Ok(Category::UxPsychology));
        assert_eq!("UserFlows".parse::<Category>(), Ok(Category::UserFlows));
        assert_eq!(
            "Microcopy & Content".parse::<Category>(),
            Ok(Category::Microcopy)
        );
        assert!("Branding".parse::<Category>().is_err());
        for category in Category::all() {
            assert_eq!(category.label().parse::<Category>(), Ok(*category));
        }
    }

    #[test]
    fn test_screen_result_wire_names() {
        let request = AnalysisRequest::new("1:2", "Home", 100.0, 200.0);
        let value = serde_json::to_value(ScreenResult::failure(&request, "boom")).unwrap();
        assert_eq!(value["frameId"], "1:2");
        assert_eq!(value["success"], false);
        assert_eq!(value["commentsPosted"], 0);
        assert_eq!(value["error"], "boom");

        let value = serde_json::to_value(ScreenResult::success(&request, 4)).unwrap();
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let credential = ProviderCredential::new("openai", "sk-very-secret");
        let debug = format!("{:?}", credential);
        assert!(debug.contains("openai"));
        assert!(!debug.contains("sk-very-secret"));
    }
}
