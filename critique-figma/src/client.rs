//! Figma REST client: image export and file comments

use async_trait::async_trait;
use critique_core::config::FigmaConfig;
use critique_core::{CommentAnchor, CommentSink, ImageSource, Secrets};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result};

/// Base64 payloads above this size (KB) tend to be rejected by vision APIs
const LARGE_IMAGE_KB: usize = 4000;

/// Figma API client bound to one file
#[derive(Clone)]
pub struct FigmaClient {
    http: Client,
    api_base: String,
    token: String,
    file_key: String,
    image_scale: u32,
}

impl FigmaClient {
    /// Create a client for `file_key` with an explicit access token
    pub fn new(token: impl Into<String>, file_key: impl Into<String>) -> Self {
        let config = FigmaConfig::default();
        Self {
            http: Client::new(),
            api_base: config.api_base,
            token: token.into(),
            file_key: file_key.into(),
            image_scale: config.image_scale,
        }
    }

    /// Create a client using the configured API base and the stored token
    ///
    /// Token is loaded from (in priority order):
    /// 1. FIGMA_ACCESS_TOKEN environment variable
    /// 2. ~/.config/critique/secrets.toml
    pub fn from_config(
        config: &FigmaConfig,
        secrets: &Secrets,
        file_key: impl Into<String>,
    ) -> Result<Self> {
        Self::from_token(config, secrets.figma_token(), file_key)
    }

    fn from_token(
        config: &FigmaConfig,
        token: Option<String>,
        file_key: impl Into<String>,
    ) -> Result<Self> {
        let token = token.ok_or_else(|| {
            Error::Auth(
                "Missing FIGMA_ACCESS_TOKEN. Set the environment variable \
                 or add [figma] token to ~/.config/critique/secrets.toml"
                    .to_string(),
            )
        })?;

        let file_key = parse_file_key(&file_key.into())?;
        info!(file = %file_key, "Created Figma client");

        Ok(Self::new(token, file_key)
            .with_api_base(config.api_base.clone())
            .with_image_scale(config.image_scale))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_image_scale(mut self, scale: u32) -> Self {
        self.image_scale = scale;
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn file_key(&self) -> &str {
        &self.file_key
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = format!("{}/", self.api_base.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join(path)?)
    }

    /// Ask Figma to render a node as PNG and return the temporary image URL
    pub async fn export_image_url(&self, node_id: &str) -> Result<String> {
        let mut url = self.endpoint(&format!("images/{}", self.file_key))?;
        url.query_pairs_mut()
            .append_pair("ids", node_id)
            .append_pair("format", "png")
            .append_pair("scale", &self.image_scale.to_string());

        debug!(node = %node_id, "Exporting node image");
        let response = self
            .http
            .get(url)
            .header("X-Figma-Token", &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ImagesResponse = response.json().await?;
        body.images
            .get(node_id)
            .and_then(|u| u.clone())
            .ok_or_else(|| Error::NoImage(node_id.to_string()))
    }

    /// Download exported image bytes
    pub async fn download_image(&self, image_url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(image_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(status.as_u16()));
        }

        let bytes = response.bytes().await?.to_vec();
        let base64_kb = bytes.len().div_ceil(3) * 4 / 1024;
        info!(bytes = bytes.len(), base64_kb, "Downloaded screen image");
        if base64_kb > LARGE_IMAGE_KB {
            warn!(base64_kb, "Large image size, provider may reject it");
        }
        Ok(bytes)
    }

    /// Export a node and download the rendered PNG
    pub async fn export_png(&self, node_id: &str) -> Result<Vec<u8>> {
        let url = self.export_image_url(node_id).await?;
        self.download_image(&url).await
    }

    /// Post a comment pinned to a node at a relative offset
    pub async fn create_comment(
        &self,
        node_id: &str,
        message: &str,
        anchor: CommentAnchor,
    ) -> Result<()> {
        let url = self.endpoint(&format!("files/{}/comments", self.file_key))?;
        let body = NewComment {
            message,
            client_meta: ClientMeta {
                node_id,
                node_offset: NodeOffset {
                    x: anchor.x,
                    y: anchor.y,
                },
            },
        };

        let response = self
            .http
            .post(url)
            .header("X-Figma-Token", &self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(node = %node_id, status = status.as_u16(), "Failed to post comment");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for FigmaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FigmaClient")
            .field("api_base", &self.api_base)
            .field("file_key", &self.file_key)
            .field("image_scale", &self.image_scale)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: HashMap<String, Option<String>>,
}

#[derive(Debug, Serialize)]
struct NewComment<'a> {
    message: &'a str,
    client_meta: ClientMeta<'a>,
}

#[derive(Debug, Serialize)]
struct ClientMeta<'a> {
    node_id: &'a str,
    node_offset: NodeOffset,
}

#[derive(Debug, Serialize)]
struct NodeOffset {
    x: f64,
    y: f64,
}

#[async_trait]
impl ImageSource for FigmaClient {
    async fn fetch_image(&self, screen_id: &str) -> critique_core::Result<Vec<u8>> {
        self.export_png(screen_id)
            .await
            .map_err(|e| critique_core::Error::ImageExport(e.to_string()))
    }
}

#[async_trait]
impl CommentSink for FigmaClient {
    async fn post_comment(
        &self,
        screen_id: &str,
        message: &str,
        anchor: CommentAnchor,
    ) -> critique_core::Result<()> {
        self.create_comment(screen_id, message, anchor)
            .await
            .map_err(|e| critique_core::Error::CommentPost {
                status: e.status().unwrap_or(0),
                message: e.to_string(),
            })
    }
}

/// Extract a file key from a bare key or a Figma file URL
///
/// Supports formats:
/// - AbC123xyz
/// - https://www.figma.com/file/AbC123xyz/Name
/// - https://www.figma.com/design/AbC123xyz/Name?node-id=1-2
pub fn parse_file_key(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Parse("File key is empty".to_string()));
    }

    if !input.contains("://") {
        if input.contains('/') {
            return Err(Error::Parse(format!("Invalid file key: {}", input)));
        }
        return Ok(input.to_string());
    }

    let url = Url::parse(input)?;
    let mut segments = url
        .path_segments()
        .ok_or_else(|| Error::Parse(format!("Invalid Figma URL: {}", input)))?;
    match (segments.next(), segments.next()) {
        (Some("file" | "design" | "proto" | "board"), Some(key)) if !key.is_empty() => {
            Ok(key.to_string())
        }
        _ => Err(Error::Parse(format!("Unrecognized Figma URL: {}", input))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(server: &Server) -> FigmaClient {
        FigmaClient::new("figd_token", "FILE123").with_api_base(format!("{}/v1", server.url()))
    }

    #[test]
    fn test_parse_bare_key() {
        assert_eq!(parse_file_key("AbC123").unwrap(), "AbC123");
    }

    #[test]
    fn test_parse_file_url() {
        assert_eq!(
            parse_file_key("https://www.figma.com/file/AbC123/My-Design").unwrap(),
            "AbC123"
        );
        assert_eq!(
            parse_file_key("https://www.figma.com/design/XyZ/App?node-id=1-2").unwrap(),
            "XyZ"
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_file_key("").is_err());
        assert!(parse_file_key("a/b").is_err());
        assert!(parse_file_key("https://www.figma.com/community/123").is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", FigmaClient::new("figd_secret", "F"));
        assert!(!debug.contains("figd_secret"));
    }

    #[tokio::test]
    async fn test_fetch_image_exports_then_downloads() {
        let mut server = Server::new_async().await;
        let export = server
            .mock("GET", "/v1/images/FILE123")
            .match_header("x-figma-token", "figd_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "12:34".into()),
                Matcher::UrlEncoded("format".into(), "png".into()),
                Matcher::UrlEncoded("scale".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"err": null, "images": {"12:34": format!("{}/cdn/img.png", server.url())}})
                    .to_string(),
            )
            .create_async()
            .await;
        let download = server
            .mock("GET", "/cdn/img.png")
            .with_status(200)
            .with_body(vec![0x89, b'P', b'N', b'G'])
            .create_async()
            .await;

        let bytes = client(&server).fetch_image("12:34").await.unwrap();

        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
        export.assert_async().await;
        download.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_image_url() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/images/FILE123")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"err":null,"images":{"12:34":null}}"#)
            .create_async()
            .await;

        let err = client(&server).fetch_image("12:34").await.unwrap_err();
        assert!(matches!(err, critique_core::Error::ImageExport(_)));
        assert!(err.to_string().contains("No image URL returned"));
    }

    #[tokio::test]
    async fn test_export_forbidden() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/images/FILE123")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"status":403,"err":"Invalid token"}"#)
            .create_async()
            .await;

        let err = client(&server).export_image_url("1:1").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_post_comment_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/files/FILE123/comments")
            .match_header("x-figma-token", "figd_token")
            .match_body(Matcher::Json(json!({
                "message": "hello",
                "client_meta": {"node_id": "1:2", "node_offset": {"x": 0.95, "y": 0.15}}
            })))
            .with_status(200)
            .with_body(r#"{"id":"c1"}"#)
            .create_async()
            .await;

        client(&server)
            .post_comment("1:2", "hello", CommentAnchor::CRITICAL)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_comment_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/files/FILE123/comments")
            .with_status(429)
            .with_body("Too many requests")
            .create_async()
            .await;

        let err = client(&server)
            .post_comment("1:2", "hello", CommentAnchor::SUMMARY)
            .await
            .unwrap_err();
        assert!(matches!(err, critique_core::Error::CommentPost { status: 429, .. }));
    }

    #[test]
    fn test_missing_token_is_auth_error() {
        let result = FigmaClient::from_token(&FigmaConfig::default(), None, "F");
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_from_token_applies_config() {
        let config = FigmaConfig {
            image_scale: 1,
            ..FigmaConfig::default()
        };
        let client = FigmaClient::from_token(
            &config,
            Some("figd_x".to_string()),
            "https://www.figma.com/design/AbC123/App?node-id=1-2",
        )
        .unwrap();
        assert_eq!(client.file_key(), "AbC123");
        assert_eq!(client.image_scale, 1);
        assert_eq!(client.api_base, config.api_base);
    }

    #[test]
    fn test_from_config_with_file_token() {
        let mut secrets = Secrets::default();
        secrets.figma.token = Some("figd_file".to_string());
        let client = FigmaClient::from_config(&FigmaConfig::default(), &secrets, "F").unwrap();
        assert_eq!(client.file_key(), "F");
    }
}
