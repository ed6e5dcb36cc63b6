//! HTTP client for the Stenography explanation service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiErrorKind, ClientError};
use crate::wire::{
    AutopilotRequest, AutopilotResponse, CodeBlock, ExplainRequest, ExplainResponse,
    StenographyOptions, WirePosition,
};

/// Public endpoint of the service.
pub const DEFAULT_BASE_URL: &str = "https://stenography-worker.stenography.workers.dev";

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A region returned by a whole-document call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainedBlock {
    /// 1-indexed start row.
    pub start_row: u32,
    /// 1-indexed start column.
    pub start_col: u32,
    /// Source text of the region.
    pub code: String,
    /// Explanation, absent on dry runs.
    pub explanation: Option<String>,
}

/// Successful whole-document call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Account-level invocation counter reported by the service.
    pub invocation_counter: i64,
    pub blocks: Vec<ExplainedBlock>,
}

/// Successful single-fragment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub text: String,
    pub code: String,
}

/// Either an analysis or a typed failure.
pub type AnalysisResult = Result<Analysis, ApiError>;

/// The remote operations the annotation layer depends on.
#[async_trait]
pub trait ExplainApi: Send + Sync {
    /// Analyzes a whole document. With `dry_run` the service only reports
    /// the regions it would explain, without charging invocations.
    async fn analyze(
        &self,
        api_key: &str,
        source: &str,
        language: &str,
        dry_run: bool,
    ) -> AnalysisResult;

    /// Explains a single code fragment.
    async fn explain_fragment(
        &self,
        api_key: &str,
        fragment: &str,
        language: &str,
    ) -> Result<Explanation, ApiError>;
}

/// Client for the explanation service.
#[derive(Debug, Clone)]
pub struct StenographyClient {
    http: reqwest::Client,
    base_url: String,
    options: StenographyOptions,
}

/// Builder for [`StenographyClient`].
#[derive(Debug)]
pub struct StenographyClientBuilder {
    base_url: String,
    timeout: Duration,
    options: StenographyOptions,
}

impl StenographyClient {
    /// Create a client against the public endpoint with default settings.
    pub fn new() -> Result<Self, ClientError> {
        Self::builder().build()
    }

    /// Create a new builder for StenographyClient.
    pub fn builder() -> StenographyClientBuilder {
        StenographyClientBuilder {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            options: StenographyOptions::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn autopilot_url(&self) -> String {
        format!("{}/autopilot", self.base_url)
    }

    fn explain_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    /// Posts a JSON body and decodes a JSON response.
    ///
    /// Error statuses are tolerated as long as the body decodes, because the
    /// service reports its own failures inside the body.
    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<(StatusCode, T), ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<T>(&text) {
            Ok(value) => Ok((status, value)),
            Err(e) if status.is_success() => {
                debug!("Undecodable response from {}: {}", url, e);
                Err(ClientError::UnexpectedBody(text))
            }
            Err(_) => Err(ClientError::HttpError { status, body: text }),
        }
    }

    async fn request_analysis(
        &self,
        api_key: &str,
        source: &str,
        language: &str,
        dry_run: bool,
    ) -> Result<(StatusCode, AutopilotResponse), ClientError> {
        let request = AutopilotRequest {
            code: source,
            api_key: api_key.trim(),
            dry_run,
            index_by_one: true,
            add_import: false,
            language,
            stenography_options: &self.options,
        };
        self.post_json(&self.autopilot_url(), &request).await
    }

    async fn request_explanation(
        &self,
        api_key: &str,
        fragment: &str,
        language: &str,
    ) -> Result<(StatusCode, ExplainResponse), ClientError> {
        let request = ExplainRequest {
            code: fragment,
            api_key: api_key.trim(),
            language,
            options: &self.options,
        };
        self.post_json(&self.explain_url(), &request).await
    }
}

#[async_trait]
impl ExplainApi for StenographyClient {
    async fn analyze(
        &self,
        api_key: &str,
        source: &str,
        language: &str,
        dry_run: bool,
    ) -> AnalysisResult {
        debug!("Analyzing {} bytes of {} (dry_run={})", source.len(), language, dry_run);

        let (status, response) = self
            .request_analysis(api_key, source, language, dry_run)
            .await
            .map_err(|e| {
                warn!("Autopilot request failed: {}", e);
                ApiError::from(e)
            })?;

        if let Some(error) = response.error {
            return Err(ApiError::from_service(Some(status), error.message()));
        }
        if !status.is_success() {
            return Err(ApiError::from_service(
                Some(status),
                format!("HTTP error: {status}"),
            ));
        }

        let blocks = response
            .code_blocks
            .unwrap_or_default()
            .into_iter()
            .map(|block| to_explained_block(block, source))
            .collect();

        Ok(Analysis {
            invocation_counter: response.invocation_counter,
            blocks,
        })
    }

    async fn explain_fragment(
        &self,
        api_key: &str,
        fragment: &str,
        language: &str,
    ) -> Result<Explanation, ApiError> {
        debug!("Explaining {} byte fragment of {}", fragment.len(), language);

        let (status, response) = self
            .request_explanation(api_key, fragment, language)
            .await
            .map_err(|e| {
                warn!("Explain request failed: {}", e);
                ApiError::from(e)
            })?;

        if let Some(error) = response.error {
            return Err(ApiError::from_service(Some(status), error.message()));
        }
        if !status.is_success() {
            return Err(ApiError::from_service(
                Some(status),
                format!("HTTP error: {status}"),
            ));
        }
        if response.result.pm.is_empty() {
            return Err(ApiError::new(
                ApiErrorKind::Unknown,
                "Service returned an empty explanation",
            ));
        }

        let code = if response.result.code.is_empty() {
            fragment.to_string()
        } else {
            response.result.code
        };

        Ok(Explanation {
            text: response.result.pm,
            code,
        })
    }
}

impl StenographyClientBuilder {
    /// Set the base URL of the service (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set timeout for HTTP requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set explanation options.
    pub fn options(mut self, options: StenographyOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the StenographyClient.
    pub fn build(self) -> Result<StenographyClient, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::ClientBuildError(e.to_string()))?;

        Ok(StenographyClient {
            http,
            base_url: self.base_url,
            options: self.options,
        })
    }
}

fn to_explained_block(block: CodeBlock, source: &str) -> ExplainedBlock {
    let (code, explanation) = match block.stenography_result {
        Some(result) if !result.code.is_empty() => {
            let explanation = (!result.pm.is_empty()).then_some(result.pm);
            (result.code, explanation)
        }
        Some(result) => {
            let explanation = (!result.pm.is_empty()).then_some(result.pm);
            (
                extract_region(source, block.start_position, block.end_position),
                explanation,
            )
        }
        None => (
            extract_region(source, block.start_position, block.end_position),
            None,
        ),
    };

    ExplainedBlock {
        start_row: block.start_position.row,
        start_col: block.start_position.column,
        code,
        explanation,
    }
}

/// Cuts the text between two 1-indexed positions out of `source`.
///
/// Without an end position the region runs to the end of the start row.
fn extract_region(source: &str, start: WirePosition, end: Option<WirePosition>) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let start_row = start.row.saturating_sub(1) as usize;
    if start_row >= lines.len() {
        return String::new();
    }

    let end = end.unwrap_or(WirePosition {
        row: start.row,
        column: u32::MAX,
    });
    let end_row = (end.row.saturating_sub(1) as usize).clamp(start_row, lines.len() - 1);

    let mut out = String::new();
    for (row, line) in lines.iter().enumerate().take(end_row + 1).skip(start_row) {
        let from = if row == start_row {
            start.column.saturating_sub(1) as usize
        } else {
            0
        };
        let to = if row == end_row {
            end.column.saturating_sub(1) as usize
        } else {
            usize::MAX
        };

        if row != start_row {
            out.push('\n');
        }
        out.extend(line.chars().skip(from).take(to.saturating_sub(from)));
    }
    out
}
