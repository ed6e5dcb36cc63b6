//! Request and response bodies of the explanation service.

use serde::{Deserialize, Serialize};

/// Options controlling the style of generated explanations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StenographyOptions {
    /// Target reader of the explanation (`pm`, `dev`, ...).
    pub audience: String,
    /// Attach related Stack Overflow answers.
    pub stackoverflow: bool,
    /// Ask the service to populate missing context.
    pub populate: bool,
}

impl Default for StenographyOptions {
    fn default() -> Self {
        Self {
            audience: "pm".to_string(),
            stackoverflow: false,
            populate: false,
        }
    }
}

/// Body of `POST /autopilot`.
#[derive(Debug, Serialize)]
pub struct AutopilotRequest<'a> {
    pub code: &'a str,
    pub api_key: &'a str,
    pub dry_run: bool,
    pub index_by_one: bool,
    pub add_import: bool,
    pub language: &'a str,
    pub stenography_options: &'a StenographyOptions,
}

/// Body of the single-fragment endpoint. The options are inlined.
#[derive(Debug, Serialize)]
pub struct ExplainRequest<'a> {
    pub code: &'a str,
    pub api_key: &'a str,
    pub language: &'a str,
    #[serde(flatten)]
    pub options: &'a StenographyOptions,
}

/// A 1-indexed row/column pair as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePosition {
    pub row: u32,
    pub column: u32,
}

/// Explanation payload for one code region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StenographyResult {
    /// The natural-language explanation.
    #[serde(default)]
    pub pm: String,
    /// The code the explanation was generated for.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One region identified by the autopilot endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Absent on dry runs.
    #[serde(default)]
    pub stenography_result: Option<StenographyResult>,
    pub start_position: WirePosition,
    #[serde(default)]
    pub end_position: Option<WirePosition>,
}

/// Error object. The service sends either `{ "message": ... }` or a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireError {
    Detailed { message: String },
    Plain(String),
}

impl WireError {
    pub fn message(&self) -> &str {
        match self {
            WireError::Detailed { message } => message,
            WireError::Plain(message) => message,
        }
    }
}

/// Response of `POST /autopilot`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutopilotResponse {
    #[serde(default)]
    pub invocation_counter: i64,
    #[serde(default)]
    pub code_blocks: Option<Vec<CodeBlock>>,
    #[serde(default)]
    pub error: Option<WireError>,
}

/// Response of the single-fragment endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainResponse {
    #[serde(flatten)]
    pub result: StenographyResult,
    #[serde(default)]
    pub error: Option<WireError>,
}
