#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use stenolens_client::{
    Analysis, AnalysisResult, ApiError, ApiErrorKind, ExplainApi, ExplainedBlock, Explanation,
};
use stenolens_core::{
    AnnotationProvider, HostEditor, LensConfig, LensContext, LensError, ManualClock,
};

pub const START: u64 = 1_700_000_000;

/// In-process stand-in for the explanation service.
#[derive(Default)]
pub struct FakeApi {
    pub analyze_calls: AtomicUsize,
    pub dry_run_calls: AtomicUsize,
    pub explain_calls: AtomicUsize,
    analysis: Mutex<Option<AnalysisResult>>,
    explanation: Mutex<Option<Result<Explanation, ApiError>>>,
    gate: Option<Gate>,
}

/// Holds `analyze` until released.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Gate::default()),
            ..Self::default()
        }
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("api is not gated")
    }

    pub fn respond(&self, result: AnalysisResult) {
        *self.analysis.lock() = Some(result);
    }

    pub fn respond_blocks(&self, blocks: Vec<ExplainedBlock>) {
        self.respond(Ok(Analysis {
            invocation_counter: 1,
            blocks,
        }));
    }

    pub fn fail(&self, kind: ApiErrorKind, message: &str) {
        self.respond(Err(ApiError::new(kind, message)));
    }

    pub fn respond_explanation(&self, result: Result<Explanation, ApiError>) {
        *self.explanation.lock() = Some(result);
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn dry_run_calls(&self) -> usize {
        self.dry_run_calls.load(Ordering::SeqCst)
    }

    pub fn explain_calls(&self) -> usize {
        self.explain_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplainApi for FakeApi {
    async fn analyze(
        &self,
        _api_key: &str,
        _source: &str,
        _language: &str,
        dry_run: bool,
    ) -> AnalysisResult {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if dry_run {
            self.dry_run_calls.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.analysis.lock().clone().unwrap_or_else(|| {
            Ok(Analysis {
                invocation_counter: 0,
                blocks: vec![],
            })
        })
    }

    async fn explain_fragment(
        &self,
        _api_key: &str,
        fragment: &str,
        _language: &str,
    ) -> Result<Explanation, ApiError> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        self.explanation.lock().clone().unwrap_or_else(|| {
            Ok(Explanation {
                text: format!("explains {fragment}"),
                code: fragment.to_string(),
            })
        })
    }
}

/// Host that records everything it is asked to do.
#[derive(Default)]
pub struct RecordingHost {
    pub errors: Mutex<Vec<LensError>>,
    pub infos: Mutex<Vec<String>>,
    pub changed: AtomicUsize,
    pub progress: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn errors(&self) -> Vec<LensError> {
        self.errors.lock().clone()
    }

    pub fn changed(&self) -> usize {
        self.changed.load(Ordering::SeqCst)
    }
}

impl HostEditor for RecordingHost {
    fn report_error(&self, error: &LensError) {
        self.errors.lock().push(error.clone());
    }

    fn show_info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn annotations_changed(&self) {
        self.changed.fetch_add(1, Ordering::SeqCst);
    }

    fn begin_progress(&self, key: &str, _title: &str) {
        self.progress.lock().push(format!("begin {key}"));
    }

    fn end_progress(&self, key: &str) {
        self.progress.lock().push(format!("end {key}"));
    }
}

pub fn block(row: u32, code: &str, explanation: &str) -> ExplainedBlock {
    ExplainedBlock {
        start_row: row,
        start_col: 1,
        code: code.to_string(),
        explanation: Some(explanation.to_string()),
    }
}

pub fn dry_block(row: u32, code: &str) -> ExplainedBlock {
    ExplainedBlock {
        start_row: row,
        start_col: 1,
        code: code.to_string(),
        explanation: None,
    }
}

pub fn test_config() -> LensConfig {
    LensConfig {
        api_key: Some("test-key".to_string()),
        persist: false,
        ..LensConfig::new()
    }
}

pub struct Harness {
    pub provider: AnnotationProvider,
    pub api: Arc<FakeApi>,
    pub host: Arc<RecordingHost>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(config: LensConfig, api: FakeApi) -> Self {
        let api = Arc::new(api);
        let host = Arc::new(RecordingHost::default());
        let clock = Arc::new(ManualClock::new(START));
        let ctx = LensContext::new(config, api.clone(), host.clone()).with_clock(clock.clone());
        Self {
            provider: AnnotationProvider::new(ctx),
            api,
            host,
            clock,
        }
    }

    pub fn with_api(api: FakeApi) -> Self {
        Self::new(test_config(), api)
    }
}
