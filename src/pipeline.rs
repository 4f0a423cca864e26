//! Pipeline orchestration.
//!
//! One fixed, linear run per customer request: redact, classify, execute,
//! render. Each stage is a pure step over [`PipelineState`], adding or
//! replacing its own fields and leaving the rest untouched; the orchestrator
//! only sequences the stages, it never inspects intermediate values. Any
//! stage failure terminates the run with a stage-tagged error and no reply.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::actions::{self, ExecuteError};
use crate::bundle::{merge_bundles, Bundle};
use crate::cryptor::{Cryptor, CryptorError};
use crate::intent::{self, ClassifyError, Intent};
use crate::model::Model;
use crate::render::{self, RenderError};
use crate::store::OrderStore;

/// Everything a single run accumulates, stage by stage.
///
/// `raw_input` is consumed by the redaction stage and never travels further:
/// every later stage works on `redacted_input` only.
#[derive(Debug, Clone, Default)]
struct PipelineState {
    raw_input: String,
    redacted_input: Option<String>,
    bundles: Vec<Bundle>,
    tenant_id: Option<String>,
    action: Option<Intent>,
    action_result: Option<Value>,
    agent_draft: Option<String>,
    final_reply: Option<String>,
}

impl PipelineState {
    fn new(raw_input: &str) -> Self {
        Self {
            raw_input: raw_input.to_owned(),
            ..Self::default()
        }
    }
}

/// The finished product of a run.
#[derive(Debug, Clone)]
pub struct AgentReply {
    /// Model draft with placeholders intact. Operator diagnostics only,
    /// never shown to the customer.
    pub draft: String,
    /// Decrypted reply for the customer.
    pub reply: String,
}

/// A failed run, tagged with the stage that gave up.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// PII detection or encryption failed at ingress.
    #[error("redaction failed: {0}")]
    Redact(#[from] CryptorError),
    /// The model's intent output was unusable.
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
    /// The business action could not run.
    #[error("business action failed: {0}")]
    Execute(#[from] ExecuteError),
    /// Drafting or final decryption of the reply failed.
    #[error("reply rendering failed: {0}")]
    Render(#[from] RenderError),
    /// A stage ran without its prerequisite state. A bug, not a degraded
    /// path; surfaced distinctly so operators can tell the two apart.
    #[error("pipeline invariant broken: {0}")]
    Internal(&'static str),
}

impl PipelineError {
    /// True for broken invariants, false for the expected failure modes.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// The four-stage agent pipeline.
pub struct Pipeline {
    cryptor: Arc<dyn Cryptor>,
    model: Arc<dyn Model>,
    store: Arc<RwLock<OrderStore>>,
}

impl Pipeline {
    /// Assemble a pipeline over its three collaborators.
    pub fn new(
        cryptor: Arc<dyn Cryptor>,
        model: Arc<dyn Model>,
        store: Arc<RwLock<OrderStore>>,
    ) -> Self {
        Self {
            cryptor,
            model,
            store,
        }
    }

    /// Run one customer request through all four stages.
    ///
    /// Returns the placeholder draft alongside the decrypted reply; callers
    /// must only ever show the customer the latter.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] tagged with the failing stage. A failed run
    /// produces no reply and is only retriable by resubmitting in full.
    pub async fn process(&self, raw_input: &str) -> Result<AgentReply, PipelineError> {
        let started = std::time::Instant::now();
        info!(chars = raw_input.len(), "pipeline run started");

        let state = PipelineState::new(raw_input);
        let state = self.redact(state).await?;
        let state = self.classify(state).await?;
        let state = self.execute(state).await?;
        let state = self.render(state).await?;

        let draft = state
            .agent_draft
            .ok_or(PipelineError::Internal("render produced no draft"))?;
        let reply = state
            .final_reply
            .ok_or(PipelineError::Internal("render produced no reply"))?;

        info!(
            elapsed_ms = started.elapsed().as_millis(),
            "pipeline run complete"
        );
        Ok(AgentReply { draft, reply })
    }

    /// Stage 1: swap PII for placeholders before anything else sees the text.
    async fn redact(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let started = std::time::Instant::now();
        let redaction = match self.cryptor.detect_encrypt(&state.raw_input).await {
            Ok(redaction) => redaction,
            Err(e) => {
                error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis(),
                    "input redaction failed"
                );
                return Err(e.into());
            }
        };
        info!(
            bundles = redaction.bundles.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "input redacted"
        );

        state.redacted_input = Some(redaction.text_with_placeholders);
        state.bundles = redaction.bundles;
        state.tenant_id = Some(redaction.tenant_id);
        Ok(state)
    }

    /// Stage 2: pick the business action from the redacted text.
    async fn classify(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let redacted = state
            .redacted_input
            .as_deref()
            .ok_or(PipelineError::Internal("classify ran before redact"))?;
        let action = intent::classify(self.model.as_ref(), redacted).await?;
        state.action = Some(action);
        Ok(state)
    }

    /// Stage 3: run the action, then fold any stored bundles it surfaced
    /// into the pipeline's bundle set.
    async fn execute(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let action = state
            .action
            .clone()
            .ok_or(PipelineError::Internal("execute ran before classify"))?;
        let action_name = action.name();

        let started = std::time::Instant::now();
        let outcome = match actions::execute(&self.store, action, &state.bundles).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    action = action_name,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis(),
                    "action failed"
                );
                return Err(e.into());
            }
        };

        let upstream = std::mem::take(&mut state.bundles);
        state.bundles = merge_bundles(upstream, outcome.discovered_bundles);
        state.action_result = Some(outcome.result);

        info!(
            action = action_name,
            bundles = state.bundles.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "action executed"
        );
        Ok(state)
    }

    /// Stage 4: draft the reply and decrypt it for the customer.
    async fn render(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let redacted = state
            .redacted_input
            .as_deref()
            .ok_or(PipelineError::Internal("render ran before redact"))?;
        let tenant_id = state
            .tenant_id
            .as_deref()
            .ok_or(PipelineError::Internal("render ran before redact"))?;
        let action_result = state
            .action_result
            .as_ref()
            .ok_or(PipelineError::Internal("render ran before execute"))?;

        let rendered = render::render(
            self.model.as_ref(),
            self.cryptor.as_ref(),
            tenant_id,
            redacted,
            action_result,
            &state.bundles,
        )
        .await?;

        state.agent_draft = Some(rendered.draft);
        state.final_reply = Some(rendered.reply);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptor::Redaction;
    use crate::model::ModelError;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RefusingCryptor;

    #[async_trait]
    impl Cryptor for RefusingCryptor {
        async fn detect_encrypt(&self, _text: &str) -> Result<Redaction, CryptorError> {
            Err(CryptorError::Decode("stubbed ingress failure".to_owned()))
        }

        async fn decrypt(
            &self,
            _tenant_id: &str,
            _text: &str,
            _bundles: &[Bundle],
        ) -> Result<String, CryptorError> {
            unreachable!("decrypt must not run when ingress fails")
        }
    }

    struct CountingModel(AtomicUsize);

    #[async_trait]
    impl Model for CountingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    struct PlainCryptor;

    #[async_trait]
    impl Cryptor for PlainCryptor {
        async fn detect_encrypt(&self, text: &str) -> Result<Redaction, CryptorError> {
            Ok(Redaction {
                text_with_placeholders: text.to_owned(),
                bundles: Vec::new(),
                tenant_id: "tenant-test".to_owned(),
            })
        }

        async fn decrypt(
            &self,
            _tenant_id: &str,
            text: &str,
            _bundles: &[Bundle],
        ) -> Result<String, CryptorError> {
            Ok(text.to_owned())
        }
    }

    struct CreateModel;

    #[async_trait]
    impl Model for CreateModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Ok(r#"{"action": "create_order", "customer": "[PERSON_1]", "items": "roses"}"#
                .to_owned())
        }
    }

    /// Shared buffer for capturing log output in tests.
    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl SharedBuf {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Cursor::new(Vec::new()))))
        }

        fn contents(&self) -> String {
            let cursor = self.0.lock().expect("test lock");
            String::from_utf8_lossy(cursor.get_ref()).to_string()
        }
    }

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("test lock").write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().expect("test lock").flush()
        }
    }

    fn capture_logs(buf: &SharedBuf) -> tracing::subscriber::DefaultGuard {
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn temp_store(dir: &tempfile::TempDir) -> Arc<RwLock<OrderStore>> {
        Arc::new(RwLock::new(OrderStore::load(
            &dir.path().join("orders_db.json"),
            &dir.path().join("bundles_db.json"),
        )))
    }

    #[tokio::test]
    async fn test_redaction_failure_aborts_before_model_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = Arc::new(CountingModel(AtomicUsize::new(0)));
        let pipeline = Pipeline::new(Arc::new(RefusingCryptor), model.clone(), temp_store(&dir));

        let err = pipeline
            .process("Show order ORD-001")
            .await
            .expect_err("must fail");

        assert!(matches!(err, PipelineError::Redact(_)));
        assert!(!err.is_unexpected());
        assert_eq!(model.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stage_without_prerequisite_is_internal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = Pipeline::new(
            Arc::new(RefusingCryptor),
            Arc::new(CountingModel(AtomicUsize::new(0))),
            temp_store(&dir),
        );

        let err = pipeline
            .classify(PipelineState::new("hello"))
            .await
            .expect_err("must fail");

        assert!(matches!(err, PipelineError::Internal(_)));
        assert!(err.is_unexpected());
    }

    #[tokio::test]
    async fn test_failed_redaction_still_logs_call_timing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = Pipeline::new(
            Arc::new(RefusingCryptor),
            Arc::new(CountingModel(AtomicUsize::new(0))),
            temp_store(&dir),
        );

        let buf = SharedBuf::new();
        let _guard = capture_logs(&buf);
        pipeline
            .process("Show order ORD-001")
            .await
            .expect_err("must fail");

        let log = buf.contents();
        let line = log
            .lines()
            .find(|line| line.contains("input redaction failed"))
            .expect("redaction failure line");
        assert!(line.contains("elapsed_ms"));
    }

    #[tokio::test]
    async fn test_failed_action_still_logs_call_timing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        let store = Arc::new(RwLock::new(OrderStore::load(
            &missing.join("orders_db.json"),
            &missing.join("bundles_db.json"),
        )));
        let pipeline = Pipeline::new(Arc::new(PlainCryptor), Arc::new(CreateModel), store);

        let buf = SharedBuf::new();
        let _guard = capture_logs(&buf);
        let err = pipeline
            .process("Create an order for roses")
            .await
            .expect_err("must fail");

        assert!(matches!(err, PipelineError::Execute(_)));
        let log = buf.contents();
        let line = log
            .lines()
            .find(|line| line.contains("action failed"))
            .expect("action failure line");
        assert!(line.contains("elapsed_ms"));
    }
}
