//! First pass: find localized errors, no scores.

mod prompt;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::errors::PipelineResult;
use crate::extract;
use crate::model::{Criterion, Finding, FindingSource, TaskNumber, WritingTask};
use crate::providers::llm::{ModelCaller, ModelRequest};
use crate::retry::RetryExecutor;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFinding {
    original_span: String,
    #[serde(default)]
    improved_span: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    criterion: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EditorOutput {
    Wrapped { findings: Vec<RawFinding> },
    Bare(Vec<RawFinding>),
}

impl EditorOutput {
    fn into_findings(self) -> Vec<RawFinding> {
        match self {
            Self::Wrapped { findings } | Self::Bare(findings) => findings,
        }
    }
}

#[derive(Clone)]
pub struct EditorPass {
    client: Arc<dyn ModelCaller>,
    retry: RetryExecutor,
}

impl EditorPass {
    pub fn new(client: Arc<dyn ModelCaller>, retry: RetryExecutor) -> Self {
        Self { client, retry }
    }

    /// Findings for one essay, numbered `imp-1`, `imp-2`, ... in model order.
    ///
    /// Ids coming from the model are discarded. They are only unique within this
    /// call; the orchestrator namespaces them per task.
    pub async fn run(
        &self,
        task: &WritingTask,
        essay: &str,
        task_number: TaskNumber,
    ) -> PipelineResult<Vec<Finding>> {
        let span = info_span!("pass", task = task_number.as_u8(), pass = "editor");
        async move {
            let request = ModelRequest::new(prompt::build_prompt(task, essay, task_number))
                .with_system(prompt::SYSTEM_PROMPT)
                .with_schema(prompt::response_schema(task_number));

            let raw = self
                .retry
                .run("editor", || self.client.complete(&request))
                .await?;
            debug!(chars = raw.len(), "editor response received");

            let parsed: EditorOutput = extract::extract(&raw)?;
            let findings = number_findings(parsed.into_findings(), task_number);
            info!(findings = findings.len(), "editor pass complete");
            Ok(findings)
        }
        .instrument(span)
        .await
    }
}

fn number_findings(raw: Vec<RawFinding>, task_number: TaskNumber) -> Vec<Finding> {
    raw.into_iter()
        .filter_map(|f| match Criterion::for_task(&f.criterion, task_number) {
            Some(criterion) => Some((f, criterion)),
            None => {
                warn!(
                    task = task_number.as_u8(),
                    criterion = %f.criterion,
                    span = %f.original_span,
                    "dropping finding with unknown criterion"
                );
                None
            }
        })
        .enumerate()
        .map(|(i, (f, criterion))| Finding {
            id: format!("imp-{}", i + 1),
            task_number,
            original_span: f.original_span.trim().to_string(),
            improved_span: f.improved_span.trim().to_string(),
            explanation: f.explanation.trim().to_string(),
            criterion,
            source: FindingSource::Ai,
        })
        .collect()
}
