//! Preparation chat: a single-pass tutor conversation about a writing task.
//!
//! Each turn is one backend call through the shared retry loop. The tutor may end its
//! answer with a `{"vocabulary": [...], "suggestions": [...]}` block, which is split
//! off the prose and returned separately.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::errors::{PipelineError, PipelineResult};
use crate::extract::{self, Split};
use crate::model::WritingTask;
use crate::providers::llm::{ModelCaller, ModelRequest};
use crate::retry::RetryExecutor;

/// Turns kept in the transcript and the prompt; older ones are dropped.
pub const MAX_HISTORY_TURNS: usize = 20;

const SYSTEM_PROMPT: &str = "\
You are a friendly writing tutor helping a candidate prepare for an academic writing test. \
Answer the learner's question directly and briefly. Do not write the essay for them.";

const PAYLOAD_INSTRUCTION: &str = "\
If useful vocabulary or concrete next steps come up, end your answer with a JSON block: \
{\"vocabulary\": [{\"word\": \"...\", \"meaning\": \"...\", \"example\": \"...\"}], \
\"suggestions\": [\"...\"]}. Otherwise answer in prose only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Learner,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub word: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TutorPayload {
    pub vocabulary: Vec<VocabularyItem>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TutorReply {
    pub text: String,
    pub payload: Option<TutorPayload>,
}

pub struct PrepTutor {
    client: Arc<dyn ModelCaller>,
    retry: RetryExecutor,
    task: Option<WritingTask>,
    language: String,
    transcript: Vec<ChatTurn>,
    exchanges: usize,
}

impl PrepTutor {
    pub fn new(client: Arc<dyn ModelCaller>, retry: RetryExecutor, language: impl Into<String>) -> Self {
        Self {
            client,
            retry,
            task: None,
            language: language.into(),
            transcript: Vec::new(),
            exchanges: 0,
        }
    }

    /// Anchor the conversation on a task the learner is preparing for.
    pub fn with_task(mut self, task: WritingTask) -> Self {
        self.task = Some(task);
        self
    }

    /// The most recent [`MAX_HISTORY_TURNS`] turns.
    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Send one learner message and record the exchange.
    ///
    /// Only the prose part of the answer enters the transcript. A failed call leaves
    /// the transcript unchanged.
    pub async fn send(&mut self, message: &str) -> PipelineResult<TutorReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(PipelineError::no_content_submitted()
                .with_detail("empty chat message"));
        }

        let request = ModelRequest::new(self.build_prompt(message)).with_system(SYSTEM_PROMPT);
        let span = info_span!("chat", turn = self.exchanges + 1);
        let raw = self
            .retry
            .run("chat", || self.client.complete(&request))
            .instrument(span)
            .await?;

        let Split { body, payload } = extract::split_payload::<TutorPayload>(&raw);
        if body.is_empty() && payload.is_none() {
            return Err(PipelineError::malformed_output("tutor returned an empty answer"));
        }
        debug!(
            chars = body.len(),
            has_payload = payload.is_some(),
            "tutor reply received"
        );

        self.transcript.push(ChatTurn {
            role: Role::Learner,
            text: message.to_string(),
        });
        self.transcript.push(ChatTurn {
            role: Role::Tutor,
            text: body.clone(),
        });
        let excess = self.transcript.len().saturating_sub(MAX_HISTORY_TURNS);
        self.transcript.drain(..excess);
        self.exchanges += 1;

        Ok(TutorReply {
            text: body,
            payload,
        })
    }

    fn build_prompt(&self, message: &str) -> String {
        let mut prompt = String::new();
        if let Some(task) = &self.task {
            prompt.push_str(&format!(
                "### Task the learner is preparing for\n<task_prompt>\n{}\n</task_prompt>\n\n",
                task.prompt.trim()
            ));
        }

        if !self.transcript.is_empty() {
            prompt.push_str("### Conversation so far\n");
            for turn in &self.transcript {
                let who = match turn.role {
                    Role::Learner => "Learner",
                    Role::Tutor => "Tutor",
                };
                prompt.push_str(&format!("{}: {}\n", who, turn.text));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "### Learner\n{}\n\n### Instructions\nReply in {}. {}",
            message, self.language, PAYLOAD_INSTRUCTION
        ));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        responses: Mutex<Vec<PipelineResult<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelCaller for ScriptedModel {
        async fn complete(&self, request: &ModelRequest) -> PipelineResult<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let mut resps = self.responses.lock().unwrap();
            if resps.is_empty() {
                return Err(PipelineError::unclassified("no more mock responses"));
            }
            resps.remove(0)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    fn tutor(responses: Vec<PipelineResult<String>>) -> (PrepTutor, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        });
        let tutor = PrepTutor::new(
            model.clone(),
            RetryExecutor::new(RetryPolicy {
                max_retries: 0,
                initial_delay_ms: 1,
            }),
            "English",
        );
        (tutor, model)
    }

    #[tokio::test]
    async fn splits_payload_and_keeps_prose_in_transcript() {
        let (mut tutor, _) = tutor(vec![Ok(
            "Use a concession clause.\n```json\n{\"vocabulary\": [{\"word\": \"albeit\", \"meaning\": \"although\"}], \"suggestions\": [\"Practise one concession per paragraph\"],}\n```"
                .to_string(),
        )]);

        let reply = tutor.send("How do I show the other side?").await.unwrap();
        assert_eq!(reply.text, "Use a concession clause.");
        let payload = reply.payload.unwrap();
        assert_eq!(payload.vocabulary[0].word, "albeit");
        assert_eq!(payload.suggestions.len(), 1);

        assert_eq!(tutor.transcript().len(), 2);
        assert_eq!(tutor.transcript()[1].text, "Use a concession clause.");
        assert!(!tutor.transcript()[1].text.contains("vocabulary"));
    }

    #[tokio::test]
    async fn prose_only_reply_has_no_payload() {
        let (mut tutor, model) = tutor(vec![
            Ok("Plan for five minutes first.".to_string()),
            Ok("Yes, four paragraphs is fine.".to_string()),
        ]);
        let first = tutor.send("Any tips?").await.unwrap();
        assert_eq!(first.payload, None);

        tutor.send("Is four paragraphs ok?").await.unwrap();
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("Learner: Any tips?"));
        assert!(prompts[1].contains("Tutor: Plan for five minutes first."));
    }

    #[tokio::test]
    async fn transcript_keeps_only_recent_turns() {
        let exchanges = MAX_HISTORY_TURNS / 2 + 3;
        let replies = (1..=exchanges).map(|i| Ok(format!("Answer {}.", i))).collect();
        let (mut tutor, model) = tutor(replies);

        for i in 1..=exchanges {
            tutor.send(&format!("Question {}?", i)).await.unwrap();
        }

        let transcript = tutor.transcript();
        assert_eq!(transcript.len(), MAX_HISTORY_TURNS);
        assert_eq!(transcript[0].role, Role::Learner);
        assert_eq!(transcript[0].text, "Question 4?");
        assert_eq!(transcript[MAX_HISTORY_TURNS - 1].text, format!("Answer {}.", exchanges));

        let prompts = model.prompts.lock().unwrap();
        let last = prompts.last().unwrap();
        assert!(!last.contains("Learner: Question 2?"));
        assert!(last.contains("Learner: Question 3?"));
    }

    #[tokio::test]
    async fn failed_turn_leaves_transcript_untouched() {
        let (mut tutor, _) = tutor(vec![Err(PipelineError::rate_limited(429, "mock", "busy"))]);
        let err = tutor.send("Hello").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimitExhausted);
        assert!(tutor.transcript().is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_a_call() {
        let (mut tutor, model) = tutor(Vec::new());
        let err = tutor.send("   ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoContentSubmitted);
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
