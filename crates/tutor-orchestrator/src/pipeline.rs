//! The tutoring pipeline.
//!
//! [`Tutor`] drives a [`PipelineState`] through the stage graph defined by
//! [`Stage::next`], making one generation call per stage:
//!
//! 1. `Classify` labels the message casual or subject. Casual messages end
//!    here with the classifier's own friendly reply.
//! 2. `AnalyzeIdentify` restates the confusion and names topic/subtopic.
//! 3. `ExplainAnalogize` produces an explanation and a real-world analogy.
//! 4. `Finalize` composes the formatted answer.
//!
//! The response cache is consulted before any stage runs and written once a
//! run completes. Generation failures abort the run; no partial response is
//! ever returned or cached.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::error::{Result, TutorError};
use crate::llm::{ChunkStream, Message, TextGenerator};
use crate::parse::{parse_analysis, parse_classification, parse_explanation};
use crate::prompts;
use crate::state::{PipelineState, Stage};
use crate::subject::Subject;

/// Lazy sequence of response chunks returned by [`Tutor::run_stream`].
pub type ResponseStream = ChunkStream;

// ============================================================================
// Request / Response
// ============================================================================

/// A validated tutoring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutoringRequest {
    question: String,
    subject: Subject,
}

impl TutoringRequest {
    /// Validates raw input.
    ///
    /// The subject is normalized with [`Subject::from_input`], so anything
    /// unrecognized becomes maths.
    ///
    /// # Errors
    ///
    /// Returns [`TutorError::EmptyInput`] if the question is blank after
    /// trimming.
    pub fn new(question: impl Into<String>, subject: &str) -> Result<Self> {
        Self::with_subject(question, Subject::from_input(subject))
    }

    /// Validates a question for an already-normalized subject.
    pub fn with_subject(question: impl Into<String>, subject: Subject) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(TutorError::EmptyInput);
        }
        Ok(Self { question, subject })
    }

    /// The question as submitted.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The normalized subject.
    #[must_use]
    pub const fn subject(&self) -> Subject {
        self.subject
    }
}

/// Payload returned to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorResponse {
    /// The reply shown to the student.
    pub response: String,
}

/// Result of [`Tutor::run`].
#[derive(Debug, Clone)]
pub struct TutorOutcome {
    /// The reply shown to the student.
    pub response: String,
    /// `true` if the reply came from the response cache.
    pub cached: bool,
    /// Final pipeline state; `None` on a cache hit.
    pub state: Option<PipelineState>,
}

// ============================================================================
// Tutor
// ============================================================================

/// Runs tutoring requests through the staged pipeline.
///
/// Cheap to clone: the generator and cache are shared.
#[derive(Clone)]
pub struct Tutor {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<ResponseCache>,
    timeout: Option<Duration>,
}

impl Tutor {
    /// Creates a tutor with no bound on generation calls.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, cache: Arc<ResponseCache>) -> Self {
        Self {
            generator,
            cache,
            timeout: None,
        }
    }

    /// Bounds every generation call (and every wait for a streamed chunk).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The shared response cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Validates raw input and answers it.
    pub async fn run_pipeline(&self, question: &str, subject: &str) -> Result<TutorResponse> {
        let request = TutoringRequest::new(question, subject)?;
        let outcome = self.run(&request).await?;
        Ok(TutorResponse {
            response: outcome.response,
        })
    }

    /// Answers a request, consulting the cache first.
    pub async fn run(&self, request: &TutoringRequest) -> Result<TutorOutcome> {
        let subject = request.subject();

        if let Some(response) = self.cache.get(subject, request.question()) {
            info!(subject = %subject, "Cache hit; skipping pipeline");
            return Ok(TutorOutcome {
                response,
                cached: true,
                state: None,
            });
        }

        info!(subject = %subject, "Cache miss; running pipeline");
        let mut state = PipelineState::new(request.question(), subject);
        self.advance(&mut state, None).await?;

        self.cache
            .put(subject, request.question(), state.final_response.clone());

        info!(
            subject = %subject,
            question_type = %state.question_type,
            calls = state.generation_calls(),
            elapsed_ms = state.elapsed().num_milliseconds(),
            "Pipeline complete"
        );

        Ok(TutorOutcome {
            response: state.final_response.clone(),
            cached: false,
            state: Some(state),
        })
    }

    /// Answers a request as a lazy stream of chunks.
    ///
    /// Cache hits and casual replies arrive as a single chunk. Otherwise the
    /// intermediate stages run to completion first and the finalize stage is
    /// forwarded chunk by chunk. The full text is cached only after the
    /// stream ends without error.
    #[must_use]
    pub fn run_stream(&self, request: TutoringRequest) -> ResponseStream {
        let tutor = self.clone();

        let chunks = stream! {
            let subject = request.subject();

            if let Some(response) = tutor.cache.get(subject, request.question()) {
                info!(subject = %subject, "Cache hit; streaming cached response");
                yield Ok(response);
                return;
            }

            info!(subject = %subject, "Cache miss; running streaming pipeline");
            let mut state = PipelineState::new(request.question(), subject);
            if let Err(e) = tutor.advance(&mut state, Some(Stage::Finalize)).await {
                yield Err(e);
                return;
            }

            if state.is_complete() {
                tutor.cache.put(subject, request.question(), state.final_response.clone());
                yield Ok(state.final_response.clone());
                return;
            }

            state.enter(Stage::Finalize);
            let messages = finalize_messages(&state);
            let mut upstream = match tutor
                .bounded(Stage::Finalize, tutor.generator.generate_stream(&messages))
                .await
            {
                Ok(upstream) => upstream,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut full = String::new();
            loop {
                let next = tutor
                    .bounded(Stage::Finalize, async { upstream.next().await.transpose() })
                    .await;
                match next {
                    Ok(Some(chunk)) => {
                        full.push_str(&chunk);
                        yield Ok(chunk);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            state.final_response = full;
            state.enter(Stage::End);
            tutor.cache.put(subject, request.question(), state.final_response.clone());

            info!(
                subject = %subject,
                calls = state.generation_calls(),
                chars = state.final_response.len(),
                "Streaming pipeline complete"
            );
        };

        chunks.boxed()
    }

    /// Runs stages until `before` would be entered next, or the graph ends.
    async fn advance(&self, state: &mut PipelineState, before: Option<Stage>) -> Result<()> {
        let mut stage = state.current_stage();
        while let Some(next) = stage.next(state.question_type) {
            if Some(next) == before {
                break;
            }
            state.enter(next);
            self.step(next, state).await?;
            stage = next;
        }
        Ok(())
    }

    /// Executes a single stage against the state.
    async fn step(&self, stage: Stage, state: &mut PipelineState) -> Result<()> {
        match stage {
            Stage::Start | Stage::End => {}
            Stage::Classify => {
                let messages = prompts::classify_messages(state.subject, &state.question);
                let output = self.call(stage, &messages).await?;
                let classification = parse_classification(&output);
                state.question_type = classification.question_type;
                if let Some(reply) = classification.reply {
                    state.final_response = reply;
                }
            }
            Stage::AnalyzeIdentify => {
                let messages = prompts::analyze_messages(state.subject, &state.question);
                let output = self.call(stage, &messages).await?;
                let analysis = parse_analysis(&output);
                state.topic_identified = analysis.topic;
                state.analysis_note = analysis.note;
                state.conversation_trace = messages;
                state.conversation_trace.push(Message::assistant(output));
            }
            Stage::ExplainAnalogize => {
                let messages = prompts::explain_messages(
                    state.subject,
                    &state.question,
                    &state.topic_identified,
                );
                let output = self.call(stage, &messages).await?;
                let parsed = parse_explanation(&output);
                state.explanation = parsed.explanation;
                state.analogy = parsed.analogy;
            }
            Stage::Finalize => {
                let messages = finalize_messages(state);
                state.final_response = self.call(stage, &messages).await?;
            }
        }
        Ok(())
    }

    /// One blocking generation call for a stage.
    async fn call(&self, stage: Stage, messages: &[Message]) -> Result<String> {
        debug!(stage = %stage, "Calling generator");
        let output = self
            .bounded(stage, self.generator.generate(messages))
            .await?;
        debug!(stage = %stage, chars = output.len(), "Stage output received");
        Ok(output)
    }

    /// Applies the configured timeout to a generation future.
    async fn bounded<T>(&self, stage: Stage, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(TutorError::generation_timeout(stage, limit))),
            None => fut.await,
        }
    }
}

impl fmt::Debug for Tutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tutor")
            .field("cache", &self.cache.stats())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn finalize_messages(state: &PipelineState) -> Vec<Message> {
    prompts::finalize_messages(
        state.subject,
        &state.question,
        &state.topic_identified,
        &state.explanation,
        &state.analogy,
    )
}
