//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tutor_orchestrator::{ChunkStream, LlmErrorKind, Message, Result, TextGenerator, TutorError};

/// Final answer produced for every subject question.
pub const FINAL_ANSWER: &str =
    "<h1>Kinematics</h1> <p>Velocity is how fast and in which direction.</p> <blockquote>Recap</blockquote>";

/// Reply produced for greetings.
pub const CASUAL_REPLY: &str = "Hello! Ready to learn something new?";

/// Answers each stage from the shape of its prompt and counts calls.
#[derive(Default)]
pub struct CannedGenerator {
    calls: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl CannedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before every answer.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fails every call with a server error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(prompt: &str) -> &'static str {
        if prompt.starts_with("Classify") {
            let greeting = ["Message: hi", "Message: hello", "Message: hey"]
                .iter()
                .any(|g| prompt.contains(&format!("{g}\n")));
            if greeting {
                "casual|Hello! Ready to learn something new?"
            } else {
                "subject|"
            }
        } else if prompt.starts_with("As an IIT") {
            "The student is unsure what velocity means.\nTopic: Kinematics | Subtopic: Velocity"
        } else if prompt.starts_with("The student asked") {
            "Explanation: Velocity is speed with direction.\nAnalogy: A car heading north at 60 km/h."
        } else {
            FINAL_ANSWER
        }
    }
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(TutorError::generation(LlmErrorKind::Server, "upstream 503"));
        }
        Ok(Self::answer(&messages[1].content).to_string())
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<ChunkStream> {
        let text = self.generate(messages).await?;
        let words: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(futures::stream::iter(words).boxed())
    }
}

/// Path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}
