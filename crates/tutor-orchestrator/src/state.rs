//! Pipeline state types for the tutoring orchestrator.
//!
//! This module defines the stage graph and the record threaded through it.
//!
//! The graph is:
//!
//! ```text
//! Start -> Classify -+-> End                                          (casual)
//!                    +-> AnalyzeIdentify -> ExplainAnalogize -> Finalize -> End
//! ```
//!
//! Routing depends on nothing but [`QuestionType`]; see [`Stage::next`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Message;
use crate::subject::Subject;

// ============================================================================
// QuestionType
// ============================================================================

/// Classification of the student's message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Not yet classified.
    #[default]
    Unclassified,
    /// Greeting or small talk; answered directly by the classifier.
    Casual,
    /// A question about the subject; runs the full pipeline.
    Subject,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "unclassified"),
            Self::Casual => write!(f, "casual"),
            Self::Subject => write!(f, "subject"),
        }
    }
}

// ============================================================================
// Stage
// ============================================================================

/// A node of the tutoring pipeline.
///
/// Every stage between `Start` and `End` corresponds to exactly one
/// generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Entry point; performs no work.
    Start,
    /// Casual/subject classification.
    Classify,
    /// Confusion restatement and topic identification.
    AnalyzeIdentify,
    /// Explanation and analogy.
    ExplainAnalogize,
    /// Final formatted response.
    Finalize,
    /// Terminal node.
    End,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Classify => write!(f, "classify"),
            Self::AnalyzeIdentify => write!(f, "analyze_identify"),
            Self::ExplainAnalogize => write!(f, "explain_analogize"),
            Self::Finalize => write!(f, "finalize"),
            Self::End => write!(f, "end"),
        }
    }
}

impl Stage {
    /// Returns the stage that follows this one.
    ///
    /// The only conditional edge leaves `Classify`: casual questions go
    /// straight to `End`. An unclassified question after `Classify` takes the
    /// subject path. Returns `None` from `End`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::{QuestionType, Stage};
    ///
    /// assert_eq!(Stage::Classify.next(QuestionType::Casual), Some(Stage::End));
    /// assert_eq!(
    ///     Stage::Classify.next(QuestionType::Subject),
    ///     Some(Stage::AnalyzeIdentify)
    /// );
    /// assert_eq!(Stage::End.next(QuestionType::Subject), None);
    /// ```
    #[must_use]
    pub const fn next(self, question_type: QuestionType) -> Option<Self> {
        match (self, question_type) {
            (Self::Start, _) => Some(Self::Classify),
            (Self::Classify, QuestionType::Casual) => Some(Self::End),
            (Self::Classify, _) => Some(Self::AnalyzeIdentify),
            (Self::AnalyzeIdentify, _) => Some(Self::ExplainAnalogize),
            (Self::ExplainAnalogize, _) => Some(Self::Finalize),
            (Self::Finalize, _) => Some(Self::End),
            (Self::End, _) => None,
        }
    }

    /// Returns `true` if this stage makes a generation call.
    #[must_use]
    pub const fn calls_generator(self) -> bool {
        !matches!(self, Self::Start | Self::End)
    }

    /// Returns `true` for the terminal stage.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::End)
    }
}

// ============================================================================
// PipelineState
// ============================================================================

/// Mutable record threaded through one pipeline run.
///
/// Created fresh for every request and discarded afterwards; only the final
/// response outlives it, through the response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// The student's question as submitted.
    pub question: String,

    /// The normalized subject.
    pub subject: Subject,

    /// Classification result.
    pub question_type: QuestionType,

    /// `Topic: X | Subtopic: Y`, or empty.
    pub topic_identified: String,

    /// One-sentence restatement of the student's confusion.
    pub analysis_note: String,

    /// Step-by-step explanation.
    pub explanation: String,

    /// Real-world analogy.
    pub analogy: String,

    /// The reply returned to the student. Empty until classification
    /// short-circuits or `Finalize` completes.
    pub final_response: String,

    /// Messages accumulated for multi-turn context.
    pub conversation_trace: Vec<Message>,

    /// Stages entered so far, in order.
    pub visited: Vec<Stage>,

    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl PipelineState {
    /// Creates a fresh state at the start of a run.
    #[must_use]
    pub fn new(question: impl Into<String>, subject: Subject) -> Self {
        Self {
            question: question.into(),
            subject,
            question_type: QuestionType::Unclassified,
            topic_identified: String::new(),
            analysis_note: String::new(),
            explanation: String::new(),
            analogy: String::new(),
            final_response: String::new(),
            conversation_trace: Vec::new(),
            visited: vec![Stage::Start],
            started_at: Utc::now(),
        }
    }

    /// The stage most recently entered.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.visited.last().copied().unwrap_or(Stage::Start)
    }

    /// Records entry into a stage.
    pub fn enter(&mut self, stage: Stage) {
        self.visited.push(stage);
    }

    /// Returns `true` once `End` has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_stage().is_terminal()
    }

    /// Returns `true` if the run took the casual short-circuit.
    #[must_use]
    pub fn is_casual(&self) -> bool {
        self.question_type == QuestionType::Casual
    }

    /// Number of generation calls made so far.
    #[must_use]
    pub fn generation_calls(&self) -> usize {
        self.visited.iter().filter(|s| s.calls_generator()).count()
    }

    /// Returns the duration since the run started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// Tests
// ============================================================================
