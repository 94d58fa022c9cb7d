//! Parsers for unstructured stage output.
//!
//! None of these parsers can fail. Each one has an explicit degrade path so
//! the pipeline always reaches a final response:
//!
//! - classification without a known prefix is treated as a subject question
//! - analysis without a `Topic:` line leaves the topic empty
//! - explanation without both markers keeps the whole text as explanation

use tracing::warn;

use crate::state::QuestionType;

/// Prefix marking a casual classification.
pub const CASUAL_PREFIX: &str = "casual|";

/// Prefix marking a subject classification.
pub const SUBJECT_PREFIX: &str = "subject|";

const TOPIC_MARKER: &str = "Topic:";
const EXPLANATION_MARKER: &str = "Explanation:";
const ANALOGY_MARKER: &str = "Analogy:";

/// Outcome of the classification stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Casual or subject. Never `Unclassified`.
    pub question_type: QuestionType,
    /// The ready-to-return reply when casual.
    pub reply: Option<String>,
}

/// Parses classification output by strict prefix.
///
/// # Examples
///
/// ```
/// use tutor_orchestrator::{parse::parse_classification, QuestionType};
///
/// let casual = parse_classification("  casual| Hi there! ");
/// assert_eq!(casual.question_type, QuestionType::Casual);
/// assert_eq!(casual.reply.as_deref(), Some("Hi there!"));
///
/// let garbage = parse_classification("I think this is about physics");
/// assert_eq!(garbage.question_type, QuestionType::Subject);
/// ```
#[must_use]
pub fn parse_classification(output: &str) -> Classification {
    let trimmed = output.trim();

    if let Some(reply) = trimmed.strip_prefix(CASUAL_PREFIX) {
        return Classification {
            question_type: QuestionType::Casual,
            reply: Some(reply.trim().to_string()),
        };
    }

    if !trimmed.starts_with(SUBJECT_PREFIX) {
        warn!(
            output_len = trimmed.len(),
            "Classification output had no known prefix; treating as subject"
        );
    }

    Classification {
        question_type: QuestionType::Subject,
        reply: None,
    }
}

/// Outcome of the analysis stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    /// The last line starting with `Topic:`, trimmed; empty when absent.
    pub topic: String,
    /// The last other non-empty line, trimmed.
    pub note: String,
}

/// Scans analysis output line by line; the latest match wins.
#[must_use]
pub fn parse_analysis(output: &str) -> Analysis {
    let mut analysis = Analysis::default();

    for line in output.lines().map(str::trim) {
        if line.starts_with(TOPIC_MARKER) {
            analysis.topic = line.to_string();
        } else if !line.is_empty() {
            analysis.note = line.to_string();
        }
    }

    if analysis.topic.is_empty() {
        warn!("Analysis output had no Topic: line; continuing with an empty topic");
    }

    analysis
}

/// Outcome of the explanation stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    /// Explanation text.
    pub explanation: String,
    /// Analogy text; empty when the markers were missing.
    pub analogy: String,
}

/// Splits explanation output on the `Analogy:` marker.
///
/// When either marker is missing the whole output is kept verbatim as the
/// explanation and the analogy stays empty.
#[must_use]
pub fn parse_explanation(output: &str) -> Explanation {
    if !(output.contains(EXPLANATION_MARKER) && output.contains(ANALOGY_MARKER)) {
        warn!("Explanation output lacked Explanation:/Analogy: markers; keeping it whole");
        return Explanation {
            explanation: output.to_string(),
            analogy: String::new(),
        };
    }

    let (before, after) = output.split_once(ANALOGY_MARKER).unwrap_or((output, ""));
    Explanation {
        explanation: before.replace(EXPLANATION_MARKER, "").trim().to_string(),
        analogy: after.trim().to_string(),
    }
}
