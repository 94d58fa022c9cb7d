//! Prompt templates and per-stage message composition.
//!
//! Every stage sends exactly two messages: the subject persona as a system
//! message, then the stage template filled in as a user message. Templates
//! are immutable; rendering always produces a new string.

use crate::llm::Message;
use crate::subject::Subject;

/// A text blueprint with `{name}` substitution slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate(&'static str);

impl PromptTemplate {
    /// Wraps a static template string.
    #[must_use]
    pub const fn new(text: &'static str) -> Self {
        Self(text)
    }

    /// Returns the raw template text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Fills the named slots in a single pass.
    ///
    /// Substituted values are never rescanned, so a student question that
    /// itself contains `{topic}` is copied through untouched. Slots without a
    /// value are left as written.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::PromptTemplate;
    ///
    /// let template = PromptTemplate::new("Topic: {topic} ({missing})");
    /// assert_eq!(
    ///     template.render(&[("topic", "Optics {topic}")]),
    ///     "Topic: Optics {topic} ({missing})"
    /// );
    /// ```
    #[must_use]
    pub fn render(&self, slots: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                slots
                    .iter()
                    .find(|(slot, _)| *slot == name)
                    .map(|(_, value)| (*value, close))
            });

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Subject persona, sent as the system message of every stage.
pub const SYSTEM_PROMPT: PromptTemplate = PromptTemplate::new(
    "You are an expert IIT JEE {subject} teacher with 15+ years of experience.
Your specialty is explaining complex {subject} concepts in the simplest possible way
using real-world analogies that beginners can easily understand.

Your teaching approach:
1. Always identify the core {subject} concept first
2. Break down complex ideas into bite-sized pieces
3. Use everyday analogies and examples
4. Avoid heavy mathematical jargon initially
5. Build confidence in students
6. Connect abstract concepts to familiar experiences",
);

/// Casual/subject classification. A casual reply is produced in the same call.
pub const CLASSIFY_PROMPT: PromptTemplate = PromptTemplate::new(
    "Classify the message as either 'casual' (greeting, small talk) or 'subject' (about Physics, Chemistry, or Mathematics).
If casual, reply with a natural, friendly response. If subject, reply only with 'subject'.

Message: {question}

Reply format: <type>|<reply>
Examples:
hi
casual|Hi there! How are you today?
how's it going?
casual|I'm doing well, thanks for asking! How can I help you?
What is Newton's second law?
subject|",
);

/// Confusion restatement plus topic identification.
pub const ANALYZE_PROMPT: PromptTemplate = PromptTemplate::new(
    "As an IIT {subject} teacher, analyze this student's question and identify the main topic and subtopic.
Question: {question}

1. What is the student really asking? What concept are they struggling with? Respond in one clear sentence.
2. Identify the main topic and subtopic. Format: Topic: [Main Topic] | Subtopic: [Specific Concept]
{examples}",
);

/// Step-by-step explanation plus a real-world analogy.
pub const EXPLAIN_PROMPT: PromptTemplate = PromptTemplate::new(
    "The student asked: '{question}'
Topic identified: {topic}

Create a simple, step-by-step explanation that a beginner can understand, and then provide a memorable real-world analogy to clarify the concept.

Format your response as:
Explanation: <your explanation>
Analogy: <your analogy>",
);

/// Final composition with structural markup conventions.
pub const FINALIZE_PROMPT: PromptTemplate = PromptTemplate::new(
    "Combine all elements into a final HTML response for the student:

Original Question: \"{question}\"
Topic: {topic}
Explanation: {explanation}
Analogy: {analogy}

- Acknowledge the question warmly
- Integrate explanation and analogy smoothly
- End with encouragement and a quick recap
- Ask if they want to explore more

Format using HTML: <h1> for topic, <h2> for sections, <b> for key terms, <ul>/<ol> for lists, <blockquote> for takeaways.",
);

// ============================================================================
// Stage composition
// ============================================================================

/// Renders the persona system prompt for a subject.
#[must_use]
pub fn system_prompt(subject: Subject) -> String {
    SYSTEM_PROMPT.render(&[("subject", subject.display_name())])
}

fn stage_messages(subject: Subject, user_prompt: String) -> Vec<Message> {
    vec![Message::system(system_prompt(subject)), Message::user(user_prompt)]
}

/// Messages for the classification stage.
#[must_use]
pub fn classify_messages(subject: Subject, question: &str) -> Vec<Message> {
    stage_messages(subject, CLASSIFY_PROMPT.render(&[("question", question)]))
}

/// Messages for the analysis/topic-identification stage.
#[must_use]
pub fn analyze_messages(subject: Subject, question: &str) -> Vec<Message> {
    let prompt = ANALYZE_PROMPT.render(&[
        ("subject", subject.as_str()),
        ("question", question),
        ("examples", subject.topic_examples()),
    ]);
    stage_messages(subject, prompt)
}

/// Messages for the explanation/analogy stage.
#[must_use]
pub fn explain_messages(subject: Subject, question: &str, topic: &str) -> Vec<Message> {
    let prompt = EXPLAIN_PROMPT.render(&[("question", question), ("topic", topic)]);
    stage_messages(subject, prompt)
}

/// Messages for the finalize stage.
#[must_use]
pub fn finalize_messages(
    subject: Subject,
    question: &str,
    topic: &str,
    explanation: &str,
    analogy: &str,
) -> Vec<Message> {
    let prompt = FINALIZE_PROMPT.render(&[
        ("question", question),
        ("topic", topic),
        ("explanation", explanation),
        ("analogy", analogy),
    ]);
    stage_messages(subject, prompt)
}
