//! Subjects and their static reference data.
//!
//! Each subject carries the examples block fed to the analysis stage and a
//! short list of sample questions shown to students.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the supported academic domains.
///
/// Unknown or empty input is coerced to [`Subject::Maths`] rather than
/// rejected; see [`Subject::from_input`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    /// Mathematics (default).
    #[default]
    Maths,
    /// Physics.
    Physics,
    /// Chemistry.
    Chemistry,
}

impl Subject {
    /// All supported subjects.
    pub const ALL: [Self; 3] = [Self::Maths, Self::Physics, Self::Chemistry];

    /// Normalizes free-form subject input.
    ///
    /// Input is trimmed and lower-cased. `maths`, `mathematics` and `math`
    /// select [`Subject::Maths`]; anything unrecognized also falls back to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::Subject;
    ///
    /// assert_eq!(Subject::from_input(" Physics "), Subject::Physics);
    /// assert_eq!(Subject::from_input("biology"), Subject::Maths);
    /// assert_eq!(Subject::from_input(""), Subject::Maths);
    /// ```
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "physics" => Self::Physics,
            "chemistry" => Self::Chemistry,
            _ => Self::Maths,
        }
    }

    /// Canonical lower-case name, as used in cache keys and URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Maths => "maths",
            Self::Physics => "physics",
            Self::Chemistry => "chemistry",
        }
    }

    /// Capitalized name used in prompts and banners.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Maths => "Maths",
            Self::Physics => "Physics",
            Self::Chemistry => "Chemistry",
        }
    }

    /// Topic/subtopic examples appended to the analysis prompt.
    #[must_use]
    pub const fn topic_examples(&self) -> &'static str {
        match self {
            Self::Maths => {
                "Examples:\n\
                 - Topic: Calculus | Subtopic: Derivatives\n\
                 - Topic: Algebra | Subtopic: Quadratic Equations\n\
                 - Topic: Geometry | Subtopic: Pythagorean Theorem"
            }
            Self::Physics => {
                "Examples:\n\
                 - Topic: Mechanics | Subtopic: Newton's Laws\n\
                 - Topic: Thermodynamics | Subtopic: Heat Transfer\n\
                 - Topic: Waves | Subtopic: Sound Waves"
            }
            Self::Chemistry => {
                "Examples:\n\
                 - Topic: Chemical Bonding | Subtopic: VSEPR Theory\n\
                 - Topic: Organic Chemistry | Subtopic: SN1/SN2 Reactions\n\
                 - Topic: Stoichiometry | Subtopic: Molarity Calculations"
            }
        }
    }

    /// Sample questions a student can start with.
    #[must_use]
    pub const fn sample_questions(&self) -> &'static [&'static str] {
        match self {
            Self::Maths => &[
                "What is a derivative and why is it useful?",
                "Can you explain the Pythagorean theorem with an example?",
                "What are imaginary numbers and where are they used?",
                "How does integration work? I don't get it.",
                "What's the difference between permutation and combination?",
            ],
            Self::Physics => &[
                "Why does a ball thrown upward come back down?",
                "What is electric current and how does it flow?",
                "Why do we feel hot when we rub our hands together?",
                "What makes a magnet attract iron?",
                "Why does light bend when it enters water?",
            ],
            Self::Chemistry => &[
                "What is a mole in chemistry and why is it important?",
                "Can you explain the difference between an ionic and a covalent bond?",
                "What is pH and how is it calculated?",
                "How does a catalyst work in a chemical reaction?",
                "What's the difference between an acid and a base?",
            ],
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
