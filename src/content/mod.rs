//! The fixed vocabulary of the pipeline: what can be generated and for whom.

mod artifact;
mod parser;

pub use artifact::{ArtifactBody, Card, DimensionScores, GeneratedArtifact, QualityScores, Section};
pub use parser::parse;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The nine content types: the master outline plus eight derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Outline,
    StudyGuide,
    Flashcards,
    Quiz,
    LessonPlan,
    SlideDeck,
    Worksheet,
    PodcastScript,
    Summary,
}

impl ContentType {
    pub const ALL: [ContentType; 9] = [
        ContentType::Outline,
        ContentType::StudyGuide,
        ContentType::Flashcards,
        ContentType::Quiz,
        ContentType::LessonPlan,
        ContentType::SlideDeck,
        ContentType::Worksheet,
        ContentType::PodcastScript,
        ContentType::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Outline => "outline",
            ContentType::StudyGuide => "study_guide",
            ContentType::Flashcards => "flashcards",
            ContentType::Quiz => "quiz",
            ContentType::LessonPlan => "lesson_plan",
            ContentType::SlideDeck => "slide_deck",
            ContentType::Worksheet => "worksheet",
            ContentType::PodcastScript => "podcast_script",
            ContentType::Summary => "summary",
        }
    }

    pub fn is_derivative(&self) -> bool {
        !matches!(self, ContentType::Outline)
    }

    /// Types whose body is a list of question/answer cards rather than prose.
    pub fn is_card_based(&self) -> bool {
        matches!(self, ContentType::Flashcards | ContentType::Quiz)
    }

    /// Token budget handed to the generation client.
    pub fn max_tokens(&self) -> u32 {
        match self {
            ContentType::Outline => 2048,
            ContentType::Flashcards | ContentType::Quiz => 3072,
            ContentType::Summary => 1024,
            ContentType::PodcastScript | ContentType::LessonPlan => 4096,
            ContentType::StudyGuide | ContentType::SlideDeck | ContentType::Worksheet => 3072,
        }
    }

    /// Section keywords the structural parser and the structural-quality
    /// dimension look for in headings.
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            ContentType::Outline => &["objectives", "overview", "key concepts", "summary"],
            ContentType::StudyGuide => &["objectives", "key concepts", "examples", "review"],
            ContentType::Flashcards => &[],
            ContentType::Quiz => &[],
            ContentType::LessonPlan => &["objectives", "materials", "activities", "assessment"],
            ContentType::SlideDeck => &["slide"],
            ContentType::Worksheet => &["instructions", "exercises", "answer key"],
            ContentType::PodcastScript => &["intro", "segment", "outro"],
            ContentType::Summary => &["summary", "key takeaways"],
        }
    }

    /// Minimum number of cards a card-based type needs to be structurally complete.
    pub fn min_cards(&self) -> usize {
        match self {
            ContentType::Flashcards => 6,
            ContentType::Quiz => 5,
            _ => 0,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ContentType::ALL
            .into_iter()
            .find(|ct| ct.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownContentType(s.to_string()))
    }
}

/// Target audience tag for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Elementary,
    MiddleSchool,
    HighSchool,
    Undergraduate,
    Graduate,
    Professional,
}

impl Audience {
    pub const ALL: [Audience; 6] = [
        Audience::Elementary,
        Audience::MiddleSchool,
        Audience::HighSchool,
        Audience::Undergraduate,
        Audience::Graduate,
        Audience::Professional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Elementary => "elementary",
            Audience::MiddleSchool => "middle_school",
            Audience::HighSchool => "high_school",
            Audience::Undergraduate => "undergraduate",
            Audience::Graduate => "graduate",
            Audience::Professional => "professional",
        }
    }

    /// Acceptable Flesch-Kincaid grade band, inclusive.
    pub fn grade_band(&self) -> (f64, f64) {
        match self {
            Audience::Elementary => (1.0, 5.0),
            Audience::MiddleSchool => (4.0, 9.0),
            Audience::HighSchool => (7.0, 12.0),
            Audience::Undergraduate => (10.0, 16.0),
            Audience::Graduate => (12.0, 20.0),
            Audience::Professional => (9.0, 18.0),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Audience::Elementary => "elementary school students (ages 6-10)",
            Audience::MiddleSchool => "middle school students (ages 11-14)",
            Audience::HighSchool => "high school students (ages 14-18)",
            Audience::Undergraduate => "undergraduate university students",
            Audience::Graduate => "graduate students",
            Audience::Professional => "working professionals",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Audience {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Audience::ALL
            .into_iter()
            .find(|a| a.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownAudience(s.to_string()))
    }
}
