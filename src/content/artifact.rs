use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentType;

/// One headed block of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// Heading depth (1 for `#`, 2 for `##`, ...).
    pub level: u8,
    pub lines: Vec<String>,
}

/// A question/answer pair (flashcard front/back or quiz question/answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub prompt: String,
    pub answer: String,
}

/// Structured form of a generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBody {
    pub title: Option<String>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
    /// The raw text the structure was parsed from.
    pub text: String,
}

/// Per-dimension quality sub-scores, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub educational_effectiveness: f64,
    pub factual_accuracy: f64,
    pub readability: f64,
    pub structural_quality: f64,
    pub engagement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub composite: f64,
    pub dimensions: DimensionScores,
}

/// A scored, accepted piece of generated material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub content_type: ContentType,
    pub body: ArtifactBody,
    pub quality: QualityScores,
    /// Generation client calls consumed to produce this artifact.
    pub attempt_count: u32,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    pub fn new(
        content_type: ContentType,
        body: ArtifactBody,
        quality: QualityScores,
        attempt_count: u32,
    ) -> Self {
        Self {
            content_type,
            body,
            quality,
            attempt_count,
            generated_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.body.text
    }
}
