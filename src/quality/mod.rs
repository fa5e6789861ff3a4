//! Pedagogical quality scoring.
//!
//! [`HeuristicAssessor`] scores a generated text along five dimensions and
//! reports the weakest ones as [`Deficiency`] entries. [`QualityGate`] decides
//! whether a score is good enough to keep.

pub mod heuristics;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::{self, Audience, ContentType, DimensionScores, QualityScores};
use heuristics::TextStats;

/// Sub-scores below this are reported as deficiencies.
pub const DEFICIENCY_CUTOFF: f64 = 0.70;
pub const DEFAULT_THRESHOLD: f64 = 0.70;
pub const DEFAULT_FACTUAL_FLOOR: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    EducationalEffectiveness,
    FactualAccuracy,
    Readability,
    StructuralQuality,
    Engagement,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::EducationalEffectiveness => "educational effectiveness",
            Dimension::FactualAccuracy => "factual accuracy",
            Dimension::Readability => "readability",
            Dimension::StructuralQuality => "structural quality",
            Dimension::Engagement => "engagement",
        };
        f.write_str(name)
    }
}

/// Relative weight of each dimension in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub educational_effectiveness: f64,
    pub factual_accuracy: f64,
    pub readability: f64,
    pub structural_quality: f64,
    pub engagement: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            educational_effectiveness: 0.30,
            factual_accuracy: 0.25,
            readability: 0.15,
            structural_quality: 0.15,
            engagement: 0.15,
        }
    }
}

impl Weights {
    /// Built-in weights for a content type. Card decks lean on structure; the
    /// outline is a reference document, so it carries no engagement weight.
    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Outline => Self {
                educational_effectiveness: 0.20,
                factual_accuracy: 0.35,
                readability: 0.10,
                structural_quality: 0.35,
                engagement: 0.0,
            },
            ct if ct.is_card_based() => Self {
                educational_effectiveness: 0.25,
                factual_accuracy: 0.25,
                readability: 0.10,
                structural_quality: 0.25,
                engagement: 0.15,
            },
            _ => Self::default(),
        }
    }

    /// Scale so the weights sum to 1.0. All-zero weights fall back to the default.
    pub fn normalized(self) -> Self {
        let sum = self.educational_effectiveness
            + self.factual_accuracy
            + self.readability
            + self.structural_quality
            + self.engagement;
        if sum <= f64::EPSILON {
            return Self::default();
        }
        Self {
            educational_effectiveness: self.educational_effectiveness / sum,
            factual_accuracy: self.factual_accuracy / sum,
            readability: self.readability / sum,
            structural_quality: self.structural_quality / sum,
            engagement: self.engagement / sum,
        }
    }

    pub fn composite(&self, d: &DimensionScores) -> f64 {
        let score = self.educational_effectiveness * d.educational_effectiveness
            + self.factual_accuracy * d.factual_accuracy
            + self.readability * d.readability
            + self.structural_quality * d.structural_quality
            + self.engagement * d.engagement;
        score.clamp(0.0, 1.0)
    }
}

/// A weak dimension plus what to do about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deficiency {
    pub dimension: Dimension,
    pub score: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub scores: QualityScores,
    /// Lowest-scoring dimension first.
    pub deficiencies: Vec<Deficiency>,
}

impl QualityReport {
    /// Corrective guidance for the next generation attempt.
    pub fn guidance(&self) -> String {
        if self.deficiencies.is_empty() {
            return String::new();
        }
        let mut out = String::from("The previous draft was rejected. Fix these weaknesses:\n");
        for d in &self.deficiencies {
            out.push_str(&format!("- {} ({:.2}): {}\n", d.dimension, d.score, d.description));
        }
        out
    }
}

/// Scores generated text. Implementations must be deterministic and free of
/// side effects.
pub trait Assessor: Send + Sync {
    fn assess(&self, text: &str, content_type: ContentType, audience: Audience) -> QualityReport;
}

/// Rule-based assessor built on marker tables and the Flesch-Kincaid formula.
#[derive(Debug, Clone)]
pub struct HeuristicAssessor {
    weights: BTreeMap<ContentType, Weights>,
    factual_floor: f64,
}

impl Default for HeuristicAssessor {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            factual_floor: DEFAULT_FACTUAL_FLOOR,
        }
    }
}

impl HeuristicAssessor {
    pub fn new(weights: BTreeMap<ContentType, Weights>, factual_floor: f64) -> Self {
        Self {
            weights,
            factual_floor,
        }
    }

    pub fn weights_for(&self, content_type: ContentType) -> Weights {
        self.weights
            .get(&content_type)
            .copied()
            .unwrap_or_else(|| Weights::for_content_type(content_type))
            .normalized()
    }
}

impl Assessor for HeuristicAssessor {
    fn assess(&self, text: &str, content_type: ContentType, audience: Audience) -> QualityReport {
        let lower = text.to_lowercase();
        let stats = TextStats::of(text);
        let body = content::parse(content_type, text).ok();

        let educational = educational(&lower, &stats, content_type, body.as_ref());
        let factual = factual(text, &lower);
        let readability = readability(&stats, audience);
        let structural = structural(body.as_ref(), content_type);
        let engagement = engagement(text);

        let dimensions = DimensionScores {
            educational_effectiveness: educational.0,
            factual_accuracy: factual.0,
            readability: readability.0,
            structural_quality: structural.0,
            engagement: engagement.0,
        };
        let weights = self.weights_for(content_type);
        let composite = weights.composite(&dimensions);

        // The factual floor applies whatever its weight; other dimensions only
        // count when they contribute to the composite.
        let mut deficiencies: Vec<Deficiency> = [
            (Dimension::EducationalEffectiveness, educational, weights.educational_effectiveness),
            (Dimension::FactualAccuracy, factual, 1.0),
            (Dimension::Readability, readability, weights.readability),
            (Dimension::StructuralQuality, structural, weights.structural_quality),
            (Dimension::Engagement, engagement, weights.engagement),
        ]
        .into_iter()
        .filter(|(dimension, (score, _), weight)| {
            let cutoff = match dimension {
                Dimension::FactualAccuracy => self.factual_floor,
                _ => DEFICIENCY_CUTOFF,
            };
            *weight > 0.0 && *score < cutoff
        })
        .map(|(dimension, (score, description), _)| Deficiency {
            dimension,
            score,
            description,
        })
        .collect();
        deficiencies.sort_by(|a, b| a.score.total_cmp(&b.score));

        QualityReport {
            scores: QualityScores {
                composite,
                dimensions,
            },
            deficiencies,
        }
    }
}

type Scored = (f64, String);

fn educational(
    lower: &str,
    stats: &TextStats,
    content_type: ContentType,
    body: Option<&content::ArtifactBody>,
) -> Scored {
    let objectives = heuristics::objective_markers(lower);
    let objective_score = (objectives.min(2) as f64) / 2.0;

    if content_type == ContentType::Outline {
        return outline_coverage(objective_score, body);
    }

    let examples = heuristics::example_markers(lower);
    let practice = heuristics::practice_markers(lower) + body.map_or(0, |b| b.cards.len());

    let expected_examples = (stats.words as f64 / 150.0).max(1.0);
    let example_score = (examples as f64 / expected_examples).min(1.0);
    let practice_score = (practice.min(3) as f64) / 3.0;

    let score = if content_type.is_card_based() {
        0.15 * objective_score + 0.35 * example_score + 0.50 * practice_score
    } else {
        0.35 * objective_score + 0.35 * example_score + 0.30 * practice_score
    };

    let mut notes = Vec::new();
    if objective_score < 1.0 {
        notes.push("state explicit learning objectives".to_string());
    }
    if example_score < 1.0 {
        notes.push(format!(
            "add concrete examples (found {examples}, expected at least {:.0})",
            expected_examples.ceil()
        ));
    }
    if practice_score < 1.0 {
        notes.push("include practice opportunities or review questions".to_string());
    }
    (score, notes.join("; "))
}

/// Outlines are judged on stated objectives and on breaking the topic into
/// concepts (level-3 headings), not on practice material.
fn outline_coverage(objective_score: f64, body: Option<&content::ArtifactBody>) -> Scored {
    let concepts = body.map_or(0, |b| b.sections.iter().filter(|s| s.level >= 3).count());
    let concept_score = (concepts.min(3) as f64) / 3.0;

    let mut notes = Vec::new();
    if objective_score < 1.0 {
        notes.push("state explicit learning objectives".to_string());
    }
    if concept_score < 1.0 {
        notes.push(format!(
            "give each key concept its own level-3 heading (found {concepts}, expected at least 3)"
        ));
    }
    (0.5 * objective_score + 0.5 * concept_score, notes.join("; "))
}

fn factual(text: &str, lower: &str) -> Scored {
    let misconceptions = heuristics::misconceptions(lower);
    let absolutes = heuristics::unhedged_absolutes(text);
    let citations = heuristics::citation_markers(lower);

    let penalty = 0.30 * misconceptions.len() as f64 + (0.04 * absolutes as f64).min(0.30);
    let bonus = (0.03 * citations as f64).min(0.09);
    let score = (0.90 - penalty + bonus).clamp(0.0, 1.0);

    let mut notes = Vec::new();
    for m in &misconceptions {
        notes.push(format!("remove the misconception \"{m}\""));
    }
    if absolutes > 0 {
        notes.push(format!("hedge or qualify {absolutes} absolute claim(s)"));
    }
    if citations == 0 {
        notes.push("reference sources for key claims".to_string());
    }
    (score, notes.join("; "))
}

fn readability(stats: &TextStats, audience: Audience) -> Scored {
    let grade = stats.grade_level();
    let (low, high) = audience.grade_band();
    let (distance, advice) = if grade < low {
        (low - grade, "use richer sentences and vocabulary")
    } else if grade > high {
        (grade - high, "shorten sentences and simplify vocabulary")
    } else {
        (0.0, "")
    };
    let score = (1.0 - 0.15 * distance).max(0.0);
    let note = format!(
        "reading grade {grade:.1} is outside the {audience} band {low:.0}-{high:.0}; {advice}"
    );
    (score, note)
}

fn structural(body: Option<&content::ArtifactBody>, content_type: ContentType) -> Scored {
    let Some(body) = body else {
        return (0.0, "organize the content under markdown headings".to_string());
    };

    if content_type.is_card_based() {
        let min = content_type.min_cards().max(1);
        let card_score = (body.cards.len() as f64 / min as f64).min(1.0);
        let headed = body.title.is_some() || body.sections.iter().any(|s| s.level > 0);
        let score = 0.8 * card_score + if headed { 0.2 } else { 0.0 };
        let note = format!(
            "provide at least {min} question/answer pairs (found {}) under a heading",
            body.cards.len()
        );
        return (score, note);
    }

    let headings: Vec<String> = body
        .sections
        .iter()
        .filter(|s| s.level > 0)
        .map(|s| s.heading.to_lowercase())
        .collect();
    let required = content_type.required_sections();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|r| !headings.iter().any(|h| h.contains(r)))
        .collect();
    let section_score = if required.is_empty() {
        1.0
    } else {
        (required.len() - missing.len()) as f64 / required.len() as f64
    };
    let heading_score = (headings.len().min(3) as f64) / 3.0;
    let score = 0.8 * section_score + 0.2 * heading_score;
    let note = if missing.is_empty() {
        "use more headed sections".to_string()
    } else {
        format!("add sections for: {}", missing.join(", "))
    };
    (score, note)
}

fn engagement(text: &str) -> Scored {
    let questions = heuristics::question_marks(text);
    let address = heuristics::direct_address(text);
    let score = 0.5 * (questions.min(3) as f64 / 3.0) + 0.5 * (address.min(5) as f64 / 5.0);
    let note = format!(
        "ask the reader questions (found {questions}) and address them directly (found {address})"
    );
    (score, note)
}

/// Per-type acceptance thresholds plus the factual-accuracy floor.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityGate {
    pub default_threshold: f64,
    pub thresholds: BTreeMap<ContentType, f64>,
    pub factual_floor: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            thresholds: BTreeMap::new(),
            factual_floor: DEFAULT_FACTUAL_FLOOR,
        }
    }
}

impl QualityGate {
    pub fn threshold(&self, content_type: ContentType) -> f64 {
        self.thresholds
            .get(&content_type)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn passes(&self, scores: &QualityScores, content_type: ContentType) -> bool {
        scores.composite >= self.threshold(content_type)
            && scores.dimensions.factual_accuracy >= self.factual_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::prompt::{BuiltinPrompts, PromptResolver, PromptVariables};
    use crate::testing::{
        PHOTOSYNTHESIS_FLASHCARDS, PHOTOSYNTHESIS_OUTLINE, PHOTOSYNTHESIS_STUDY_GUIDE,
    };

    fn scores(ed: f64, fa: f64, rd: f64, st: f64, en: f64) -> DimensionScores {
        DimensionScores {
            educational_effectiveness: ed,
            factual_accuracy: fa,
            readability: rd,
            structural_quality: st,
            engagement: en,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        for ct in ContentType::ALL {
            let w = Weights::for_content_type(ct);
            let sum = w.educational_effectiveness
                + w.factual_accuracy
                + w.readability
                + w.structural_quality
                + w.engagement;
            assert!((sum - 1.0).abs() < 1e-9, "{ct} weights sum to {sum}");
        }
    }

    #[test]
    fn normalization_rescales_custom_weights() {
        let w = Weights {
            educational_effectiveness: 3.0,
            factual_accuracy: 1.0,
            readability: 0.0,
            structural_quality: 0.0,
            engagement: 0.0,
        }
        .normalized();
        assert!((w.educational_effectiveness - 0.75).abs() < 1e-9);
        assert!((w.factual_accuracy - 0.25).abs() < 1e-9);
    }

    #[test]
    fn composite_is_weighted_sum() {
        let d = scores(1.0, 1.0, 0.0, 0.0, 0.0);
        let composite = Weights::default().composite(&d);
        assert!((composite - 0.55).abs() < 1e-9);
    }

    #[test]
    fn well_formed_study_guide_passes_gate() {
        let report = HeuristicAssessor::default().assess(
            PHOTOSYNTHESIS_STUDY_GUIDE,
            ContentType::StudyGuide,
            Audience::MiddleSchool,
        );
        let gate = QualityGate::default();
        assert!(
            gate.passes(&report.scores, ContentType::StudyGuide),
            "report: {report:?}"
        );
        assert_eq!(report.scores.dimensions.structural_quality, 1.0);
    }

    #[test]
    fn outline_written_to_builtin_prompt_passes_gate() {
        let prompt = BuiltinPrompts
            .compile(
                ContentType::Outline,
                &PromptVariables::new("Photosynthesis", Audience::MiddleSchool),
            )
            .unwrap();
        assert!(prompt.contains("level-3 heading per concept"));

        let report = HeuristicAssessor::default().assess(
            PHOTOSYNTHESIS_OUTLINE,
            ContentType::Outline,
            Audience::MiddleSchool,
        );
        assert!(
            QualityGate::default().passes(&report.scores, ContentType::Outline),
            "report: {report:?}"
        );
        let d = &report.scores.dimensions;
        assert_eq!(d.educational_effectiveness, 1.0);
        assert_eq!(d.structural_quality, 1.0);
        // The corrected misconception is not penalised.
        assert!(d.factual_accuracy >= DEFAULT_FACTUAL_FLOOR);
        assert!(
            report
                .deficiencies
                .iter()
                .all(|d| d.dimension != Dimension::Engagement)
        );
    }

    #[test]
    fn outline_without_concept_headings_is_flagged() {
        let flat = "# Cells\n## Learning Objectives\nStudents will name organelles.\n\
                    ## Overview\nCells are small.\n## Key Concepts\nNucleus.\n## Summary\nDone.\n";
        let report =
            HeuristicAssessor::default().assess(flat, ContentType::Outline, Audience::MiddleSchool);
        assert_eq!(report.scores.dimensions.educational_effectiveness, 0.5);
        let educational = report
            .deficiencies
            .iter()
            .find(|d| d.dimension == Dimension::EducationalEffectiveness)
            .expect("educational deficiency reported");
        assert!(educational.description.contains("level-3 heading"));
    }

    #[test]
    fn flashcard_deck_passes_gate() {
        let report = HeuristicAssessor::default().assess(
            PHOTOSYNTHESIS_FLASHCARDS,
            ContentType::Flashcards,
            Audience::MiddleSchool,
        );
        assert!(
            QualityGate::default().passes(&report.scores, ContentType::Flashcards),
            "report: {report:?}"
        );
        assert_eq!(report.scores.dimensions.structural_quality, 1.0);
    }

    #[test]
    fn misconception_drops_factual_below_floor() {
        let text = format!(
            "{PHOTOSYNTHESIS_STUDY_GUIDE}\nRemember that plants get their food from the soil."
        );
        let report =
            HeuristicAssessor::default().assess(&text, ContentType::StudyGuide, Audience::MiddleSchool);
        assert!(report.scores.dimensions.factual_accuracy < DEFAULT_FACTUAL_FLOOR);
        assert!(!QualityGate::default().passes(&report.scores, ContentType::StudyGuide));
        let factual = report
            .deficiencies
            .iter()
            .find(|d| d.dimension == Dimension::FactualAccuracy)
            .expect("factual deficiency reported");
        assert!(factual.description.contains("plants get their food from the soil"));
    }

    #[test]
    fn deficiencies_are_ranked_lowest_first() {
        let report = HeuristicAssessor::default().assess(
            "## Notes\nSome words here.",
            ContentType::StudyGuide,
            Audience::MiddleSchool,
        );
        assert!(!report.deficiencies.is_empty());
        for pair in report.deficiencies.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
        assert!(report.guidance().starts_with("The previous draft was rejected"));
    }

    #[test]
    fn unstructured_text_scores_zero_structure() {
        let report = HeuristicAssessor::default().assess(
            "plain words without any headings",
            ContentType::Summary,
            Audience::HighSchool,
        );
        assert_eq!(report.scores.dimensions.structural_quality, 0.0);
    }

    #[test]
    fn assessment_is_deterministic() {
        let assessor = HeuristicAssessor::default();
        let assess = || {
            assessor.assess(
                PHOTOSYNTHESIS_STUDY_GUIDE,
                ContentType::StudyGuide,
                Audience::MiddleSchool,
            )
        };
        assert_eq!(assess(), assess());
    }

    #[test]
    fn gate_enforces_factual_floor_regardless_of_composite() {
        let gate = QualityGate::default();
        let strong = QualityScores {
            composite: 0.95,
            dimensions: scores(1.0, 0.80, 1.0, 1.0, 1.0),
        };
        assert!(!gate.passes(&strong, ContentType::Summary));

        let ok = QualityScores {
            composite: 0.71,
            dimensions: scores(0.6, 0.9, 0.6, 0.6, 0.6),
        };
        assert!(gate.passes(&ok, ContentType::Summary));
    }

    #[test]
    fn gate_uses_per_type_threshold() {
        let gate = QualityGate {
            thresholds: BTreeMap::from([(ContentType::Quiz, 0.9)]),
            ..QualityGate::default()
        };
        assert_eq!(gate.threshold(ContentType::Quiz), 0.9);
        assert_eq!(gate.threshold(ContentType::Summary), DEFAULT_THRESHOLD);
    }
}
