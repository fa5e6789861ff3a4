//! Scripted fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::content::{
    self, Audience, ContentType, DimensionScores, GeneratedArtifact, QualityScores,
};
use crate::error::GenerationError;
use crate::generation::TextGenerator;
use crate::quality::{Assessor, Deficiency, Dimension, QualityReport};

/// Master outline written the way the outline prompt asks for it.
pub(crate) const PHOTOSYNTHESIS_OUTLINE: &str = "\
# Photosynthesis
## Learning Objectives
- Describe how plants turn light energy into chemical energy.
- Identify the inputs and outputs of photosynthesis.
- By the end of the lesson, students will explain why leaves are green.
## Overview
Photosynthesis is the process green plants use to make their own food. It takes place mostly in the leaves.
## Key Concepts
### Light Energy
Chlorophyll in the chloroplasts absorbs sunlight.
### Inputs and Outputs
Plants take in carbon dioxide and water and release oxygen.
### Glucose
The sugar made during photosynthesis stores energy for the plant.
### Common Misconceptions
Many students believe plants get their food from the soil. In fact, soil supplies water and minerals, while the food itself is made in the leaves.
## Summary
Plants capture light and store its energy as sugar, releasing oxygen as a by-product.
";

pub(crate) const PHOTOSYNTHESIS_STUDY_GUIDE: &str = "\
# Photosynthesis Study Guide
## Objectives
By the end of this guide you will be able to explain how plants make food.
## Key Concepts
Plants use light from the sun to make sugar. For example, a leaf turns light into food.
Chlorophyll is the green color in a leaf. It helps the plant catch light.
## Examples
Consider a tree in a sunny park. Its leaves make food all day.
## Review
Try this practice question. What gas do plants take in? What gas do they give off?
Can you name the part of the leaf that catches light?
According to research, most plants need water, light and air to grow.
";

pub(crate) const PHOTOSYNTHESIS_FLASHCARDS: &str = "\
# Photosynthesis Flashcards
Front: What is photosynthesis?
Back: The process plants use to make sugar from light, water and carbon dioxide.
Front: Where does photosynthesis take place?
Back: In the chloroplasts, mostly inside the leaves.
Front: What does chlorophyll do?
Back: It absorbs light energy. For example, it captures red and blue light.
Front: Which gas do plants take in?
Back: Carbon dioxide from the air.
Front: Which gas do plants give off?
Back: Oxygen, which animals such as you and me breathe.
Front: What sugar is made?
Back: Glucose, which stores energy for the plant.
Front: Why are leaves green?
Back: Chlorophyll reflects green light instead of absorbing it.
Front: What do roots take from the soil?
Back: Water and minerals, for instance nitrogen.
";

/// Well-formed model output for `content_type`.
pub(crate) fn sample_text(content_type: ContentType) -> String {
    if content_type.is_card_based() {
        let mut text = format!("# {content_type}\n");
        for i in 1..=8 {
            text.push_str(&format!("Question: What is step {i}?\nAnswer: Step {i} is light capture.\n"));
        }
        return text;
    }
    format!(
        "# Photosynthesis {content_type}\n## Objectives\nExplain how plants make food.\n\
         ## Key Concepts\nPlants turn light into sugar.\n## Summary\nLight becomes food.\n"
    )
}

/// An accepted-looking artifact with every dimension at `composite`.
pub(crate) fn artifact(content_type: ContentType, composite: f64) -> GeneratedArtifact {
    let text = sample_text(content_type);
    let body = content::parse(content_type, &text).unwrap();
    GeneratedArtifact::new(content_type, body, scores(composite), 1)
}

fn scores(composite: f64) -> QualityScores {
    QualityScores {
        composite,
        dimensions: DimensionScores {
            educational_effectiveness: composite,
            factual_accuracy: 0.9,
            readability: composite,
            structural_quality: composite,
            engagement: composite,
        },
    }
}

/// Generator answering from per-type scripts; unscripted calls succeed with
/// [`sample_text`]. Records every prompt it receives and the peak number of
/// calls in flight at once.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    script: Mutex<HashMap<ContentType, VecDeque<Result<String, GenerationError>>>>,
    always: Mutex<HashMap<ContentType, GenerationError>>,
    calls: Mutex<Vec<(ContentType, String)>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn push(&self, content_type: ContentType, response: Result<String, GenerationError>) {
        self.script
            .lock()
            .unwrap()
            .entry(content_type)
            .or_default()
            .push_back(response);
    }

    pub(crate) fn fail_always(&self, content_type: ContentType, error: GenerationError) {
        self.always.lock().unwrap().insert(content_type, error);
    }

    pub(crate) fn calls_for(&self, content_type: ContentType) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(ct, _)| *ct == content_type)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts_for(&self, content_type: ContentType) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(ct, _)| *ct == content_type)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl ScriptedGenerator {
    fn answer(&self, content_type: ContentType) -> Result<String, GenerationError> {
        if let Some(err) = self.always.lock().unwrap().get(&content_type) {
            return Err(err.clone());
        }
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&content_type)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(sample_text(content_type)))
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        content_type: ContentType,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((content_type, prompt.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.answer(content_type);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

/// Assessor returning scripted composites per type (default 0.9). The last
/// scripted score repeats once the script runs out.
#[derive(Default)]
pub(crate) struct ScriptedAssessor {
    composites: Mutex<HashMap<ContentType, VecDeque<f64>>>,
}

impl ScriptedAssessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, content_type: ContentType, composites: &[f64]) {
        self.composites
            .lock()
            .unwrap()
            .insert(content_type, composites.iter().copied().collect());
    }
}

impl Assessor for ScriptedAssessor {
    fn assess(&self, _text: &str, content_type: ContentType, _audience: Audience) -> QualityReport {
        let composite = {
            let mut composites = self.composites.lock().unwrap();
            match composites.get_mut(&content_type) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(0.9),
                Some(queue) => queue.front().copied().unwrap_or(0.9),
                None => 0.9,
            }
        };
        let deficiencies = if composite < 0.7 {
            vec![Deficiency {
                dimension: Dimension::Readability,
                score: composite,
                description: "use shorter sentences".into(),
            }]
        } else {
            Vec::new()
        };
        QualityReport {
            scores: scores(composite),
            deficiencies,
        }
    }
}
