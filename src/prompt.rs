//! Prompt templates, one per content type.

use crate::content::{Audience, ContentType};
use crate::error::GenerationError;

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct PromptVariables {
    pub topic: String,
    pub audience: Audience,
    /// Master outline text; required for every derivative.
    pub outline: Option<String>,
    /// Corrective feedback from a failed quality assessment.
    pub guidance: Option<String>,
}

impl PromptVariables {
    pub fn new(topic: impl Into<String>, audience: Audience) -> Self {
        Self {
            topic: topic.into(),
            audience,
            outline: None,
            guidance: None,
        }
    }

    pub fn with_outline(mut self, outline: impl Into<String>) -> Self {
        self.outline = Some(outline.into());
        self
    }

    pub fn with_guidance(mut self, guidance: Option<String>) -> Self {
        self.guidance = guidance.filter(|g| !g.trim().is_empty());
        self
    }
}

pub trait PromptResolver: Send + Sync {
    fn compile(
        &self,
        content_type: ContentType,
        vars: &PromptVariables,
    ) -> Result<String, GenerationError>;
}

/// The built-in template set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrompts;

impl BuiltinPrompts {
    fn instructions(content_type: ContentType) -> &'static str {
        match content_type {
            ContentType::Outline => {
                "Write a master outline that every other lesson resource will be derived from.\n\
                 Start with a level-1 heading holding the title, then use level-2 headings for: \
                 Learning Objectives, Overview, Key Concepts (one level-3 heading per concept) and Summary.\n\
                 Note common misconceptions and correct them."
            }
            ContentType::StudyGuide => {
                "Write a study guide with level-2 headings for: Learning Objectives, Key Concepts, \
                 Worked Examples and Review Questions.\n\
                 Explain each concept in a short paragraph and give at least one concrete example."
            }
            ContentType::Flashcards => {
                "Write at least 8 flashcards. Format every card on two lines:\n\
                 Front: <term or question>\n\
                 Back: <concise answer>\n\
                 Cover every key concept in the outline."
            }
            ContentType::Quiz => {
                "Write a quiz of at least 6 questions mixing recall and application. Format every item:\n\
                 Question: <question, with lettered options when multiple choice>\n\
                 Answer: <correct answer and a one-sentence explanation>"
            }
            ContentType::LessonPlan => {
                "Write a lesson plan with level-2 headings for: Objectives, Materials, Activities \
                 (timed, numbered steps) and Assessment."
            }
            ContentType::SlideDeck => {
                "Write a slide deck. Use one level-2 heading per slide, formatted as \
                 \"Slide N: <title>\", with 3-5 bullet points and a short speaker note each."
            }
            ContentType::Worksheet => {
                "Write a worksheet with level-2 headings for: Instructions, Exercises (numbered, \
                 increasing in difficulty) and Answer Key."
            }
            ContentType::PodcastScript => {
                "Write a two-host podcast script with level-2 headings for: Intro, one Segment per \
                 key concept, and Outro. Use a conversational tone and ask the listener questions."
            }
            ContentType::Summary => {
                "Write a one-page summary with level-2 headings for: Summary and Key Takeaways \
                 (a bulleted list)."
            }
        }
    }
}

impl PromptResolver for BuiltinPrompts {
    fn compile(
        &self,
        content_type: ContentType,
        vars: &PromptVariables,
    ) -> Result<String, GenerationError> {
        let mut prompt = format!(
            "Topic: {}\nAudience: {}\nContent type: {}\n\n{}\n",
            vars.topic.trim(),
            vars.audience.describe(),
            content_type,
            Self::instructions(content_type),
        );

        if content_type.is_derivative() {
            let outline = vars
                .outline
                .as_deref()
                .filter(|o| !o.trim().is_empty())
                .ok_or_else(|| {
                    GenerationError::Fatal(format!(
                        "prompt for {content_type} requires the master outline"
                    ))
                })?;
            prompt.push_str(
                "\nBase the material strictly on this master outline and stay consistent with it:\n\n",
            );
            prompt.push_str(outline.trim());
            prompt.push('\n');
        }

        if let Some(guidance) = &vars.guidance {
            prompt.push('\n');
            prompt.push_str(guidance.trim());
            prompt.push('\n');
        }

        Ok(prompt)
    }
}
