//! Turns raw generator output (markdown-ish text) into an [`ArtifactBody`].

use super::{ArtifactBody, Card, ContentType, Section};
use crate::error::GenerationError;

const PROMPT_LABELS: &[&str] = &["question:", "front:", "q:"];
const ANSWER_LABELS: &[&str] = &["answer:", "back:", "a:"];

/// Parse generated text into the structural schema of `content_type`.
///
/// A response without any heading or card, or a card-based response without
/// a single complete card, is malformed. Malformed output is reported as
/// retryable: a fresh call usually fixes it.
pub fn parse(content_type: ContentType, text: &str) -> Result<ArtifactBody, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::Retryable("empty response".into()));
    }

    let mut title = None;
    let mut sections: Vec<Section> = Vec::new();
    let mut cards = Vec::new();
    let mut pending_prompt: Option<String> = None;
    let mut preamble = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }

        if let Some((level, heading)) = heading(line) {
            if level == 1 && title.is_none() && sections.is_empty() {
                title = Some(heading);
            } else {
                sections.push(Section {
                    heading,
                    level,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        let item = strip_list_marker(line);
        if let Some(prompt) = labelled(item, PROMPT_LABELS) {
            pending_prompt = Some(prompt);
            continue;
        }
        if let Some(answer) = labelled(item, ANSWER_LABELS) {
            if let Some(prompt) = pending_prompt.take() {
                cards.push(Card { prompt, answer });
            }
            continue;
        }

        match sections.last_mut() {
            Some(section) => section.lines.push(line.to_string()),
            None => preamble.push(line.to_string()),
        }
    }

    if sections.is_empty() && cards.is_empty() && title.is_none() {
        return Err(GenerationError::Retryable(
            "malformed response: no headings or question/answer pairs".into(),
        ));
    }
    if content_type.is_card_based() && cards.is_empty() {
        return Err(GenerationError::Retryable(format!(
            "malformed response: {content_type} contained no question/answer pairs"
        )));
    }

    if !preamble.is_empty() {
        sections.insert(
            0,
            Section {
                heading: String::new(),
                level: 0,
                lines: preamble,
            },
        );
    }

    Ok(ArtifactBody {
        title,
        sections,
        cards,
        text: text.to_string(),
    })
}

fn heading(line: &str) -> Option<(u8, String)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_matches('*').trim();
    if text.is_empty() {
        return None;
    }
    Some((level as u8, text.to_string()))
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '+']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix(['.', ')']) {
            return stripped.trim_start();
        }
    }
    line
}

fn labelled(item: &str, labels: &[&str]) -> Option<String> {
    let item = item.trim_start_matches('*');
    let lower = item.to_ascii_lowercase();
    labels.iter().find_map(|label| {
        lower.starts_with(label).then(|| {
            item[label.len()..]
                .trim_start_matches('*')
                .trim()
                .to_string()
        })
    })
}
