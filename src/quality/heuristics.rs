//! Text statistics and marker tables behind the heuristic assessor.
//!
//! Everything here is a pure function of its input so scores are reproducible.

/// Strings that flag well-known misconceptions. Matched case-insensitively.
pub const KNOWN_MISCONCEPTIONS: &[&str] = &[
    "only use 10% of their brain",
    "only use 10 percent of their brain",
    "plants get their food from the soil",
    "seasons are caused by the distance",
    "heavier objects fall faster",
    "blood is blue",
    "goldfish have a three-second memory",
    "lightning never strikes the same place twice",
    "great wall of china is visible from space",
    "bats are blind",
    "glass is a slow-moving liquid",
    "different parts of the tongue taste",
    "sugar makes children hyperactive",
    "humans evolved from chimpanzees",
    "the sun revolves around the earth",
    "photosynthesis happens only at night",
];

const OBJECTIVE_MARKERS: &[&str] = &[
    "objective",
    "you will learn",
    "you will be able",
    "by the end of",
    "students will",
    "learning goal",
];

const EXAMPLE_MARKERS: &[&str] = &[
    "example",
    "for instance",
    "e.g.",
    "such as",
    "consider",
    "imagine",
];

const PRACTICE_MARKERS: &[&str] = &[
    "practice",
    "exercise",
    "activity",
    "review",
    "quiz",
    "check your understanding",
    "try this",
];

const ABSOLUTE_MARKERS: &[&str] = &[
    "always",
    "never",
    "everyone knows",
    "100%",
    "proven fact",
    "definitely",
    "undeniably",
    "guaranteed",
    "without exception",
    "impossible",
];

const HEDGE_MARKERS: &[&str] = &[
    "usually",
    "often",
    "generally",
    "typically",
    "most",
    "may",
    "might",
    "tend",
    "almost",
    "rarely",
    "sometimes",
];

const CITATION_MARKERS: &[&str] = &[
    "according to",
    "research shows",
    "research suggests",
    "researcher",
    "studies show",
    "studies suggest",
    "studies have",
    "et al",
    "source:",
    "doi:",
    "published in",
    "[1]",
];

/// Framing that marks a misconception as wrong rather than asserting it.
const CORRECTION_MARKERS: &[&str] = &[
    "believe",
    "myth",
    "misconception",
    "in fact",
    "actually",
    "not true",
    "untrue",
    "false",
    "incorrect",
    "wrong",
    "mistaken",
    "contrary to",
];

const ADDRESS_WORDS: &[&str] = &["you", "your", "you're", "you'll", "let's", "imagine", "we", "our"];

/// Basic counts used by the readability formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStats {
    pub words: usize,
    pub sentences: usize,
    pub syllables: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let words: Vec<String> = words(text).collect();
        let syllables = words.iter().map(|w| syllables(w)).sum();
        Self {
            words: words.len(),
            sentences: sentences(text).len().max(1),
            syllables,
        }
    }

    /// Flesch-Kincaid grade level.
    pub fn grade_level(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        let words = self.words as f64;
        0.39 * (words / self.sentences as f64) + 11.8 * (self.syllables as f64 / words) - 15.59
    }
}

/// Lowercased alphabetic words, markdown punctuation stripped.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|token| {
        let word: String = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        word.chars().any(|c| c.is_alphabetic()).then_some(word)
    })
}

/// Sentences, split on terminal punctuation and line breaks. Segments without
/// a word are dropped.
pub fn sentences(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.split(['.', '!', '?']))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| s.chars().any(|c| c.is_alphabetic()))
        .collect()
}

/// Vowel-group syllable estimate with a silent trailing `e`.
pub fn syllables(word: &str) -> usize {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if letters.is_empty() {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for &c in &letters {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }

    let n = letters.len();
    if count > 1 && letters[n - 1] == 'e' && !(n >= 2 && letters[n - 2] == 'l') {
        count -= 1;
    }
    count.max(1)
}

/// Whole-word occurrences of `marker` in `lower`. A marker ending in a
/// letter also matches its plural (`example` matches `examples`).
pub fn count_phrase(lower: &str, marker: &str) -> usize {
    let Some(first) = marker.chars().next() else {
        return 0;
    };
    let last = marker.chars().next_back().unwrap_or(first);
    lower
        .match_indices(marker)
        .filter(|(start, matched)| {
            let before = lower[..*start].chars().next_back();
            let mut rest = &lower[start + matched.len()..];
            if last.is_alphabetic() {
                rest = rest.strip_prefix('s').unwrap_or(rest);
            }
            at_boundary(before, first) && at_boundary(rest.chars().next(), last)
        })
        .count()
}

fn at_boundary(neighbour: Option<char>, edge: char) -> bool {
    !edge.is_alphanumeric() || !neighbour.is_some_and(char::is_alphanumeric)
}

fn contains_any(lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| count_phrase(lower, m) > 0)
}

pub fn count_markers(lower: &str, markers: &[&str]) -> usize {
    markers.iter().map(|m| count_phrase(lower, m)).sum()
}

pub fn objective_markers(lower: &str) -> usize {
    count_markers(lower, OBJECTIVE_MARKERS)
}

pub fn example_markers(lower: &str) -> usize {
    count_markers(lower, EXAMPLE_MARKERS)
}

pub fn practice_markers(lower: &str) -> usize {
    count_markers(lower, PRACTICE_MARKERS)
}

pub fn citation_markers(lower: &str) -> usize {
    count_markers(lower, CITATION_MARKERS)
}

/// Misconception strings the text asserts. A sentence that frames the claim
/// as a belief or myth, or is followed by a correction, does not count.
pub fn misconceptions(lower: &str) -> Vec<&'static str> {
    let sentences = sentences(lower);
    let corrected = |i: usize| {
        contains_any(&sentences[i], CORRECTION_MARKERS)
            || sentences
                .get(i + 1)
                .is_some_and(|next| contains_any(next, CORRECTION_MARKERS))
    };
    KNOWN_MISCONCEPTIONS
        .iter()
        .copied()
        .filter(|m| {
            sentences
                .iter()
                .enumerate()
                .any(|(i, s)| s.contains(m) && !corrected(i))
        })
        .collect()
}

/// Sentences that make an absolute claim without any hedge word.
pub fn unhedged_absolutes(text: &str) -> usize {
    sentences(text)
        .iter()
        .filter(|s| contains_any(s, ABSOLUTE_MARKERS) && !contains_any(s, HEDGE_MARKERS))
        .count()
}

pub fn question_marks(text: &str) -> usize {
    text.matches('?').count()
}

/// Words that speak to the reader directly.
pub fn direct_address(text: &str) -> usize {
    words(text).filter(|w| ADDRESS_WORDS.contains(&w.as_str())).count()
}
