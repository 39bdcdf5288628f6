//! Text classifiers used by the filter cascade: a lexical English check, a
//! detector-backed English check, and the question-shape heuristic.

use crate::models::LanguageDetector;
use regex::Regex;
use std::sync::OnceLock;

/// Text -> keep/drop.
pub trait TextClassifier: Send + Sync {
    fn accepts(&self, text: &str) -> bool;
}

/// High-frequency English words used for the overlap test.
const COMMON_EN_WORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on", "with",
    "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "say", "her",
    "she", "or", "an", "will", "my", "one", "all", "would", "there", "their", "what", "so", "up",
    "out", "if", "about", "who", "get", "which", "go", "me", "when", "make", "can", "like", "time",
    "no", "just", "him", "know", "take", "people", "into", "year", "your", "good", "some", "could",
    "them", "see", "other", "than", "then", "now", "look", "only", "come", "its", "over", "think",
    "also", "back", "after", "use", "two", "how", "our", "work", "first", "well", "way", "even",
    "new", "want", "because", "any", "these", "give", "day", "most", "us", "is", "are", "was",
    "were", "am", "been", "did", "does", "had", "has", "may", "might", "should", "shall", "why",
    "where",
];

/// Smaller hint set for the low-confidence detector path.
const EN_HINT_WORDS: &[&str] = &[
    "the", "is", "are", "what", "how", "why", "can", "you", "your", "this", "that", "and", "do",
];

/// Interrogatives and auxiliaries that open a question.
const QUESTION_START: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "which", "whom", "whose", "is", "are", "was",
    "were", "do", "does", "did", "can", "could", "will", "would", "should", "has", "have", "had",
    "may", "might", "shall", "won't", "isn't", "aren't", "don't", "doesn't", "didn't", "can't",
    "couldn't", "haven't", "hasn't", "hadn't", "shouldn't",
];

/// Fixed openings of indirect or polite questions.
const QUESTION_OPENINGS: &[&str] = &[
    "i wonder", "could you", "could u", "can you", "can u", "can anyone", "does anyone",
    "any idea", "do you know", "can someone", "would you", "should i", "is it", "is there",
    "was it", "were they", "do we", "why is", "why are", "what if",
];

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("static regex"))
}

fn ascii_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z']+").expect("static regex"))
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // urls, #tags / @mentions, misc symbols + dingbats, punctuation
    RE.get_or_init(|| {
        Regex::new(r"https?://\S+|[#@]\w+|[\x{2600}-\x{27BF}]|[^\w\s]").expect("static regex")
    })
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Number of `\b\w+\b` words.
pub fn word_count(text: &str) -> usize {
    word_re().find_iter(text).count()
}

/// Strip urls, tags, symbols and punctuation; collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let t = noise_re().replace_all(text.trim(), " ");
    space_re().replace_all(&t, " ").trim().to_string()
}

pub fn is_english_code(lang: &str) -> bool {
    let l = lang.trim().to_ascii_lowercase();
    l == "en" || l == "eng" || l.starts_with("en-")
}

/// The question-shape heuristic: a `?` anywhere, an interrogative/auxiliary
/// first word, or one of the fixed question openings.
pub fn is_question_shape(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    if t.contains('?') {
        return true;
    }
    let lowered = t.to_lowercase();
    if let Some(first) = lowered.split_whitespace().next() {
        if QUESTION_START.contains(&first) {
            return true;
        }
    }
    QUESTION_OPENINGS.iter().any(|p| lowered.starts_with(p))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QuestionShape;

impl TextClassifier for QuestionShape {
    fn accepts(&self, text: &str) -> bool {
        is_question_shape(text)
    }
}

/// Stage A: English by character and vocabulary statistics only.
#[derive(Clone, Debug)]
pub struct LexicalEnglish {
    pub max_non_ascii_ratio: f64,
    pub min_tokens: usize,
    pub min_common_ratio: f64,
    pub min_vowel_ratio: f64,
}

impl Default for LexicalEnglish {
    fn default() -> Self {
        Self { max_non_ascii_ratio: 0.05, min_tokens: 3, min_common_ratio: 0.30, min_vowel_ratio: 0.25 }
    }
}

impl TextClassifier for LexicalEnglish {
    fn accepts(&self, text: &str) -> bool {
        let total = text.chars().count();
        if total == 0 {
            return false;
        }
        let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
        if non_ascii as f64 > total as f64 * self.max_non_ascii_ratio {
            return false;
        }

        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = ascii_token_re().find_iter(&lowered).map(|m| m.as_str()).collect();
        if tokens.len() < self.min_tokens {
            return false;
        }
        let hits = tokens.iter().filter(|t| COMMON_EN_WORDS.contains(t)).count();
        if (hits as f64 / tokens.len() as f64) < self.min_common_ratio {
            return false;
        }

        let (letters, vowels) = text
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .fold((0usize, 0usize), |(l, v), c| {
                let is_vowel = matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u');
                (l + 1, v + usize::from(is_vowel))
            });
        if letters == 0 {
            return false;
        }
        vowels as f64 / letters as f64 >= self.min_vowel_ratio
    }
}

/// Stage B: English according to a language detector, with a looser
/// confidence band rescued by common-word hits.
pub struct StatisticalEnglish<D> {
    detector: D,
    pub min_words: usize,
    pub min_confidence: f64,
    pub fallback_confidence: f64,
    pub fallback_hits: usize,
}

impl<D: LanguageDetector> StatisticalEnglish<D> {
    pub fn new(detector: D) -> Self {
        Self { detector, min_words: 5, min_confidence: 0.80, fallback_confidence: 0.70, fallback_hits: 2 }
    }

    pub fn min_words(mut self, n: usize) -> Self {
        self.min_words = n;
        self
    }
}

impl<D: LanguageDetector> StatisticalEnglish<D> {
    /// `None` when the detector has no opinion on the cleaned text; callers
    /// decide what that means.
    pub fn verdict(&self, text: &str) -> Option<bool> {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return Some(false);
        }
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        if words.len() < self.min_words {
            return Some(false);
        }
        let det = self.detector.detect(&cleaned)?;
        if !is_english_code(&det.lang) {
            return Some(false);
        }
        if det.reliable && det.confidence >= self.min_confidence {
            return Some(true);
        }
        if det.confidence >= self.fallback_confidence {
            let hits = words
                .iter()
                .filter(|w| EN_HINT_WORDS.contains(&w.to_lowercase().as_str()))
                .count();
            return Some(hits >= self.fallback_hits);
        }
        Some(false)
    }
}

impl<D: LanguageDetector> TextClassifier for StatisticalEnglish<D> {
    fn accepts(&self, text: &str) -> bool {
        self.verdict(text).unwrap_or(false)
    }
}
