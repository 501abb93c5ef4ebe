//! Word classification for drill-list admission.
//!
//! Classification tiers, tried in order: an explicit tag on the item, the
//! dictionary part-of-speech string, and finally a trailing-kana heuristic.
//! Each tier is independently testable; the first tier that produces a
//! class wins.

use crate::types::{ContentType, ListKind, SavedStudyItem};

/// Grammatical class relevant to conjugation drills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    Verb,
    IAdjective,
    NaAdjective,
    Noun,
    Other,
}

impl WordClass {
    /// Whether the class can be conjugated (and therefore drilled).
    pub fn is_conjugable(&self) -> bool {
        matches!(self, Self::Verb | Self::IAdjective | Self::NaAdjective)
    }
}

/// Dictionary-form verb endings (う-row kana).
const VERB_ENDINGS: [char; 9] = ['う', 'く', 'ぐ', 'す', 'つ', 'ぬ', 'ぶ', 'む', 'る'];

/// Classify a word: explicit tag, then part of speech, then ending.
pub fn classify(tags: &[String], part_of_speech: Option<&str>, text: &str) -> WordClass {
    if let Some(class) = class_from_tags(tags) {
        return class;
    }
    if let Some(class) = part_of_speech.and_then(class_from_pos) {
        return class;
    }
    class_from_ending(text)
}

fn class_from_tags(tags: &[String]) -> Option<WordClass> {
    for tag in tags {
        match tag.as_str() {
            "verb" => return Some(WordClass::Verb),
            "i-adjective" | "adjective-i" => return Some(WordClass::IAdjective),
            "na-adjective" | "adjective-na" => return Some(WordClass::NaAdjective),
            "noun" => return Some(WordClass::Noun),
            _ => {}
        }
    }
    None
}

fn class_from_pos(pos: &str) -> Option<WordClass> {
    let pos = pos.to_ascii_lowercase();
    if pos.starts_with("v") || pos.contains("godan") || pos.contains("ichidan") || pos.contains("verb") {
        Some(WordClass::Verb)
    } else if pos.contains("adj-i") || pos.contains("i-adjective") {
        Some(WordClass::IAdjective)
    } else if pos.contains("adj-na") || pos.contains("na-adjective") {
        Some(WordClass::NaAdjective)
    } else if pos == "n" || pos.contains("noun") {
        Some(WordClass::Noun)
    } else {
        None
    }
}

fn class_from_ending(text: &str) -> WordClass {
    match text.chars().last() {
        Some('い') => WordClass::IAdjective,
        Some(c) if VERB_ENDINGS.contains(&c) => WordClass::Verb,
        _ => WordClass::Other,
    }
}

/// Whether a list of the given kind admits this item.
///
/// Flashcard lists take anything; sentence lists take only sentence
/// content; drill lists take only conjugable vocabulary.
pub fn admits(kind: ListKind, item: &SavedStudyItem) -> bool {
    match kind {
        ListKind::Flashcard => true,
        ListKind::Sentence => item.content_type == ContentType::Sentence,
        ListKind::Drill => {
            item.content_type == ContentType::Vocabulary
                && classify(&item.tags, item.part_of_speech.as_deref(), &item.primary_text)
                    .is_conjugable()
        }
    }
}
