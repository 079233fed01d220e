//! Conversation language heuristic.
//!
//! A conversation is treated as Japanese as soon as any message contains
//! hiragana, katakana, or CJK ideographs. Everything else is English.

use crate::conversation::Message;

/// Language used for user-facing notices and fallback templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Japanese.
    Japanese,
    /// English.
    #[default]
    English,
}

impl Language {
    /// Short language code (`ja` / `en`) for logging.
    pub fn code(self) -> &'static str {
        match self {
            Self::Japanese => "ja",
            Self::English => "en",
        }
    }
}

/// Returns true if `text` contains hiragana, katakana, or CJK ideographs.
pub fn contains_japanese(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{3040}'..='\u{309F}'   // hiragana
            | '\u{30A0}'..='\u{30FF}' // katakana
            | '\u{4E00}'..='\u{9FAF}' // CJK unified ideographs
        )
    })
}

/// Detect the conversation language from its history.
pub fn detect(history: &[Message]) -> Language {
    if history.iter().any(|m| contains_japanese(&m.content)) {
        Language::Japanese
    } else {
        Language::English
    }
}
