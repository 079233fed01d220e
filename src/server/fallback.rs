//! Replies used when handwriting analysis fails.
//!
//! Fallback templates admit the failure, make no interpretation of the
//! note, and hand the next step back to the user.

use rand::Rng;
use tracing::info;

use crate::conversation::Message;
use crate::language::{self, Language};

const TEMPLATES_JA: [&str; 5] = [
    "このカード、ちょっと読み取りが難しかったみたい。でも君がここまで書いてくれたこと自体がすごく意味があるよ。どんな気持ちで書いたのか、もう少し教えてくれる？",
    "文字が少し読みづらかったみたい。でも、ここまで書いてくれたこと自体が素晴らしいよ。どんなことを書いたのか教えてくれる？",
    "このカード、君の大事な思いが詰まってるね。読み取りがうまくいかなかったけど、もう少し詳しく話してみない？",
    "読めなかった部分もあるけど、ここまで書いてくれたのは素晴らしいよ。どんな内容だったか、話してくれる？",
    "手書きの文字、ちょっと読み取れなかったみたい。でも書いてくれたこと自体に価値があるよ。何を書いたのか聞かせてくれる？",
];

const TEMPLATES_EN: [&str; 5] = [
    "I had a bit of trouble reading this card, but the fact that you wrote it down is meaningful in itself. Can you tell me more about what you were feeling when you wrote it?",
    "The handwriting was a bit hard to read, but what matters is that you took the time to write. Can you share what you wrote about?",
    "This card holds your important thoughts. I couldn't read it clearly, but would you like to tell me more about it?",
    "I couldn't read some parts, but it's wonderful that you wrote it down. Can you tell me what it was about?",
    "I had trouble reading the handwriting, but the act of writing has value. What did you want to express?",
];

const HONEST_ERROR_JA: &str = "ごめん、手書きの文字がうまく読み取れなかったみたい。もう一度丁寧に書いて撮り直してもらえる？ それとも別の角度で試してみる？";

const HONEST_ERROR_EN: &str = "Sorry, I couldn't read the handwriting clearly. Could you try writing it again more clearly and take another photo? Or maybe try a different angle?";

/// Fallback templates for `language`.
pub fn templates(language: Language) -> &'static [&'static str] {
    match language {
        Language::Japanese => &TEMPLATES_JA,
        Language::English => &TEMPLATES_EN,
    }
}

/// A random fallback template in the conversation's language.
pub fn fallback_feedback(history: &[Message]) -> &'static str {
    let language = language::detect(history);
    let pool = templates(language);
    let index = rand::thread_rng().gen_range(0..pool.len());
    info!(
        template = index,
        language = language.code(),
        history_len = history.len(),
        "vision failed, answering with fallback template"
    );
    pool[index]
}

/// The honest "could not read it" message for `language`.
pub fn honest_error(language: Language) -> &'static str {
    match language {
        Language::Japanese => HONEST_ERROR_JA,
        Language::English => HONEST_ERROR_EN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn japanese_history_gets_japanese_template() {
        let history = vec![Message::user("今日はカードに書いた")];
        for _ in 0..20 {
            assert!(TEMPLATES_JA.contains(&fallback_feedback(&history)));
        }
    }

    #[test]
    fn english_or_empty_history_gets_english_template() {
        let history = vec![Message::user("I wrote on my card")];
        for _ in 0..20 {
            assert!(TEMPLATES_EN.contains(&fallback_feedback(&history)));
        }
        assert!(TEMPLATES_EN.contains(&fallback_feedback(&[])));
    }

    #[test]
    fn honest_error_follows_language() {
        assert!(honest_error(Language::Japanese).starts_with("ごめん"));
        assert!(honest_error(Language::English).starts_with("Sorry"));
    }

    #[test]
    fn templates_never_hide_the_failure() {
        for t in TEMPLATES_EN {
            let lower = t.to_lowercase();
            assert!(lower.contains("read"), "{t}");
            assert!(t.ends_with('?'), "{t}");
        }
        for t in TEMPLATES_JA {
            assert!(t.contains("読"), "{t}");
        }
    }
}
