//! User-facing notices, in the conversation's language.

use crate::language::Language;
use crate::server::fallback::honest_error;

/// Why a notice is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The chat request failed; ask the user to repeat.
    ChatRetry,
    /// Microphone access was refused.
    MicPermission,
    /// Recognition stopped for another reason.
    RecognitionStopped,
    /// Photo analysis failed and no fallback is configured.
    VisionFailed,
    /// The photo could not be used at all.
    PhotoRejected,
    /// The session reached its turn limit; ask for the card photo.
    UploadPrompt,
}

/// Text for `kind` in `language`. `max_turns` fills the upload prompt.
pub fn notice_text(kind: NoticeKind, language: Language, max_turns: u32) -> String {
    match (kind, language) {
        (NoticeKind::ChatRetry, Language::Japanese) => {
            "ごめん、うまく返事ができなかったみたい。もう一度話してもらえる？".to_owned()
        }
        (NoticeKind::ChatRetry, Language::English) => {
            "Sorry, I couldn't come up with a reply just now. Could you say that again?".to_owned()
        }
        (NoticeKind::MicPermission, Language::Japanese) => {
            "マイクが使えないみたい。マイクへのアクセスを許可してから、もう一度試してね。"
                .to_owned()
        }
        (NoticeKind::MicPermission, Language::English) => {
            "I can't hear you because microphone access is blocked. Please allow the microphone and try again."
                .to_owned()
        }
        (NoticeKind::RecognitionStopped, Language::Japanese) => {
            "音声認識が止まってしまったみたい。もう一度マイクをオンにしてね。".to_owned()
        }
        (NoticeKind::RecognitionStopped, Language::English) => {
            "Speech recognition stopped. Please turn the microphone on again.".to_owned()
        }
        (NoticeKind::VisionFailed, language) => honest_error(language).to_owned(),
        (NoticeKind::PhotoRejected, Language::Japanese) => {
            "この画像は使えないみたい。手書きのカードの写真を選んでね。".to_owned()
        }
        (NoticeKind::PhotoRejected, Language::English) => {
            "I can't use that file. Please choose a photo of your handwritten card.".to_owned()
        }
        (NoticeKind::UploadPrompt, Language::Japanese) => {
            format!("{max_turns}ターンが終了しました。手書きの振り返りをアップロードしてください")
        }
        (NoticeKind::UploadPrompt, Language::English) => {
            format!(
                "{max_turns} turns are complete. Please upload a photo of your handwritten reflection."
            )
        }
    }
}
