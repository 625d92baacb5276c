use crate::platform::InboundMessage;

/// Find the chat identity for a correlation string.
///
/// Scans the messages in the order the platform returned them and picks the
/// first whose text equals `correlation` exactly, with no trimming or
/// case-folding. Later matches are ignored. Returns `None` when nothing
/// matches, or when the first match carries an empty chat identity. The
/// platform only hands us its bounded recent-update window, so older
/// matches are invisible to this scan.
pub fn resolve<'a>(correlation: &str, messages: &'a [InboundMessage]) -> Option<&'a str> {
    messages
        .iter()
        .find(|message| message.text == correlation)
        .map(|message| message.chat_id.as_str())
        .filter(|chat_id| !chat_id.is_empty())
}
