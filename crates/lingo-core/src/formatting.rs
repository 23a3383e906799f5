//! Formatting helpers for outbound Telegram HTML.

use crate::domain::WordEntry;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One word entry as a card.
pub fn word_card(entry: &WordEntry) -> String {
    let mut out = format!(
        "📖 <b>{}</b>\n🏷 {} | {}\n💡 {}",
        escape_html(&entry.word),
        entry.level,
        escape_html(&entry.topic),
        escape_html(&entry.definition),
    );
    if !entry.example.trim().is_empty() {
        out.push_str(&format!("\n📝 <i>Ex: {}</i>", escape_html(&entry.example)));
    }
    if !entry.pronunciation.trim().is_empty() {
        out.push_str(&format!("\n🗣 {}", escape_html(&entry.pronunciation)));
    }
    out
}

/// Compact listing used by "List Words".
pub fn word_list(entries: &[WordEntry]) -> String {
    if entries.is_empty() {
        return "Database empty.".to_string();
    }
    let lines = entries
        .iter()
        .map(|e| {
            format!(
                "{} | {} | {}",
                escape_html(&e.topic),
                e.level,
                escape_html(&e.word)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("📚 <b>Words:</b>\n{lines}")
}

/// Search results, capped to keep a single message well under Telegram limits.
pub fn search_results(entries: &[WordEntry], cap: usize) -> String {
    if entries.is_empty() {
        return "No results found.".to_string();
    }
    let mut lines = entries
        .iter()
        .take(cap)
        .map(|e| format!("{} ({})", escape_html(&e.word), e.level))
        .collect::<Vec<_>>();
    if entries.len() > cap {
        lines.push("...and more.".to_string());
    }
    format!("🔍 <b>Results:</b>\n{}", lines.join("\n"))
}
