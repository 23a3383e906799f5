//! Reply-keyboard layouts shown by the conversation flows.

use crate::messaging::ReplyKeyboard;

pub const CANCEL: &str = "🏠 Cancel";
pub const SKIP: &str = "Skip";

pub const MENU_GET_WORD: &str = "🎯 Get Word";
pub const MENU_ADD_WORD: &str = "➕ Add Word";
pub const MENU_LIST_WORDS: &str = "📚 List Words";
pub const MENU_DAILY_WORDS: &str = "⏰ Daily Words";
pub const MENU_SEARCH: &str = "🔍 Search";
pub const MENU_SETTINGS: &str = "⚙️ Settings";
pub const MENU_BULK_ADD: &str = "📦 Bulk Add";
pub const MENU_CLEAR_WORDS: &str = "🗑 Clear Words";
pub const MENU_BACKUP: &str = "🛡 Backup";

pub const ADD_MANUAL: &str = "Manual";
pub const ADD_AI: &str = "🤖 AI";

pub const SEARCH_BY_WORD: &str = "By Word";
pub const SEARCH_BY_LEVEL: &str = "By Level";
pub const SEARCH_BY_TOPIC: &str = "By Topic";

pub const SETTINGS_PRIORITY: &str = "🔄 Source Priority";
pub const PRIORITY_CAMBRIDGE: &str = "Cambridge First";
pub const PRIORITY_WEBSTER: &str = "Webster First";

pub fn main_menu(is_admin: bool) -> ReplyKeyboard {
    let mut rows = vec![
        vec![MENU_GET_WORD, MENU_ADD_WORD],
        vec![MENU_LIST_WORDS, MENU_DAILY_WORDS],
        vec![MENU_SEARCH, MENU_SETTINGS],
    ];
    if is_admin {
        rows.push(vec![MENU_BULK_ADD, MENU_CLEAR_WORDS]);
        rows.push(vec![MENU_BACKUP]);
    }
    ReplyKeyboard::new(rows)
}

pub fn add_choice() -> ReplyKeyboard {
    ReplyKeyboard::new([vec![ADD_MANUAL, ADD_AI], vec![CANCEL]])
}

pub fn search_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([
        vec![SEARCH_BY_WORD, SEARCH_BY_LEVEL],
        vec![SEARCH_BY_TOPIC, CANCEL],
    ])
}

pub fn settings_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([vec![SETTINGS_PRIORITY, CANCEL]])
}

pub fn priority_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([vec![PRIORITY_CAMBRIDGE, PRIORITY_WEBSTER], vec![CANCEL]])
}

/// Level picker without Skip, for places where a level is the query itself.
pub fn level_search_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([
        vec!["A1", "A2", "B1"],
        vec!["B2", "C1", "C2"],
        vec![CANCEL],
    ])
}

pub fn level_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([
        vec!["A1", "A2", "B1"],
        vec!["B2", "C1", "C2"],
        vec![SKIP],
        vec![CANCEL],
    ])
}

pub fn pos_menu() -> ReplyKeyboard {
    ReplyKeyboard::new([
        vec!["noun", "verb"],
        vec!["adjective", "adverb"],
        vec![SKIP],
        vec![CANCEL],
    ])
}

pub fn cancel_only() -> ReplyKeyboard {
    ReplyKeyboard::new([vec![CANCEL]])
}

pub fn skip_cancel() -> ReplyKeyboard {
    ReplyKeyboard::new([vec![SKIP], vec![CANCEL]])
}
