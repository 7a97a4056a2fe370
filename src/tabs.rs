//! 開いているファイル（タブ）の集合
//!
//! 挿入順がそのまま表示順になる。内容は永続化されたプロジェクトとは独立に保持する

use crate::project::{Category, Language};
use std::fmt;

/// タブのキー（カテゴリ + ファイル名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabKey {
    pub category: Category,
    pub filename: String,
}

impl TabKey {
    pub fn new(category: Category, filename: impl Into<String>) -> Self {
        Self {
            category,
            filename: filename.into(),
        }
    }
}

impl fmt::Display for TabKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.filename)
    }
}

/// 開いているファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub key: TabKey,
    pub content: String,
    /// 開いてから編集されたか
    pub dirty: bool,
    pub language: Language,
}

impl Tab {
    fn new(key: TabKey, content: String) -> Self {
        let language = key.category.language();
        Self {
            key,
            content,
            dirty: false,
            language,
        }
    }
}

/// タブ集合とアクティブタブ
#[derive(Debug, Clone, Default)]
pub struct TabSet {
    tabs: Vec<Tab>,
    active: Option<TabKey>,
}

impl TabSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, key: &TabKey) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &TabKey) -> Option<&Tab> {
        self.tabs.iter().find(|tab| &tab.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TabKey> {
        self.tabs.iter().map(|tab| &tab.key)
    }

    pub fn active_key(&self) -> Option<&TabKey> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.as_ref().and_then(|key| self.get(key))
    }

    /// タブを開いてアクティブにする
    ///
    /// 未作成なら `persisted` から作る。既存タブの編集中の内容は保持する
    pub fn open(&mut self, key: TabKey, persisted: &str) -> &Tab {
        let index = match self.position(&key) {
            Some(index) => index,
            None => {
                self.tabs.push(Tab::new(key.clone(), persisted.to_string()));
                self.tabs.len() - 1
            }
        };
        self.active = Some(key);
        &self.tabs[index]
    }

    /// 明示的に内容を差し替えて開き直す（上書きインポート後など）
    pub fn refresh(&mut self, key: TabKey, content: &str) -> &Tab {
        match self.position(&key) {
            Some(index) => {
                let tab = &mut self.tabs[index];
                tab.content = content.to_string();
                tab.dirty = false;
            }
            None => self.tabs.push(Tab::new(key.clone(), content.to_string())),
        }
        self.open(key, content)
    }

    /// アクティブタブへ編集内容を書き込む。変更があれば `true`
    pub fn flush(&mut self, content: &str) -> Option<bool> {
        let key = self.active.clone()?;
        let index = self.position(&key)?;
        let tab = &mut self.tabs[index];
        let changed = tab.content != content;
        if changed {
            tab.content = content.to_string();
            tab.dirty = true;
        }
        Some(changed)
    }

    /// タブのキーを付け替える。表示位置とアクティブ状態は維持
    pub fn rename(&mut self, old: &TabKey, new: TabKey) -> bool {
        let Some(index) = self.position(old) else {
            return false;
        };
        if self.active.as_ref() == Some(old) {
            self.active = Some(new.clone());
        }
        self.tabs[index].key = new;
        true
    }

    /// タブを閉じる。アクティブだった場合は `true`
    pub fn close(&mut self, key: &TabKey) -> bool {
        if let Some(index) = self.position(key) {
            self.tabs.remove(index);
        }
        if self.active.as_ref() == Some(key) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub fn close_all(&mut self) {
        self.tabs.clear();
        self.active = None;
    }

    fn position(&self, key: &TabKey) -> Option<usize> {
        self.tabs.iter().position(|tab| &tab.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(category: Category, name: &str) -> TabKey {
        TabKey::new(category, name)
    }

    #[test]
    fn test_open_is_lazy_and_preserves_edits() {
        let mut tabs = TabSet::new();
        let index = key(Category::Markup, "index.html");

        let tab = tabs.open(index.clone(), "<p>saved</p>");
        assert_eq!(tab.content, "<p>saved</p>");
        assert!(!tab.dirty);
        assert_eq!(tab.language.tag(), "html");

        assert_eq!(tabs.flush("<p>edited</p>"), Some(true));
        let reopened = tabs.open(index.clone(), "<p>saved</p>");
        assert_eq!(reopened.content, "<p>edited</p>");
        assert!(reopened.dirty);
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_order_follows_insertion() {
        let mut tabs = TabSet::new();
        tabs.open(key(Category::Script, "b.js"), "");
        tabs.open(key(Category::Markup, "a.html"), "");
        tabs.open(key(Category::Script, "b.js"), "");

        let order: Vec<String> = tabs.keys().map(ToString::to_string).collect();
        assert_eq!(order, vec!["js/b.js", "html/a.html"]);
        assert_eq!(tabs.active_key(), Some(&key(Category::Script, "b.js")));
    }

    #[test]
    fn test_rename_keeps_position_and_active() {
        let mut tabs = TabSet::new();
        tabs.open(key(Category::Style, "a.css"), "a");
        tabs.open(key(Category::Style, "b.css"), "b");
        tabs.open(key(Category::Style, "c.css"), "c");
        tabs.open(key(Category::Style, "b.css"), "b");

        assert!(tabs.rename(&key(Category::Style, "b.css"), key(Category::Style, "z.css")));
        let order: Vec<String> = tabs.keys().map(ToString::to_string).collect();
        assert_eq!(order, vec!["css/a.css", "css/z.css", "css/c.css"]);
        assert_eq!(tabs.active().unwrap().content, "b");
    }

    #[test]
    fn test_close_reports_active() {
        let mut tabs = TabSet::new();
        tabs.open(key(Category::Markup, "a.html"), "");
        tabs.open(key(Category::Markup, "b.html"), "");

        assert!(!tabs.close(&key(Category::Markup, "a.html")));
        assert_eq!(tabs.active_key(), Some(&key(Category::Markup, "b.html")));
        assert!(tabs.close(&key(Category::Markup, "b.html")));
        assert!(tabs.active_key().is_none());
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_flush_without_active_tab() {
        let mut tabs = TabSet::new();
        assert_eq!(tabs.flush("ignored"), None);
    }

    #[test]
    fn test_refresh_replaces_content() {
        let mut tabs = TabSet::new();
        let app = key(Category::Script, "app.js");
        tabs.open(app.clone(), "old");
        tabs.flush("edited");

        let tab = tabs.refresh(app, "imported");
        assert_eq!(tab.content, "imported");
        assert!(!tab.dirty);
    }

    #[test]
    fn test_key_display_is_not_parsed() {
        let odd = key(Category::Markup, "a/b.html");
        assert_eq!(odd.to_string(), "html/a/b.html");
        assert_eq!(odd.filename, "a/b.html");
    }
}
