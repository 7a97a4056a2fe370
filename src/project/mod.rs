//! プロジェクトモデル
//!
//! 3つの固定カテゴリ（markup / style / script）に分かれたファイル群と、
//! その追加・改名・削除の規則を提供する

pub mod templates;

use crate::error::{IcodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// エントリとして優先されるHTMLファイル名
pub const ENTRY_FILENAME: &str = "index.html";

/// ファイル名 → 内容。列挙順はファイル名の辞書順
pub type FileMap = BTreeMap<String, String>;

/// ファイルカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "html")]
    Markup,
    #[serde(rename = "css")]
    Style,
    #[serde(rename = "js")]
    Script,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Markup, Category::Style, Category::Script];

    /// 永続化・エクスポートで使うフォルダ名
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Markup => "html",
            Category::Style => "css",
            Category::Script => "js",
        }
    }

    /// 正規の拡張子（ドット付き）
    pub fn extension(self) -> &'static str {
        match self {
            Category::Markup => ".html",
            Category::Style => ".css",
            Category::Script => ".js",
        }
    }

    pub fn language(self) -> Language {
        match self {
            Category::Markup => Language::Markup,
            Category::Style => Language::Style,
            Category::Script => Language::Script,
        }
    }

    /// 拡張子からカテゴリを判定する
    pub fn from_filename(filename: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| filename.ends_with(category.extension()))
    }

    /// フォルダ名（`html` / `css` / `js`）から解釈する
    pub fn from_dir_name(name: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| category.dir_name() == name)
    }

    /// 拡張子が無ければ補う。空の名前は `Validation`
    pub fn normalize_filename(self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IcodeError::validation("Please enter a file name"));
        }
        if name.ends_with(self.extension()) {
            Ok(name.to_string())
        } else {
            Ok(format!("{}{}", name, self.extension()))
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// エディタに渡す言語タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Markup,
    Style,
    Script,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::Markup => "html",
            Language::Style => "css",
            Language::Script => "javascript",
        }
    }
}

/// カテゴリ別のファイル群。古いレコードで欠けたカテゴリは空として読む
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFiles {
    #[serde(default)]
    pub html: FileMap,
    #[serde(default)]
    pub css: FileMap,
    #[serde(default)]
    pub js: FileMap,
}

impl ProjectFiles {
    pub fn get(&self, category: Category) -> &FileMap {
        match category {
            Category::Markup => &self.html,
            Category::Style => &self.css,
            Category::Script => &self.js,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut FileMap {
        match category {
            Category::Markup => &mut self.html,
            Category::Style => &mut self.css,
            Category::Script => &mut self.js,
        }
    }

    pub fn content(&self, category: Category, filename: &str) -> Option<&str> {
        self.get(category).get(filename).map(String::as_str)
    }

    /// プレビューのエントリ文書名
    pub fn entry_filename(&self) -> Option<&str> {
        if self.html.contains_key(ENTRY_FILENAME) {
            return Some(ENTRY_FILENAME);
        }
        self.html.keys().next().map(String::as_str)
    }

    /// `"html/index.html"` 形式のキーで全ファイルを平坦化する
    pub fn flatten(&self) -> BTreeMap<String, String> {
        Category::ALL
            .into_iter()
            .flat_map(|category| {
                self.get(category).iter().map(move |(name, content)| {
                    (format!("{}/{}", category.dir_name(), name), content.clone())
                })
            })
            .collect()
    }
}

/// 改名の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// 正規化後の名前が元と同じだった
    Unchanged,
    /// 新しい名前へ移動した
    Renamed(String),
}

/// 永続化されるプロジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub files: ProjectFiles,
    /// エンコード済みアイコン（data URL）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Project {
    /// 雛形ファイルを1つずつ持つ新規プロジェクト
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IcodeError::validation("Please enter a project name"));
        }

        let mut files = ProjectFiles::default();
        files
            .html
            .insert(ENTRY_FILENAME.to_string(), templates::default_markup(ENTRY_FILENAME));
        files
            .css
            .insert("style.css".to_string(), templates::default_style().to_string());
        files
            .js
            .insert("script.js".to_string(), templates::default_script().to_string());

        Ok(Self {
            id: id.into(),
            name,
            files,
            icon: None,
        })
    }

    pub fn file(&self, category: Category, filename: &str) -> Option<&str> {
        self.files.content(category, filename)
    }

    pub fn has_file(&self, category: Category, filename: &str) -> bool {
        self.files.get(category).contains_key(filename)
    }

    /// ファイルを追加する。既存名で `overwrite` が無ければ `Conflict`
    pub fn add_file(
        &mut self,
        category: Category,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<()> {
        if self.has_file(category, filename) && !overwrite {
            return Err(self.conflict(category, filename));
        }
        self.files
            .get_mut(category)
            .insert(filename.to_string(), content.to_string());
        Ok(())
    }

    /// 既存ファイルの内容を書き換える
    pub fn set_content(&mut self, category: Category, filename: &str, content: &str) -> Result<()> {
        match self.files.get_mut(category).get_mut(filename) {
            Some(slot) => {
                slot.clear();
                slot.push_str(content);
                Ok(())
            }
            None => Err(IcodeError::not_found(format!("{}/{}", category, filename))),
        }
    }

    /// ファイル名を変更する。拡張子を補った結果が元の名前と同じなら何もしない
    pub fn rename_file(
        &mut self,
        category: Category,
        old_name: &str,
        new_name: &str,
    ) -> Result<RenameOutcome> {
        if !self.has_file(category, old_name) {
            return Err(IcodeError::not_found(format!("{}/{}", category, old_name)));
        }
        let new_name = category.normalize_filename(new_name)?;
        if new_name == old_name {
            return Ok(RenameOutcome::Unchanged);
        }
        if self.has_file(category, &new_name) {
            return Err(self.conflict(category, &new_name));
        }

        let map = self.files.get_mut(category);
        if let Some(content) = map.remove(old_name) {
            map.insert(new_name.clone(), content);
        }
        Ok(RenameOutcome::Renamed(new_name))
    }

    pub fn delete_file(&mut self, category: Category, filename: &str) -> Result<String> {
        self.files
            .get_mut(category)
            .remove(filename)
            .ok_or_else(|| IcodeError::not_found(format!("{}/{}", category, filename)))
    }

    fn conflict(&self, category: Category, filename: &str) -> IcodeError {
        IcodeError::Conflict {
            category: category.dir_name().to_string(),
            filename: filename.to_string(),
        }
    }
}
