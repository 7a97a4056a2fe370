//! ドロップされたファイルの取り込み

use crate::error::{IcodeError, Result};
use crate::project::Category;
use std::fs;
use std::path::Path;

/// 読み込み済みのドロップ項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub filename: String,
    pub content: String,
}

impl DroppedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// ディスク上のファイルを読み込む
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| IcodeError::validation(format!("Not a file: {}", path.display())))?;
        let content = fs::read_to_string(path)?;
        Ok(Self { filename, content })
    }

    /// 拡張子からカテゴリを決める。未対応なら `UnsupportedType`
    pub fn category(&self) -> Result<Category> {
        classify(&self.filename)
    }
}

pub fn classify(filename: &str) -> Result<Category> {
    Category::from_filename(filename).ok_or_else(|| IcodeError::UnsupportedType {
        filename: filename.to_string(),
    })
}
