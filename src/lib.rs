//! icodewin - HTML/CSS/JS project editor core
//!
//! プロジェクト／タブモデルとライブプレビュー合成の実装

// コアモジュール
pub mod error;
pub mod logging;
pub mod options;

// データ層
pub mod project;
pub mod store;

// 編集層
pub mod editor;
pub mod tabs;

// ロジック層
pub mod controller;
pub mod export;
pub mod import;

// 表示層
pub mod preview;

// 公開API
pub use controller::{Command, Controller, Effect, FileSelection, Screen};
pub use error::{IcodeError, Result};
pub use options::AppOptions;
pub use project::{Category, Project};
pub use tabs::{Tab, TabKey, TabSet};
