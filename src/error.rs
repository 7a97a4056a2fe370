//! エラーハンドリングシステム
//!
//! エディタコア全体で使用される統一されたエラー型と、
//! ユーザー向け通知への変換を定義する。致命的なエラーは存在せず、
//! 最悪の場合でも空のエディタ／プレビュー状態に落ちるだけ。

use std::time::{Duration, Instant};
use thiserror::Error;

/// 通知のデフォルト表示時間
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(2200);

/// アプリケーション全体のエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IcodeError {
    /// 必須入力が空（再入力を促す）
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 名前の衝突（上書きかキャンセルを選ばせる）
    #[error("File {filename} already exists in {category}")]
    Conflict { category: String, filename: String },

    /// インポート対象の拡張子が未対応（その項目だけスキップ）
    #[error("File type not supported: {filename}")]
    UnsupportedType { filename: String },

    /// リモートエクスポートの失敗（再試行しない）
    #[error("Export failed: {0}")]
    Transport(String),

    /// 古い参照による操作（通知せず無視）
    #[error("Not found: {0}")]
    NotFound(String),

    /// 永続ストアの読み書きエラー
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IcodeError {
    pub fn validation(message: impl Into<String>) -> Self {
        IcodeError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        IcodeError::NotFound(what.into())
    }

    /// 利用者に見せずに握りつぶしてよいエラーか
    pub fn is_silent(&self) -> bool {
        matches!(self, IcodeError::NotFound(_))
    }
}

/// 通知レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// 一時的に表示される通知
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// 表示メッセージ
    pub message: String,
    /// レベル
    pub level: NotificationLevel,
    /// 表示開始時刻
    pub start_time: Instant,
    /// 表示持続時間
    pub duration: Duration,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(message, NotificationLevel::Info)
    }

    pub fn with_level(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            start_time: Instant::now(),
            duration: DEFAULT_NOTIFICATION_DURATION,
        }
    }

    /// エラーから通知を作る。`NotFound` は通知しない
    pub fn from_error(error: &IcodeError) -> Option<Self> {
        let (message, level) = match error {
            IcodeError::NotFound(_) => return None,
            IcodeError::Validation(message) => (message.clone(), NotificationLevel::Warning),
            IcodeError::Conflict { filename, .. } => (
                format!("File {} already exists. Overwrite?", filename),
                NotificationLevel::Warning,
            ),
            IcodeError::UnsupportedType { filename } => (
                format!("File type not supported: {}", filename),
                NotificationLevel::Warning,
            ),
            IcodeError::Transport(message) => {
                (format!("Error: {}", message), NotificationLevel::Error)
            }
            IcodeError::Storage(message) => {
                (format!("Could not save projects: {}", message), NotificationLevel::Error)
            }
        };
        Some(Self::with_level(message, level))
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.start_time.elapsed() >= self.duration
    }
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, IcodeError>;

impl From<std::io::Error> for IcodeError {
    fn from(error: std::io::Error) -> Self {
        IcodeError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for IcodeError {
    fn from(error: serde_json::Error) -> Self {
        IcodeError::Storage(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_silent() {
        let error = IcodeError::not_found("project_1");
        assert!(error.is_silent());
        assert!(Notification::from_error(&error).is_none());
    }

    #[test]
    fn test_unsupported_type_notification() {
        let error = IcodeError::UnsupportedType {
            filename: "data.txt".to_string(),
        };
        let notification = Notification::from_error(&error).unwrap();
        assert_eq!(notification.level, NotificationLevel::Warning);
        assert!(notification.message.contains("data.txt"));
        assert!(!notification.is_expired());
    }

    #[test]
    fn test_notification_expiry() {
        let mut notification = Notification::info("Compiled");
        assert!(!notification.is_expired());

        // 時間経過をシミュレート
        notification.start_time = Instant::now() - Duration::from_secs(3);
        assert!(notification.is_expired());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let error: IcodeError = io_error.into();
        assert!(matches!(error, IcodeError::Storage(message) if message.contains("disk full")));
    }
}
