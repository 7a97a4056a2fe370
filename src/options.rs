use std::path::{Path, PathBuf};
use std::time::Duration;

/// エクスポート先のデフォルトエンドポイント
pub const DEFAULT_EXPORT_URL: &str =
    "https://ipa-generator-backend-production.up.railway.app/generate-ipa";

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq)]
pub struct AppOptions {
    /// プロジェクト保存先ディレクトリ（未指定時は `dirs::data_dir()/icodewin`）
    pub data_dir: Option<PathBuf>,
    /// リモートエクスポートのURL
    pub export_url: String,
    /// エクスポート要求のタイムアウト
    pub export_timeout: Duration,
    /// 置き換えられたプレビューハンドルを解放するまでの猶予
    pub preview_release_delay: Duration,
    /// 通知の表示時間
    pub notification_duration: Duration,
    /// デバッグログ出力先
    pub debug_log_path: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            export_url: DEFAULT_EXPORT_URL.to_string(),
            export_timeout: Duration::from_secs(60),
            preview_release_delay: Duration::from_millis(1000),
            notification_duration: crate::error::DEFAULT_NOTIFICATION_DURATION,
            debug_log_path: None,
        }
    }
}

/// 環境変数から読み取った上書き値
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionOverrides {
    pub data_dir: Option<PathBuf>,
    pub export_url: Option<String>,
    pub export_timeout: Option<Duration>,
    pub debug_log_path: Option<PathBuf>,
}

impl OptionOverrides {
    /// `ICODEWIN_*` 環境変数を読む
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let export_timeout = lookup("ICODEWIN_EXPORT_TIMEOUT_SECS").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    log::warn!("ignoring invalid ICODEWIN_EXPORT_TIMEOUT_SECS: {}", raw);
                    None
                }
            }
        });

        Self {
            data_dir: lookup("ICODEWIN_DATA_DIR").map(PathBuf::from),
            export_url: lookup("ICODEWIN_EXPORT_URL").filter(|url| !url.trim().is_empty()),
            export_timeout,
            debug_log_path: None,
        }
    }
}

impl AppOptions {
    /// 環境変数を反映した設定
    pub fn from_env() -> Self {
        Self::default().merged_with(&OptionOverrides::from_env())
    }

    pub fn merged_with(&self, overrides: &OptionOverrides) -> AppOptions {
        AppOptions {
            data_dir: overrides.data_dir.clone().or_else(|| self.data_dir.clone()),
            export_url: overrides
                .export_url
                .clone()
                .unwrap_or_else(|| self.export_url.clone()),
            export_timeout: overrides.export_timeout.unwrap_or(self.export_timeout),
            preview_release_delay: self.preview_release_delay,
            notification_duration: self.notification_duration,
            debug_log_path: overrides
                .debug_log_path
                .clone()
                .or_else(|| self.debug_log_path.clone()),
        }
    }

    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        match &self.data_dir {
            Some(path) => Some(path.clone()),
            None => default_data_dir(),
        }
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("icodewin"))
}

/// 親ディレクトリを作成
pub(crate) fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
