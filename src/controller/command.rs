//! コントローラへの入力コマンドと、その結果として発生する副作用

use crate::error::Notification;
use crate::preview::SurfaceHandle;
use crate::project::Category;
use crate::tabs::TabKey;

/// ユーザー操作・非同期完了を表すコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 新規プロジェクトを作成して開く
    CreateProject { name: String },
    OpenProject { id: String },
    DeleteProject { id: String },
    /// エンコード済みアイコンを設定する
    SetProjectIcon { id: String, icon: String },
    BackToDashboard,
    OpenFile(TabKey),
    /// 雛形付きの新規ファイルを作成して開く
    CreateFile { category: Category, name: String },
    /// ファイルを追加する（タブは更新しない）
    AddFile {
        category: Category,
        filename: String,
        content: String,
        overwrite: bool,
    },
    /// ドロップされたファイルの読み込み完了
    ImportFile {
        filename: String,
        content: String,
        overwrite: bool,
    },
    RenameFile {
        category: Category,
        old_name: String,
        new_name: String,
    },
    DeleteFile(TabKey),
    /// エディタの内容変更通知
    ContentChanged,
    /// 描画面の読み込み完了通知
    PreviewLoaded(SurfaceHandle),
    /// リモートエクスポートを開始する
    Export,
}

/// コマンド処理の結果、ホスト側が反映すべき副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// プロジェクト一覧を書き戻した
    Persisted,
    ShowDashboard,
    ProjectOpened { id: String },
    FileOpened(TabKey),
    FileRenamed { from: TabKey, to: TabKey },
    /// ファイル未選択の画面を表示する
    ShowEmptyState,
    PreviewUpdated(SurfaceHandle),
    PreviewCleared,
    Notify(Notification),
    ExportStarted { project_name: String },
    /// 成果物をダウンロードとして提示する
    Download { filename: String, bytes: Vec<u8> },
}

/// ファイル選択状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    NoFileSelected,
    FileSelected(TabKey),
}

/// 画面状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    ProjectOpen(FileSelection),
}
