//! アプリケーションコントローラ
//!
//! コマンドを受けてプロジェクトモデル・タブ集合・エディタ・プレビューを更新し、
//! 発生した副作用の一覧を返す。状態はすべてこの構造体が所有する

mod command;

pub use command::{Command, Effect, FileSelection, Screen};

use crate::editor::{EditorBackend, EditorBridge};
use crate::error::{IcodeError, Notification, NotificationLevel, Result};
use crate::export::{ExportRequest, ExportRunner, ExportTransport, HttpExporter};
use crate::import::classify;
use crate::options::AppOptions;
use crate::preview::{self, PreviewHost, RenderSurface, SurfaceHandle};
use crate::project::{templates, Category, Project, RenameOutcome};
use crate::store::ProjectStore;
use crate::tabs::{TabKey, TabSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 開いているプロジェクトの作業状態
struct Session {
    project_id: String,
    tabs: TabSet,
}

/// コマンドディスパッチャ
pub struct Controller {
    store: ProjectStore,
    session: Option<Session>,
    editor: EditorBridge,
    preview: PreviewHost,
    exports: ExportRunner,
    options: AppOptions,
}

impl Controller {
    pub fn new(
        store: ProjectStore,
        editor: Box<dyn EditorBackend>,
        surface: Box<dyn RenderSurface>,
        options: AppOptions,
    ) -> Self {
        let transport = Arc::new(HttpExporter::new(
            options.export_url.clone(),
            options.export_timeout,
        ));
        Self {
            store,
            session: None,
            editor: EditorBridge::new(editor),
            preview: PreviewHost::new(surface, options.preview_release_delay),
            exports: ExportRunner::new(transport),
            options,
        }
    }

    /// エクスポート送信先を差し替える
    pub fn with_transport(mut self, transport: Arc<dyn ExportTransport>) -> Self {
        self.exports = ExportRunner::new(transport);
        self
    }

    // ===== 参照系 =====

    pub fn projects(&self) -> &[Project] {
        self.store.projects()
    }

    pub fn screen(&self) -> Screen {
        match &self.session {
            None => Screen::Dashboard,
            Some(session) => match session.tabs.active_key() {
                Some(key) => Screen::ProjectOpen(FileSelection::FileSelected(key.clone())),
                None => Screen::ProjectOpen(FileSelection::NoFileSelected),
            },
        }
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.session
            .as_ref()
            .and_then(|session| self.store.get(&session.project_id))
    }

    pub fn current_file(&self) -> Option<&TabKey> {
        self.session
            .as_ref()
            .and_then(|session| session.tabs.active_key())
    }

    pub fn tabs(&self) -> Option<&TabSet> {
        self.session.as_ref().map(|session| &session.tabs)
    }

    /// 現在のプロジェクトから合成したプレビュー文書
    pub fn preview_document(&self) -> Option<String> {
        self.current_project()
            .and_then(|project| preview::compose(&project.files))
    }

    pub fn current_preview(&self) -> Option<SurfaceHandle> {
        self.preview.current()
    }

    pub fn exports_in_flight(&self) -> usize {
        self.exports.in_flight()
    }

    // ===== コマンド処理 =====

    /// コマンドを処理して副作用を返す
    ///
    /// 未処理のエディタ変更を先に反映する。`NotFound` は何もしなかったものとして扱う
    pub fn dispatch(&mut self, command: Command) -> Result<Vec<Effect>> {
        let mut effects = self.pump_editor()?;
        log::debug!("dispatch {:?}", command);

        let result = match command {
            Command::CreateProject { name } => self.create_project(&name),
            Command::OpenProject { id } => self.open_project(&id),
            Command::DeleteProject { id } => self.delete_project(&id),
            Command::SetProjectIcon { id, icon } => self.set_project_icon(&id, &icon),
            Command::BackToDashboard => self.back_to_dashboard(),
            Command::OpenFile(key) => self.open_file(key),
            Command::CreateFile { category, name } => self.create_file(category, &name),
            Command::AddFile {
                category,
                filename,
                content,
                overwrite,
            } => self.add_file(category, &filename, &content, overwrite),
            Command::ImportFile {
                filename,
                content,
                overwrite,
            } => self.import_file(&filename, &content, overwrite),
            Command::RenameFile {
                category,
                old_name,
                new_name,
            } => self.rename_file(category, &old_name, &new_name),
            Command::DeleteFile(key) => self.delete_file(key),
            Command::ContentChanged => self.content_changed(),
            Command::PreviewLoaded(handle) => {
                self.preview.mark_loaded(handle);
                Ok(Vec::new())
            }
            Command::Export => self.export(),
        };

        match result {
            Ok(mut more) => {
                effects.append(&mut more);
                Ok(effects)
            }
            Err(error) if error.is_silent() => {
                log::debug!("ignored stale command: {}", error);
                Ok(effects)
            }
            Err(error) => Err(error),
        }
    }

    /// `dispatch` の結果を通知に変換する。失敗しない
    pub fn handle(&mut self, command: Command) -> Vec<Effect> {
        match self.dispatch(command) {
            Ok(effects) => effects,
            Err(error) => {
                log::warn!("{}", error);
                Notification::from_error(&error)
                    .map(|notification| {
                        vec![Effect::Notify(
                            notification.with_duration(self.options.notification_duration),
                        )]
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// エディタから届いた変更通知を反映する（複数件は1回の反映にまとめる）
    pub fn pump_editor(&mut self) -> Result<Vec<Effect>> {
        if self.editor.take_pending_changes() == 0 {
            return Ok(Vec::new());
        }
        self.content_changed()
    }

    /// 解放期限に達したプレビューハンドルを解放する
    pub fn tick(&mut self, now: Instant) -> Vec<SurfaceHandle> {
        self.preview.tick(now)
    }

    /// 完了したエクスポートを副作用に変換する
    pub fn poll_exports(&mut self) -> Vec<Effect> {
        let outcomes = self.exports.poll();
        outcomes
            .into_iter()
            .flat_map(|outcome| self.export_effects(outcome.artifact_filename, outcome.result))
            .collect()
    }

    /// 次のエクスポート完了を待つ
    pub fn wait_for_export(&mut self, timeout: Duration) -> Vec<Effect> {
        match self.exports.wait(timeout) {
            Some(outcome) => self.export_effects(outcome.artifact_filename, outcome.result),
            None => Vec::new(),
        }
    }

    // ===== プロジェクト操作 =====

    fn create_project(&mut self, name: &str) -> Result<Vec<Effect>> {
        let id = self.store.create_project(name)?.id.clone();
        let mut effects = vec![Effect::Persisted];
        effects.extend(self.open_project(&id)?);
        Ok(effects)
    }

    fn open_project(&mut self, id: &str) -> Result<Vec<Effect>> {
        let entry = self
            .store
            .get(id)
            .ok_or_else(|| IcodeError::not_found(id))?
            .files
            .entry_filename()
            .map(str::to_string);

        let mut effects = Vec::new();
        if self.session.is_some() {
            effects.extend(self.leave_project(true)?);
        }

        log::info!("opening project {}", id);
        self.session = Some(Session {
            project_id: id.to_string(),
            tabs: TabSet::new(),
        });
        effects.push(Effect::ProjectOpened { id: id.to_string() });

        match entry {
            Some(filename) => effects.extend(self.open_file(TabKey::new(Category::Markup, filename))?),
            None => {
                effects.push(Effect::ShowEmptyState);
                effects.push(self.recompose());
            }
        }
        Ok(effects)
    }

    fn back_to_dashboard(&mut self) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        if self.session.is_some() {
            effects.extend(self.leave_project(true)?);
        }
        effects.push(Effect::ShowDashboard);
        Ok(effects)
    }

    /// 作業状態を破棄する。`flush` ならアクティブバッファを先に書き戻す
    fn leave_project(&mut self, flush: bool) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        if flush && self.flush_active()? {
            effects.push(Effect::Persisted);
        }
        if let Some(mut session) = self.session.take() {
            session.tabs.close_all();
            log::info!("closed project {}", session.project_id);
        }
        self.editor.dispose();
        self.preview.release_all();
        Ok(effects)
    }

    fn delete_project(&mut self, id: &str) -> Result<Vec<Effect>> {
        let is_open = self
            .session
            .as_ref()
            .is_some_and(|session| session.project_id == id);
        if self.store.get(id).is_none() {
            return Err(IcodeError::not_found(id));
        }

        let mut effects = Vec::new();
        if is_open {
            // 削除対象なので書き戻さない
            effects.extend(self.leave_project(false)?);
        }
        self.store.delete_project(id)?;
        effects.push(Effect::Persisted);
        if is_open {
            effects.push(Effect::ShowDashboard);
        }
        Ok(effects)
    }

    fn set_project_icon(&mut self, id: &str, icon: &str) -> Result<Vec<Effect>> {
        self.store.set_icon(id, icon)?;
        Ok(vec![Effect::Persisted])
    }

    // ===== ファイル操作 =====

    fn open_file(&mut self, key: TabKey) -> Result<Vec<Effect>> {
        let session = self.session.as_mut().ok_or_else(no_project)?;
        let project = self
            .store
            .get(&session.project_id)
            .ok_or_else(|| IcodeError::not_found(session.project_id.clone()))?;
        let persisted = project
            .file(key.category, &key.filename)
            .ok_or_else(|| IcodeError::not_found(key.to_string()))?;

        // 編集は常に反映済みなので、差があるのは上書き追加された場合だけ
        let stale = session
            .tabs
            .get(&key)
            .is_some_and(|tab| tab.content != persisted);
        let tab = if stale {
            session.tabs.refresh(key.clone(), persisted)
        } else {
            session.tabs.open(key.clone(), persisted)
        };
        self.editor.show(&tab.content, tab.language);

        Ok(vec![Effect::FileOpened(key), self.recompose()])
    }

    fn create_file(&mut self, category: Category, name: &str) -> Result<Vec<Effect>> {
        let filename = category.normalize_filename(name)?;
        let content = templates::default_content(category, &filename);
        let mut effects = self.add_file(category, &filename, &content, false)?;
        effects.extend(self.open_file(TabKey::new(category, filename))?);
        Ok(effects)
    }

    fn add_file(
        &mut self,
        category: Category,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<Vec<Effect>> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(IcodeError::validation("Please enter a file name"));
        }
        let project = self.session_project_mut()?;
        project.add_file(category, filename, content, overwrite)?;
        self.store.save()?;
        log::info!("added {}/{}", category, filename);
        Ok(vec![Effect::Persisted, self.recompose()])
    }

    fn import_file(&mut self, filename: &str, content: &str, overwrite: bool) -> Result<Vec<Effect>> {
        if self.session.is_none() {
            return Err(no_project());
        }
        let category = classify(filename)?;
        let mut effects = self.add_file(category, filename, content, overwrite)?;
        effects.extend(self.open_file(TabKey::new(category, filename.trim()))?);
        Ok(effects)
    }

    fn rename_file(&mut self, category: Category, old_name: &str, new_name: &str) -> Result<Vec<Effect>> {
        let project = self.session_project_mut()?;
        let new_name = match project.rename_file(category, old_name, new_name)? {
            RenameOutcome::Unchanged => return Ok(Vec::new()),
            RenameOutcome::Renamed(new_name) => new_name,
        };

        let from = TabKey::new(category, old_name);
        let to = TabKey::new(category, new_name);
        if let Some(session) = self.session.as_mut() {
            session.tabs.rename(&from, to.clone());
        }
        self.store.save()?;
        log::info!("renamed {} to {}", from, to);
        Ok(vec![
            Effect::Persisted,
            Effect::FileRenamed { from, to },
            self.recompose(),
        ])
    }

    fn delete_file(&mut self, key: TabKey) -> Result<Vec<Effect>> {
        let project = self.session_project_mut()?;
        project.delete_file(key.category, &key.filename)?;

        let mut effects = Vec::new();
        let was_active = self
            .session
            .as_mut()
            .is_some_and(|session| session.tabs.close(&key));
        self.store.save()?;
        effects.push(Effect::Persisted);
        if was_active {
            self.editor.clear();
            effects.push(Effect::ShowEmptyState);
        }
        log::info!("deleted {}", key);
        effects.push(self.recompose());
        Ok(effects)
    }

    fn content_changed(&mut self) -> Result<Vec<Effect>> {
        if self.write_active(true)? {
            Ok(vec![Effect::Persisted, self.recompose()])
        } else {
            Ok(Vec::new())
        }
    }

    /// 画面遷移・エクスポート前の書き戻し。タブに変化があったときだけ保存する
    fn flush_active(&mut self) -> Result<bool> {
        self.write_active(false)
    }

    /// アクティブバッファの内容をタブとプロジェクトへ書き込み、保存する
    ///
    /// `notified` のときは、タブと同じ内容でもプロジェクト側と異なれば書き込む
    /// （上書き追加の後にタブと保存内容がずれている場合）。保存したら `true`
    fn write_active(&mut self, notified: bool) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        let Some(key) = session.tabs.active_key().cloned() else {
            return Ok(false);
        };
        let Some(value) = self.editor.value() else {
            return Ok(false);
        };
        let tab_changed = session.tabs.flush(&value).unwrap_or(false);

        let project = self
            .store
            .get_mut(&session.project_id)
            .ok_or_else(|| IcodeError::not_found(session.project_id.clone()))?;
        let diverged = project.file(key.category, &key.filename) != Some(value.as_str());
        if !tab_changed && !(notified && diverged) {
            return Ok(false);
        }
        project.set_content(key.category, &key.filename, &value)?;
        self.store.save()?;
        log::debug!("saved buffer {}", key);
        Ok(true)
    }

    // ===== プレビュー・エクスポート =====

    fn recompose(&mut self) -> Effect {
        match self.preview_document() {
            Some(document) => Effect::PreviewUpdated(self.preview.present(&document, Instant::now())),
            None => {
                self.preview.clear();
                Effect::PreviewCleared
            }
        }
    }

    fn export(&mut self) -> Result<Vec<Effect>> {
        if self.session.is_none() {
            return Err(IcodeError::validation("No project open!"));
        }
        let mut effects = Vec::new();
        if self.flush_active()? {
            effects.push(Effect::Persisted);
        }
        let project = self.current_project().ok_or_else(no_project)?;
        let request = ExportRequest::from_project(project);
        let project_name = request.project_name.clone();
        self.exports.start(request);

        effects.push(Effect::ExportStarted { project_name });
        effects.push(self.notify("Compiling...", NotificationLevel::Info));
        Ok(effects)
    }

    fn export_effects(&self, filename: String, result: Result<Vec<u8>>) -> Vec<Effect> {
        match result {
            Ok(bytes) => {
                log::info!("export finished: {} ({} bytes)", filename, bytes.len());
                vec![
                    Effect::Download { filename, bytes },
                    self.notify("Download started!", NotificationLevel::Info),
                ]
            }
            Err(error) => {
                log::warn!("export of {} failed: {}", filename, error);
                Notification::from_error(&error)
                    .map(|notification| {
                        Effect::Notify(notification.with_duration(self.options.notification_duration))
                    })
                    .into_iter()
                    .collect()
            }
        }
    }

    fn notify(&self, message: &str, level: NotificationLevel) -> Effect {
        Effect::Notify(
            Notification::with_level(message, level).with_duration(self.options.notification_duration),
        )
    }

    fn session_project_mut(&mut self) -> Result<&mut Project> {
        let session = self.session.as_ref().ok_or_else(no_project)?;
        self.store
            .get_mut(&session.project_id)
            .ok_or_else(|| IcodeError::not_found(session.project_id.clone()))
    }
}

fn no_project() -> IcodeError {
    IcodeError::not_found("no project open")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::HeadlessEditor;
    use crate::preview::MemorySurface;
    use crate::store::MemoryStore;

    fn controller() -> (Controller, HeadlessEditor, MemorySurface) {
        let editor = HeadlessEditor::new();
        let surface = MemorySurface::new();
        let store = ProjectStore::load(Box::new(MemoryStore::new())).unwrap();
        let controller = Controller::new(
            store,
            Box::new(editor.clone()),
            Box::new(surface.clone()),
            AppOptions::default(),
        );
        (controller, editor, surface)
    }

    #[test]
    fn test_create_project_opens_entry_file() {
        let (mut controller, editor, _) = controller();
        let effects = controller
            .dispatch(Command::CreateProject { name: "Demo".into() })
            .unwrap();

        assert_eq!(effects[0], Effect::Persisted);
        let index = TabKey::new(Category::Markup, "index.html");
        assert!(effects.contains(&Effect::FileOpened(index.clone())));
        assert_eq!(
            controller.screen(),
            Screen::ProjectOpen(FileSelection::FileSelected(index))
        );
        assert!(editor.text().unwrap().contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_open_project_without_markup_shows_empty_state() {
        let (mut controller, _, _) = controller();
        controller
            .dispatch(Command::CreateProject { name: "Bare".into() })
            .unwrap();
        controller
            .dispatch(Command::DeleteFile(TabKey::new(Category::Markup, "index.html")))
            .unwrap();
        let id = controller.current_project().unwrap().id.clone();
        controller.dispatch(Command::BackToDashboard).unwrap();

        let effects = controller.dispatch(Command::OpenProject { id }).unwrap();
        assert!(effects.contains(&Effect::ShowEmptyState));
        assert!(effects.contains(&Effect::PreviewCleared));
        assert_eq!(
            controller.screen(),
            Screen::ProjectOpen(FileSelection::NoFileSelected)
        );
    }

    #[test]
    fn test_unknown_project_is_silent_noop() {
        let (mut controller, _, _) = controller();
        let effects = controller
            .dispatch(Command::OpenProject { id: "project_0".into() })
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(controller.screen(), Screen::Dashboard);
    }

    #[test]
    fn test_import_without_project_is_silent_noop() {
        let (mut controller, _, _) = controller();
        let effects = controller.handle(Command::ImportFile {
            filename: "app.js".into(),
            content: "1".into(),
            overwrite: false,
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn test_handle_surfaces_validation_error() {
        let (mut controller, _, _) = controller();
        let effects = controller.handle(Command::CreateProject { name: "  ".into() });
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(notification)] if notification.level == NotificationLevel::Warning
        ));
        assert!(controller.projects().is_empty());
    }

    #[test]
    fn test_create_file_appends_extension_and_opens() {
        let (mut controller, editor, _) = controller();
        controller
            .dispatch(Command::CreateProject { name: "Demo".into() })
            .unwrap();
        controller
            .dispatch(Command::CreateFile {
                category: Category::Style,
                name: "theme".into(),
            })
            .unwrap();

        let key = TabKey::new(Category::Style, "theme.css");
        assert_eq!(controller.current_file(), Some(&key));
        assert!(editor.text().unwrap().starts_with("body {"));

        let err = controller
            .dispatch(Command::CreateFile {
                category: Category::Style,
                name: "theme.css".into(),
            })
            .unwrap_err();
        assert!(matches!(err, IcodeError::Conflict { .. }));
    }

    #[test]
    fn test_pending_edits_flushed_before_switching_files() {
        let (mut controller, editor, _) = controller();
        controller
            .dispatch(Command::CreateProject { name: "Demo".into() })
            .unwrap();
        editor.set_text("<p>typed</p>");

        // 変更通知を明示的に送らなくても、次のコマンドの前に反映される
        controller
            .dispatch(Command::OpenFile(TabKey::new(Category::Style, "style.css")))
            .unwrap();
        let project = controller.current_project().unwrap();
        assert_eq!(project.file(Category::Markup, "index.html"), Some("<p>typed</p>"));
    }

    #[test]
    fn test_delete_open_project_returns_to_dashboard() {
        let (mut controller, editor, surface) = controller();
        controller
            .dispatch(Command::CreateProject { name: "Gone".into() })
            .unwrap();
        let id = controller.current_project().unwrap().id.clone();

        let effects = controller.dispatch(Command::DeleteProject { id }).unwrap();
        assert!(effects.contains(&Effect::ShowDashboard));
        assert_eq!(controller.screen(), Screen::Dashboard);
        assert!(controller.projects().is_empty());
        assert_eq!(editor.disposed_count(), 1);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_delete_other_project_keeps_session() {
        let (mut controller, _, _) = controller();
        controller
            .dispatch(Command::CreateProject { name: "Other".into() })
            .unwrap();
        let other = controller.current_project().unwrap().id.clone();
        controller
            .dispatch(Command::CreateProject { name: "Current".into() })
            .unwrap();

        controller.dispatch(Command::DeleteProject { id: other }).unwrap();
        assert_eq!(controller.current_project().unwrap().name, "Current");
        assert!(controller.current_file().is_some());
    }

    #[test]
    fn test_export_without_project_is_reported() {
        let (mut controller, _, _) = controller();
        let effects = controller.handle(Command::Export);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(notification)] if notification.message == "No project open!"
        ));
    }
}
