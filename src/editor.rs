//! エディタブリッジ
//!
//! 外部のテキスト編集ウィジェットを不透明なバッファとして扱うためのアダプタ

use crate::project::Language;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// エディタ側のモデル識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub usize);

/// 編集ウィジェットが提供する機能
pub trait EditorBackend {
    /// テキストと言語からモデルを作る
    fn create_model(&mut self, text: &str, language: Language) -> ModelHandle;

    /// 表示中のモデルを切り替える
    fn set_model(&mut self, handle: ModelHandle);

    /// 表示中モデルの現在のテキスト
    fn get_value(&self) -> String;

    /// 内容変更時に呼ばれるリスナーを登録する
    fn on_content_changed(&mut self, listener: Box<dyn FnMut()>);

    /// エディタを破棄する
    fn dispose(&mut self);
}

/// コントローラから見たエディタ
///
/// 変更通知は件数として溜め、コントローラが `take_pending_changes` で回収する
pub struct EditorBridge {
    backend: Box<dyn EditorBackend>,
    pending: Rc<Cell<usize>>,
    attached: bool,
    current: Option<ModelHandle>,
}

impl EditorBridge {
    pub fn new(backend: Box<dyn EditorBackend>) -> Self {
        Self {
            backend,
            pending: Rc::new(Cell::new(0)),
            attached: false,
            current: None,
        }
    }

    /// テキストを新しいモデルとして表示する
    pub fn show(&mut self, text: &str, language: Language) -> ModelHandle {
        self.attach();
        let handle = self.backend.create_model(text, language);
        self.backend.set_model(handle);
        self.current = Some(handle);
        // モデル切り替え自体は編集ではない
        self.pending.set(0);
        handle
    }

    /// 表示中のテキスト。モデルが無ければ `None`
    pub fn value(&self) -> Option<String> {
        self.current.map(|_| self.backend.get_value())
    }

    pub fn current_model(&self) -> Option<ModelHandle> {
        self.current
    }

    /// 未処理の変更通知の件数を取り出す
    pub fn take_pending_changes(&self) -> usize {
        self.pending.replace(0)
    }

    /// モデルを外して表示を空にする（エディタ自体は残す）
    pub fn clear(&mut self) {
        self.current = None;
        self.pending.set(0);
    }

    pub fn dispose(&mut self) {
        if self.attached {
            self.backend.dispose();
        }
        self.attached = false;
        self.clear();
    }

    fn attach(&mut self) {
        if self.attached {
            return;
        }
        let pending = Rc::clone(&self.pending);
        self.backend
            .on_content_changed(Box::new(move || pending.set(pending.get() + 1)));
        self.attached = true;
    }
}

#[derive(Default)]
struct HeadlessState {
    models: Vec<(String, Language)>,
    current: Option<usize>,
    listener: Option<Box<dyn FnMut()>>,
    disposed_count: usize,
}

/// 画面を持たないエディタ実装。クローンは同じ状態を共有する
#[derive(Clone, Default)]
pub struct HeadlessEditor {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 表示中モデルのテキストを置き換え、変更を通知する
    pub fn set_text(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        let Some(index) = state.current else {
            return;
        };
        state.models[index].0 = text.to_string();
        if let Some(listener) = state.listener.as_mut() {
            listener();
        }
    }

    /// 表示中テキストの末尾に追記する
    pub fn type_text(&self, text: &str) {
        let current = self.text();
        if let Some(mut value) = current {
            value.push_str(text);
            self.set_text(&value);
        }
    }

    pub fn text(&self) -> Option<String> {
        let state = self.state.borrow();
        state.current.map(|index| state.models[index].0.clone())
    }

    pub fn language(&self) -> Option<Language> {
        let state = self.state.borrow();
        state.current.map(|index| state.models[index].1)
    }

    pub fn disposed_count(&self) -> usize {
        self.state.borrow().disposed_count
    }
}

impl EditorBackend for HeadlessEditor {
    fn create_model(&mut self, text: &str, language: Language) -> ModelHandle {
        let mut state = self.state.borrow_mut();
        state.models.push((text.to_string(), language));
        ModelHandle(state.models.len() - 1)
    }

    fn set_model(&mut self, handle: ModelHandle) {
        let mut state = self.state.borrow_mut();
        if handle.0 < state.models.len() {
            state.current = Some(handle.0);
        }
    }

    fn get_value(&self) -> String {
        self.text().unwrap_or_default()
    }

    fn on_content_changed(&mut self, listener: Box<dyn FnMut()>) {
        self.state.borrow_mut().listener = Some(listener);
    }

    fn dispose(&mut self) {
        let mut state = self.state.borrow_mut();
        state.models.clear();
        state.current = None;
        state.listener = None;
        state.disposed_count += 1;
    }
}
