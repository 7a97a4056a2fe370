//! 描画面のハンドル管理
//!
//! 合成ごとに新しいハンドルを作り、置き換えられた古いハンドルは
//! 新しいハンドルの読み込み完了と一定時間の経過を待ってから解放する。
//! 読み込み完了が届かない描画面でも、置き換えから猶予の2倍が過ぎれば解放する

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// 描画面が返す表示可能リソースの参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

/// 文書テキストを表示する外部の描画面
pub trait RenderSurface {
    /// 文書を読み込ませ、表示用ハンドルを返す
    fn load(&mut self, document: &str) -> SurfaceHandle;

    /// ハンドルを解放する
    fn release(&mut self, handle: SurfaceHandle);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: SurfaceHandle,
    created: Instant,
    loaded: bool,
}

/// 解放待ちのハンドルと、置き換えられた時刻
#[derive(Debug, Clone, Copy)]
struct Retired {
    entry: Entry,
    since: Instant,
}

/// プレビューのハンドル寿命を管理する
pub struct PreviewHost {
    surface: Box<dyn RenderSurface>,
    release_delay: Duration,
    current: Option<Entry>,
    superseded: Vec<Retired>,
}

impl PreviewHost {
    pub fn new(surface: Box<dyn RenderSurface>, release_delay: Duration) -> Self {
        Self {
            surface,
            release_delay,
            current: None,
            superseded: Vec::new(),
        }
    }

    /// 新しい文書を表示する。直前のハンドルは解放待ちになる
    pub fn present(&mut self, document: &str, now: Instant) -> SurfaceHandle {
        let handle = self.surface.load(document);
        let entry = Entry {
            handle,
            created: now,
            loaded: false,
        };
        if let Some(previous) = self.current.replace(entry) {
            self.retire(previous, now);
        }
        handle
    }

    /// 表示を空にする
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.retire(previous, Instant::now());
        }
    }

    /// 描画面からの読み込み完了通知。現在のハンドルでなければ `false`
    pub fn mark_loaded(&mut self, handle: SurfaceHandle) -> bool {
        match self.current.as_mut() {
            Some(entry) if entry.handle == handle => {
                entry.loaded = true;
                true
            }
            _ => false,
        }
    }

    /// 解放期限に達した古いハンドルを解放し、その一覧を返す
    ///
    /// 現在のハンドルが読み込み完了するまでは待つが、置き換えから
    /// 猶予の2倍を過ぎたものは読み込み完了を待たずに解放する
    pub fn tick(&mut self, now: Instant) -> Vec<SurfaceHandle> {
        let ready = self.current.map_or(true, |entry| entry.loaded);
        let delay = self.release_delay;
        let (due, waiting): (Vec<Retired>, Vec<Retired>) =
            self.superseded.drain(..).partition(|retired| {
                let aged = now.saturating_duration_since(retired.entry.created) >= delay;
                let overdue = now.saturating_duration_since(retired.since) >= delay * 2;
                (ready && aged) || overdue
            });
        self.superseded = waiting;

        due.into_iter()
            .map(|retired| {
                self.surface.release(retired.entry.handle);
                retired.entry.handle
            })
            .collect()
    }

    /// 全ハンドルを即座に解放する（プロジェクトを閉じるとき）
    pub fn release_all(&mut self) {
        self.clear();
        for retired in self.superseded.drain(..) {
            self.surface.release(retired.entry.handle);
        }
    }

    pub fn current(&self) -> Option<SurfaceHandle> {
        self.current.map(|entry| entry.handle)
    }

    pub fn pending_release(&self) -> usize {
        self.superseded.len()
    }

    fn retire(&mut self, entry: Entry, since: Instant) {
        self.superseded.push(Retired { entry, since });
    }
}

#[derive(Debug, Default)]
struct MemorySurfaceState {
    next: u64,
    live: BTreeMap<SurfaceHandle, String>,
    released: Vec<SurfaceHandle>,
}

/// メモリ上の描画面。クローンは同じ状態を共有する
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    state: Rc<RefCell<MemorySurfaceState>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, handle: SurfaceHandle) -> Option<String> {
        self.state.borrow().live.get(&handle).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn released(&self) -> Vec<SurfaceHandle> {
        self.state.borrow().released.clone()
    }
}

impl RenderSurface for MemorySurface {
    fn load(&mut self, document: &str) -> SurfaceHandle {
        let mut state = self.state.borrow_mut();
        state.next += 1;
        let handle = SurfaceHandle(state.next);
        state.live.insert(handle, document.to_string());
        handle
    }

    fn release(&mut self, handle: SurfaceHandle) {
        let mut state = self.state.borrow_mut();
        if state.live.remove(&handle).is_some() {
            state.released.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_previous_handle_waits_for_new_load() {
        let surface = MemorySurface::new();
        let mut host = PreviewHost::new(Box::new(surface.clone()), DELAY);
        let start = Instant::now();

        let first = host.present("<p>1</p>", start);
        host.mark_loaded(first);
        let second = host.present("<p>2</p>", start + Duration::from_millis(10));

        // 期限を過ぎても新しいハンドルが未読み込みなら解放しない
        assert!(host.tick(start + Duration::from_millis(1500)).is_empty());
        assert_eq!(surface.live_count(), 2);

        assert!(host.mark_loaded(second));
        assert_eq!(host.tick(start + Duration::from_millis(1500)), vec![first]);
        assert_eq!(surface.live_count(), 1);
        assert_eq!(surface.document(second).as_deref(), Some("<p>2</p>"));
    }

    #[test]
    fn test_release_waits_for_delay() {
        let surface = MemorySurface::new();
        let mut host = PreviewHost::new(Box::new(surface.clone()), DELAY);
        let start = Instant::now();

        let first = host.present("a", start);
        let second = host.present("b", start + Duration::from_millis(100));
        host.mark_loaded(second);

        assert!(host.tick(start + Duration::from_millis(500)).is_empty());
        assert_eq!(host.pending_release(), 1);
        assert_eq!(host.tick(start + DELAY), vec![first]);
        assert_eq!(host.pending_release(), 0);
    }

    #[test]
    fn test_unloaded_surface_still_releases_after_cap() {
        let surface = MemorySurface::new();
        let mut host = PreviewHost::new(Box::new(surface.clone()), DELAY);
        let start = Instant::now();

        let mut handles = Vec::new();
        for step in 0..50u64 {
            handles.push(host.present("x", start + Duration::from_millis(step)));
        }
        assert!(host.tick(start + Duration::from_millis(1500)).is_empty());

        let released = host.tick(start + Duration::from_secs(3600));
        assert_eq!(released.len(), 49);
        assert_eq!(surface.live_count(), 1);
        assert_eq!(host.current(), handles.last().copied());
    }

    #[test]
    fn test_stale_load_notification_ignored() {
        let surface = MemorySurface::new();
        let mut host = PreviewHost::new(Box::new(surface), DELAY);
        let start = Instant::now();

        let first = host.present("a", start);
        host.present("b", start);
        assert!(!host.mark_loaded(first));
    }

    #[test]
    fn test_release_all() {
        let surface = MemorySurface::new();
        let mut host = PreviewHost::new(Box::new(surface.clone()), DELAY);
        let start = Instant::now();

        host.present("a", start);
        host.present("b", start);
        host.release_all();
        assert_eq!(surface.live_count(), 0);
        assert_eq!(host.current(), None);
        assert_eq!(surface.released().len(), 2);
    }
}
