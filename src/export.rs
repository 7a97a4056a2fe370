//! リモートエクスポート
//!
//! プロジェクト全体をJSONで送信し、ビルド済みの成果物を受け取る。
//! 要求はワーカースレッドで1回だけ実行し、再試行はしない

use crate::error::{IcodeError, Result};
use crate::project::Project;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 成果物の拡張子
pub const ARTIFACT_EXTENSION: &str = "ipa";

/// エクスポート要求の本文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub project_name: String,
    /// `"html/index.html"` 形式のキー → 内容
    pub files: BTreeMap<String, String>,
}

impl ExportRequest {
    pub fn from_project(project: &Project) -> Self {
        Self {
            project_name: project.name.clone(),
            files: project.files.flatten(),
        }
    }

    /// ダウンロード時のファイル名
    pub fn artifact_filename(&self) -> String {
        format!("{}.{}", self.project_name, ARTIFACT_EXTENSION)
    }
}

/// 要求を送って成果物のバイト列を受け取る
pub trait ExportTransport: Send + Sync {
    fn send(&self, request: &ExportRequest) -> Result<Vec<u8>>;
}

/// HTTP POST によるエクスポート
pub struct HttpExporter {
    url: String,
    agent: ureq::Agent,
}

impl HttpExporter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl ExportTransport for HttpExporter {
    fn send(&self, request: &ExportRequest) -> Result<Vec<u8>> {
        log::info!(
            "exporting {} ({} files) to {}",
            request.project_name,
            request.files.len(),
            self.url
        );
        let response = self
            .agent
            .post(&self.url)
            .send_json(request)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => {
                    IcodeError::Transport(format!("Backend error (status {})", code))
                }
                ureq::Error::Transport(transport) => IcodeError::Transport(transport.to_string()),
            })?;

        let mut artifact = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut artifact)
            .map_err(|err| IcodeError::Transport(err.to_string()))?;
        Ok(artifact)
    }
}

/// 完了したエクスポート
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub artifact_filename: String,
    pub result: Result<Vec<u8>>,
}

/// エクスポートをワーカースレッドで実行し、完了をチャネルで受け取る
pub struct ExportRunner {
    transport: Arc<dyn ExportTransport>,
    sender: Sender<ExportOutcome>,
    receiver: Receiver<ExportOutcome>,
    in_flight: usize,
}

impl ExportRunner {
    pub fn new(transport: Arc<dyn ExportTransport>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            transport,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// 要求を送信する。呼び出し元はブロックしない
    pub fn start(&mut self, request: ExportRequest) {
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = transport.send(&request);
            let _ = sender.send(ExportOutcome {
                artifact_filename: request.artifact_filename(),
                result,
            });
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// 完了済みの結果をすべて取り出す
    pub fn poll(&mut self) -> Vec<ExportOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }

    /// 次の完了を待つ（コマンドライン用）
    pub fn wait(&mut self, timeout: Duration) -> Option<ExportOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                self.in_flight -= 1;
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
