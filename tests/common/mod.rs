//! 测试用的脚本化会话

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cmm_submit::error::RemoteError;
use cmm_submit::{ErrorLogSink, RemoteSession, SessionFactory, SessionOptions, WorkItem};

/// 条目的模拟行为
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(String),
    Panic,
    Sleep(Duration),
}

/// 同时活跃的会话探针
#[derive(Debug, Default)]
pub struct ActiveProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// 按条目 ID 返回预设结果的会话工厂
#[derive(Default)]
pub struct ScriptedFactory {
    behaviors: HashMap<String, Behavior>,
    /// 第 N 次 open（从 0 开始）失败
    failing_opens: Vec<usize>,
    hold: Duration,
    opens: AtomicUsize,
    pub probe: Arc<ActiveProbe>,
    /// 处理过的条目，按调用顺序
    pub calls: Arc<Mutex<Vec<String>>>,
    /// 每次 open 收到的参数
    pub seen_options: Arc<Mutex<Vec<SessionOptions>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(id.to_string(), behavior);
        self
    }

    pub fn failing_open(mut self, open_no: usize) -> Self {
        self.failing_opens.push(open_no);
        self
    }

    /// 每个条目处理耗时
    pub fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub struct ScriptedSession {
    behaviors: HashMap<String, Behavior>,
    hold: Duration,
    probe: Arc<ActiveProbe>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl SessionFactory for ScriptedFactory {
    type Session = ScriptedSession;

    async fn open(&self, options: &SessionOptions) -> Result<ScriptedSession, RemoteError> {
        self.seen_options.lock().unwrap().push(*options);
        let open_no = self.opens.fetch_add(1, Ordering::SeqCst);
        if self.failing_opens.contains(&open_no) {
            return Err(RemoteError::LaunchFailed("browser binary not found".to_string()));
        }
        self.probe.enter();
        Ok(ScriptedSession {
            behaviors: self.behaviors.clone(),
            hold: self.hold,
            probe: self.probe.clone(),
            calls: self.calls.clone(),
        })
    }
}

impl RemoteSession for ScriptedSession {
    async fn process(&mut self, item: &WorkItem) -> Result<PathBuf, RemoteError> {
        self.calls.lock().unwrap().push(item.id.clone());
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        match self.behaviors.get(&item.id).cloned().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => Ok(item.output_path.clone()),
            Behavior::Fail(reason) => Err(RemoteError::Rejected(reason)),
            Behavior::Panic => panic!("unexpected page state for {}", item.id),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(item.output_path.clone())
            }
        }
    }

    async fn close(self) -> Result<(), RemoteError> {
        self.probe.leave();
        Ok(())
    }
}

pub fn items(ids: &[&str]) -> Vec<WorkItem> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            WorkItem::new(
                i,
                *id,
                format!("/data/{id}/model.pdb"),
                format!("/data/{id}/map.mrc"),
                format!("/data/{id}/CMM_results.json"),
            )
        })
        .collect()
}

/// 收集 INFO 及以上日志的缓冲区
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// 在当前线程安装订阅器，返回的 guard 存活期间日志写入缓冲区
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn sink() -> (tempfile::TempDir, Arc<ErrorLogSink>) {
    let tmp = tempfile::tempdir().unwrap();
    let sink = Arc::new(ErrorLogSink::new(tmp.path().join("error.txt")));
    (tmp, sink)
}
