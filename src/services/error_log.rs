//! 错误日志写入服务 - 业务能力层
//!
//! 只负责"追加写 error.txt"能力，不关心流程

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::FileError;

/// 错误日志
///
/// 职责：
/// - 只追加，从不截断
/// - 多个分组并发写入时，每条记录整体写入，互不交错
/// - 每条记录写完立即落盘，运行中断也不会丢失
pub struct ErrorLogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入本次运行的分隔头
    pub async fn begin_run(&self) -> Result<(), FileError> {
        let header = format!(
            "\n{}\n运行开始 - {}\n{}\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        self.write_entry(&header).await
    }

    /// 追加一条错误记录
    ///
    /// # 参数
    /// - `item_id`: 条目ID
    /// - `error_text`: 完整错误信息（可以多行）
    pub async fn append(&self, item_id: &str, error_text: &str) -> Result<(), FileError> {
        debug!("写入错误日志: 条目 {} | 长度: {}", item_id, error_text.len());
        self.write_entry(&format_entry(item_id, error_text)).await
    }

    async fn write_entry(&self, entry: &str) -> Result<(), FileError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let entry = entry.to_string();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(entry.as_bytes())?;
            file.sync_data()
        })
        .await
        .map_err(|e| FileError::WriteFailed {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| FileError::WriteFailed {
            path: self.path.clone(),
            source,
        })
    }
}

fn format_entry(item_id: &str, error_text: &str) -> String {
    let indented = format!("\n{}", error_text).replace('\n', "\n       ");
    format!(
        "\n [!] {} Error in label = {}: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        item_id,
        indented
    )
}
