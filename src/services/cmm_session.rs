//! CMM 网页提交会话 - 业务能力层
//!
//! 用 Chromium 完成单个条目的提交：打开页面 → 上传两个文件 → 运行分析 → 下载 JSON。
//! 每个会话持有一个浏览器，每个条目使用一个新页面。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, Page};
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::RemoteError;
use crate::infrastructure::PageDriver;
use crate::models::WorkItem;
use crate::services::remote_session::{RemoteSession, SessionFactory, SessionOptions};

const STRUCTURE_INPUT: &str = r#"input[id="pdbfile"]"#;
const VOLUME_INPUT: &str = r#"input[id="densfile-2fo"]"#;
const ANALYSIS_BUTTON: &str = "#show_container > table:nth-child(3) > tbody > tr:nth-child(2) > td > table > tbody > tr:nth-child(9) > td > h5 > b > button";

const JSON_LINK_READY: &str = r#"
    Array.from(document.querySelectorAll('a'))
        .some(a => (a.textContent || '').includes('JSON'))
"#;
const CLICK_JSON_LINK: &str = r#"
    (() => {
        const link = Array.from(document.querySelectorAll('a'))
            .find(a => (a.textContent || '').includes('JSON'));
        if (!link) { return false; }
        link.click();
        return true;
    })()
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const ANALYSIS_POLL_INTERVAL: Duration = Duration::from_secs(2);
const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

/// 为每个分组启动一个浏览器会话
pub struct CmmSessionFactory {
    target_url: String,
    user_agent: String,
    download_root: PathBuf,
    next_session: AtomicUsize,
}

impl CmmSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            target_url: config.target_url.clone(),
            user_agent: config.user_agent.clone(),
            download_root: config.download_dir.clone(),
            next_session: AtomicUsize::new(0),
        }
    }
}

impl SessionFactory for CmmSessionFactory {
    type Session = CmmSession;

    async fn open(&self, options: &SessionOptions) -> Result<CmmSession, RemoteError> {
        let session_no = self.next_session.fetch_add(1, Ordering::SeqCst);
        let download_dir = self
            .download_root
            .join(format!("session-{}-{}", std::process::id(), session_no));
        fs::create_dir_all(&download_dir).await?;

        let (browser, handler_task) =
            browser::launch_browser(options.headless, options.timeouts.step(), &download_dir)
                .await?;

        Ok(CmmSession {
            browser,
            handler_task,
            download_dir,
            target_url: self.target_url.clone(),
            user_agent: self.user_agent.clone(),
            options: *options,
            current_page: None,
        })
    }
}

/// 一个浏览器会话
pub struct CmmSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    download_dir: PathBuf,
    target_url: String,
    user_agent: String,
    options: SessionOptions,
    /// 正在处理的条目所用页面；条目被中断时由 `abandon_item` 关闭
    current_page: Option<Page>,
}

impl CmmSession {
    fn step(&self, item: &WorkItem, message: &str) {
        if self.options.verbosity > 1 {
            info!("{}   > {}", item, message);
        } else {
            debug!("{}   > {}", item, message);
        }
    }

    async fn submit(&self, driver: &PageDriver, item: &WorkItem) -> Result<PathBuf, RemoteError> {
        let timeouts = self.options.timeouts;

        self.step(item, &format!("访问网页: {}", self.target_url));
        driver.goto(&self.target_url).await?;

        self.step(item, &format!("设置结构文件: {}", file_name(&item.structure_file)));
        driver
            .set_input_file(STRUCTURE_INPUT, &item.structure_file)
            .await?;

        self.step(item, &format!("设置密度图: {}", file_name(&item.volume_file)));
        driver.set_input_file(VOLUME_INPUT, &item.volume_file).await?;

        self.step(item, "运行分析...");
        driver.click(ANALYSIS_BUTTON, timeouts.step()).await?;
        driver
            .wait_until(
                "等待分析结果",
                JSON_LINK_READY,
                timeouts.analysis(),
                ANALYSIS_POLL_INTERVAL,
            )
            .await?;

        self.step(item, &format!("下载结果: {}", item.output_path.display()));
        clear_dir(&self.download_dir).await?;
        let clicked: bool = driver.eval_as(CLICK_JSON_LINK).await?;
        if !clicked {
            return Err(RemoteError::ElementNotFound {
                selector: "a:has-text('JSON')".to_string(),
                reason: "结果页面没有 JSON 下载链接".to_string(),
            });
        }
        let downloaded = wait_for_download(&self.download_dir, timeouts.download()).await?;
        move_file(&downloaded, &item.output_path).await?;

        // 校验
        if !fs::try_exists(&item.output_path).await.unwrap_or(false) {
            return Err(RemoteError::MissingOutput {
                path: item.output_path.clone(),
            });
        }
        Ok(item.output_path.clone())
    }
}

impl RemoteSession for CmmSession {
    async fn process(&mut self, item: &WorkItem) -> Result<PathBuf, RemoteError> {
        self.step(item, "开始处理");

        let page = self.browser.new_page("about:blank").await?;
        self.current_page = Some(page.clone());
        let driver = PageDriver::new(page, self.options.timeouts.step());
        let result = async {
            driver
                .page()
                .set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
                .await?;
            driver.mask_automation().await?;
            self.submit(&driver, item).await
        }
        .await;

        self.current_page = None;
        if let Err(e) = driver.close().await {
            warn!("{} 关闭页面失败: {}", item, e);
        }
        result
    }

    async fn abandon_item(&mut self) {
        let Some(page) = self.current_page.take() else {
            return;
        };
        debug!("关闭被中断条目的页面");
        match tokio::time::timeout(self.options.timeouts.step(), page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("关闭被中断条目的页面失败: {}", e),
            Err(_) => warn!("关闭被中断条目的页面超时"),
        }
    }

    async fn close(mut self) -> Result<(), RemoteError> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            debug!("等待浏览器退出失败: {}", e);
        }
        self.handler_task.abort();
        if let Err(e) = fs::remove_dir_all(&self.download_dir).await {
            debug!("清理下载目录失败 ({}): {}", self.download_dir.display(), e);
        }
        closed?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn clear_dir(dir: &Path) -> Result<(), RemoteError> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        fs::remove_file(entry.path()).await?;
    }
    Ok(())
}

/// 等待下载目录中出现一个已完成的文件
async fn wait_for_download(dir: &Path, limit: Duration) -> Result<PathBuf, RemoteError> {
    let deadline = Instant::now() + limit;
    loop {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let partial = path
                .to_str()
                .is_some_and(|p| p.ends_with(PARTIAL_DOWNLOAD_SUFFIX));
            if !partial && entry.file_type().await?.is_file() {
                return Ok(path);
            }
        }
        if Instant::now() >= deadline {
            return Err(RemoteError::DownloadFailed(format!(
                "{:?} 内没有完成下载",
                limit
            )));
        }
        sleep(POLL_INTERVAL).await;
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<(), RemoteError> {
    if fs::rename(from, to).await.is_err() {
        // 跨文件系统时退回复制
        fs::copy(from, to).await?;
        fs::remove_file(from).await?;
    }
    Ok(())
}
