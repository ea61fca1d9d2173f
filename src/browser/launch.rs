use std::path::Path;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::RemoteError;

/// 启动浏览器，下载文件保存到 `download_dir`
///
/// 返回浏览器和后台事件处理任务；关闭浏览器后应中止该任务。
pub async fn launch_browser(
    headless: bool,
    request_timeout: Duration,
    download_dir: &Path,
) -> Result<(Browser, JoinHandle<()>), RemoteError> {
    info!("🚀 启动浏览器 (无头: {})...", headless);

    let mut builder = BrowserConfig::builder()
        .request_timeout(request_timeout)
        .window_size(1920, 1080)
        .no_sandbox()
        .args(vec!["--disable-gpu", "--disable-dev-shm-usage", "--lang=en-US"]);
    builder = if headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        RemoteError::LaunchFailed(e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        RemoteError::LaunchFailed(e.to_string())
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let params = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.to_string_lossy().into_owned())
        .build()
        .map_err(RemoteError::LaunchFailed)?;
    browser.execute(params).await?;
    debug!("下载目录: {}", download_dir.display());

    Ok((browser, handler_task))
}
