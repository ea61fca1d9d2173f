//! 页面驱动 - 基础设施层
//!
//! 持有一个 Page，只暴露带超时的页面操作能力

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};

use crate::error::RemoteError;

/// 隐藏自动化特征的脚本，每个新页面执行一次
const STEALTH_SCRIPTS: [&str; 2] = [
    r#"
    if (navigator.mediaDevices) {
        Object.defineProperty(navigator.mediaDevices, 'enumerateDevices', {
            get: () => () => []
        });
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });
    "#,
];

/// 页面驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 每个操作都有自己的超时
/// - 不认识 WorkItem，不处理业务流程
pub struct PageDriver {
    page: Page,
    step_timeout: Duration,
}

impl PageDriver {
    pub fn new(page: Page, step_timeout: Duration) -> Self {
        Self { page, step_timeout }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 隐藏 webdriver 等特征
    pub async fn mask_automation(&self) -> Result<(), RemoteError> {
        for script in STEALTH_SCRIPTS {
            self.eval(script).await?;
        }
        Ok(())
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, RemoteError> {
        let js_code = js_code.into();
        let result = self
            .bounded("执行脚本", self.step_timeout, self.page.evaluate(js_code))
            .await??;
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, RemoteError> {
        let value = self.eval(js_code).await?;
        serde_json::from_value(value)
            .map_err(|e| RemoteError::Rejected(format!("脚本返回值无法解析: {}", e)))
    }

    /// 导航到指定 URL
    pub async fn goto(&self, url: &str) -> Result<(), RemoteError> {
        self.bounded(format!("打开 {}", url), self.step_timeout, self.page.goto(url))
            .await??;
        Ok(())
    }

    /// 给文件输入框设置文件
    pub async fn set_input_file(&self, selector: &str, file: &Path) -> Result<(), RemoteError> {
        let element = self
            .bounded(
                format!("查找 {}", selector),
                self.step_timeout,
                self.page.find_element(selector),
            )
            .await?
            .map_err(|e| RemoteError::ElementNotFound {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;

        let params = SetFileInputFilesParams::builder()
            .files(vec![file.to_string_lossy().into_owned()])
            .node_id(element.node_id)
            .build()
            .map_err(RemoteError::Rejected)?;
        self.bounded(
            format!("设置文件 {}", selector),
            self.step_timeout,
            self.page.execute(params),
        )
        .await??;
        Ok(())
    }

    /// 点击元素
    pub async fn click(&self, selector: &str, limit: Duration) -> Result<(), RemoteError> {
        let stage = format!("点击 {}", selector);
        self.bounded(stage, limit, async {
            let element = self.page.find_element(selector).await.map_err(|e| {
                RemoteError::ElementNotFound {
                    selector: selector.to_string(),
                    reason: e.to_string(),
                }
            })?;
            element.click().await?;
            Ok::<(), RemoteError>(())
        })
        .await?
    }

    /// 轮询执行返回布尔值的脚本，直到为 true 或超时
    pub async fn wait_until(
        &self,
        stage: &str,
        js_condition: &str,
        limit: Duration,
        interval: Duration,
    ) -> Result<(), RemoteError> {
        let deadline = Instant::now() + limit;
        loop {
            if self.eval_as::<bool>(js_condition).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RemoteError::timeout(stage, limit));
            }
            sleep(interval).await;
        }
    }

    /// 关闭页面
    pub async fn close(self) -> Result<(), RemoteError> {
        self.page.close().await?;
        Ok(())
    }

    async fn bounded<F: Future>(
        &self,
        stage: impl Into<String>,
        limit: Duration,
        fut: F,
    ) -> Result<F::Output, RemoteError> {
        timeout(limit, fut)
            .await
            .map_err(|_| RemoteError::timeout(stage, limit))
    }
}
