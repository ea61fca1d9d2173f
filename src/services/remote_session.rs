//! 远程会话能力 - 业务能力层
//!
//! 描述"把一个条目提交给远程工具并取回结果"的能力，不关心分组和并发。

use std::future::Future;
use std::path::PathBuf;

use crate::config::Timeouts;
use crate::error::RemoteError;
use crate::models::WorkItem;

/// 打开会话时的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// 是否无头
    pub headless: bool,
    /// 会话内逐条日志的详细程度
    pub verbosity: u8,
    pub timeouts: Timeouts,
}

/// 会话工厂：每个分组调用一次 `open`
pub trait SessionFactory: Send + Sync + 'static {
    type Session: RemoteSession;

    /// 打开一个新会话；失败时整个分组记为失败
    fn open(
        &self,
        options: &SessionOptions,
    ) -> impl Future<Output = Result<Self::Session, RemoteError>> + Send;
}

/// 一个已打开的远程会话，按顺序处理条目
pub trait RemoteSession: Send + 'static {
    /// 提交单个条目，成功时返回结果文件路径
    fn process(
        &mut self,
        item: &WorkItem,
    ) -> impl Future<Output = Result<PathBuf, RemoteError>> + Send;

    /// `process` 被超时或 panic 中断后调用，释放该条目留下的资源（如未关闭的页面）
    fn abandon_item(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// 关闭会话
    fn close(self) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
