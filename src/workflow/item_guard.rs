//! 单条目隔离 - 流程层
//!
//! 核心职责：一个条目的任何失败都只变成该条目的 Failure，不影响同组后续条目
//!
//! 覆盖的失败：
//! 1. 会话返回的错误（远程错误、步骤超时、缺少结果文件）
//! 2. 条目总预算超时
//! 3. 会话内部 panic

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::RemoteError;
use crate::models::{ItemOutcome, WorkItem};
use crate::services::{ErrorLogSink, RemoteSession};

/// 带隔离地处理一个条目
///
/// 失败时先写错误日志，再返回 Failure；成功时只返回 Success。
/// 超时或 panic 中断了条目时，调用 `abandon_item` 释放该条目占用的资源。
/// `verbosity` 不大于 1 时逐条成功日志降为 debug，失败日志始终输出。
pub async fn run_guarded<S: RemoteSession>(
    session: &mut S,
    item: &WorkItem,
    item_timeout: Duration,
    verbosity: u8,
    sink: &ErrorLogSink,
) -> ItemOutcome {
    let attempt = AssertUnwindSafe(tokio::time::timeout(item_timeout, session.process(item)))
        .catch_unwind()
        .await;

    let failure = match attempt {
        Ok(Ok(Ok(output))) => {
            if verbosity > 1 {
                info!("{} ✓ 已下载: {}", item, output.display());
            } else {
                debug!("{} ✓ 已下载: {}", item, output.display());
            }
            return ItemOutcome::success(&item.id);
        }
        Ok(Ok(Err(e))) => e,
        Ok(Err(_elapsed)) => {
            abandon(session, item).await;
            RemoteError::timeout("处理条目", item_timeout)
        }
        Err(panic) => {
            abandon(session, item).await;
            RemoteError::Rejected(format!("会话内部异常: {}", panic_message(panic.as_ref())))
        }
    };

    let reason = failure.to_string();
    error!("{} ❌ 处理失败: {}", item, reason);
    if let Err(e) = sink.append(&item.id, &format!("{:?}\n{}", failure, reason)).await {
        warn!("{} 写入错误日志失败: {}", item, e);
    }
    ItemOutcome::failure(&item.id, reason)
}

async fn abandon<S: RemoteSession>(session: &mut S, item: &WorkItem) {
    if AssertUnwindSafe(session.abandon_item())
        .catch_unwind()
        .await
        .is_err()
    {
        warn!("{} ⚠️ 释放中断条目的资源时发生异常", item);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
