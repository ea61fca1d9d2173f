//! 单个分组处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一个分组的所有条目，是分组级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **打开会话**：每个分组一个会话，打开失败则整组记为失败
//! 2. **遍历条目**：严格按顺序处理 `Vec<WorkItem>`，上一个结束后才开始下一个
//! 3. **单条隔离**：每个条目经过 `run_guarded`，失败不影响后续条目
//! 4. **关闭会话**：无论结果如何都关闭
//! 5. **统计输出**：记录成功/失败数量

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::models::{Division, DivisionBatch, ItemOutcome};
use crate::services::{ErrorLogSink, RemoteSession, SessionFactory, SessionOptions};
use crate::workflow::run_guarded;

/// 处理单个分组
///
/// # 参数
/// - `factory`: 会话工厂
/// - `division`: 分组数据
/// - `options`: 会话参数，其中的 `verbosity` 同时决定逐条日志的级别
/// - `item_timeout`: 单个条目的总预算
/// - `sink`: 错误日志
///
/// # 返回
/// 返回本组每个条目的结果，顺序与分组内顺序一致
pub async fn process_division<F: SessionFactory>(
    factory: &F,
    division: &Division,
    options: &SessionOptions,
    item_timeout: Duration,
    sink: &ErrorLogSink,
) -> DivisionBatch {
    let label = division.index + 1;
    info!("[分组 {}] 开始处理，共 {} 个条目", label, division.len());

    let opened = AssertUnwindSafe(factory.open(options)).catch_unwind().await;
    let mut session = match opened {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return fail_division(division, &format!("无法打开会话: {}", e), sink).await,
        Err(_) => return fail_division(division, "无法打开会话: 会话初始化异常", sink).await,
    };

    let mut outcomes = Vec::with_capacity(division.len());
    for (position, item) in division.items.iter().enumerate() {
        if options.verbosity > 1 {
            info!("[分组 {}] 处理第 {}/{} 个条目 {}", label, position + 1, division.len(), item);
        } else {
            debug!("[分组 {}] 处理第 {}/{} 个条目 {}", label, position + 1, division.len(), item);
        }
        outcomes.push(run_guarded(&mut session, item, item_timeout, options.verbosity, sink).await);
    }

    match AssertUnwindSafe(session.close()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("[分组 {}] ⚠️ 关闭会话失败: {}", label, e),
        Err(_) => warn!("[分组 {}] ⚠️ 关闭会话时发生异常", label),
    }

    let batch = DivisionBatch {
        division_index: division.index,
        outcomes,
    };
    log_division_complete(&batch);
    batch
}

/// 会话无法打开：本组所有条目记为失败
async fn fail_division(division: &Division, reason: &str, sink: &ErrorLogSink) -> DivisionBatch {
    error!("[分组 {}] ❌ {}", division.index + 1, reason);

    let mut outcomes = Vec::with_capacity(division.len());
    for item in &division.items {
        if let Err(e) = sink.append(&item.id, reason).await {
            warn!("{} 写入错误日志失败: {}", item, e);
        }
        outcomes.push(ItemOutcome::failure(&item.id, reason));
    }

    DivisionBatch {
        division_index: division.index,
        outcomes,
    }
}

fn log_division_complete(batch: &DivisionBatch) {
    let succeeded = batch.outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        "[分组 {}] ✅ 分组处理完成: 成功 {}/{}",
        batch.division_index + 1,
        succeeded,
        batch.outcomes.len()
    );
}
