//! 有界并发调度器
//!
//! 每个分组一个 tokio 任务，同时在跑的分组数不超过 `max_concurrent`。
//! 许可按提交顺序发放，并随任务一起移动，任务以任何方式结束都会释放。
//! 分组结果通过 channel 按完成顺序交给汇总器。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::validate_parallelism;
use crate::error::Result;
use crate::models::{Division, DivisionBatch, ItemOutcome};
use crate::orchestrator::aggregator::ResultAggregator;
use crate::orchestrator::division_processor;
use crate::services::{ErrorLogSink, SessionFactory, SessionOptions};

/// 调度参数
#[derive(Debug, Clone, Copy)]
pub struct SchedulePlan {
    pub max_concurrent: usize,
    pub session: SessionOptions,
    pub item_timeout: Duration,
}

/// 有界并发调度器
pub struct Scheduler<F: SessionFactory> {
    factory: Arc<F>,
    sink: Arc<ErrorLogSink>,
}

impl<F: SessionFactory> Scheduler<F> {
    pub fn new(factory: Arc<F>, sink: Arc<ErrorLogSink>) -> Self {
        Self { factory, sink }
    }

    /// 运行所有分组，结果合并进 `aggregator`
    pub async fn run(
        &self,
        divisions: Vec<Division>,
        plan: SchedulePlan,
        aggregator: &mut ResultAggregator,
    ) -> Result<()> {
        validate_parallelism(plan.max_concurrent)?;

        let semaphore = Arc::new(Semaphore::new(plan.max_concurrent));
        let (tx, mut rx) = mpsc::unbounded_channel::<DivisionBatch>();
        let mut handles: Vec<(usize, Vec<String>, JoinHandle<()>)> =
            Vec::with_capacity(divisions.len());

        for division in divisions {
            let permit = semaphore.clone().acquire_owned().await?;
            debug!("[分组 {}] 获得并发许可", division.index + 1);

            while let Ok(batch) = rx.try_recv() {
                aggregator.merge(batch)?;
            }

            let index = division.index;
            let ids = division.ids();
            let factory = self.factory.clone();
            let sink = self.sink.clone();
            let tx = tx.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let batch = division_processor::process_division(
                    factory.as_ref(),
                    &division,
                    &plan.session,
                    plan.item_timeout,
                    &sink,
                )
                .await;
                let _ = tx.send(batch);
            });
            handles.push((index, ids, handle));
        }
        drop(tx);

        while let Some(batch) = rx.recv().await {
            aggregator.merge(batch)?;
        }

        // 任务 panic 时没有结果送达，整组补记为失败
        for (index, ids, handle) in handles {
            if let Err(e) = handle.await {
                error!("[分组 {}] 任务执行失败: {}", index + 1, e);
                let reason = format!("分组任务异常终止: {}", e);
                for id in &ids {
                    if let Err(log_err) = self.sink.append(id, &reason).await {
                        error!("写入错误日志失败: {}", log_err);
                    }
                }
                aggregator.merge(DivisionBatch {
                    division_index: index,
                    outcomes: ids
                        .into_iter()
                        .map(|id| ItemOutcome::failure(id, reason.clone()))
                        .collect(),
                })?;
            }
        }

        Ok(())
    }
}
