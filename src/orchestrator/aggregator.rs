//! 结果汇总器：RunReport 的唯一写入者

use tracing::debug;

use crate::error::DiscoveryError;
use crate::models::{DivisionBatch, ItemOutcome, RunReport, RunSummary};

/// 按分组完成顺序合并结果
#[derive(Debug, Default)]
pub struct ResultAggregator {
    report: RunReport,
    divisions_merged: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个分组的结果
    ///
    /// 同一个 ID 出现第二次时报错，已合并的内容保持不变。
    pub fn merge(&mut self, batch: DivisionBatch) -> Result<(), DiscoveryError> {
        for outcome in &batch.outcomes {
            if self.report.contains(outcome.id()) {
                return Err(DiscoveryError::DuplicateItemId {
                    id: outcome.id().to_string(),
                });
            }
        }
        // 组内重复
        let mut ids: Vec<&str> = batch.outcomes.iter().map(ItemOutcome::id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(DiscoveryError::DuplicateItemId {
                id: pair[0].to_string(),
            });
        }

        debug!(
            "合并第 {} 组结果 ({} 个条目)",
            batch.division_index + 1,
            batch.outcomes.len()
        );
        for outcome in batch.outcomes {
            match outcome {
                ItemOutcome::Success { id } => {
                    self.report.processed.push(id.clone());
                    self.report.succeeded.insert(id);
                }
                ItemOutcome::Failure { id, reason } => {
                    self.report.processed.push(id.clone());
                    self.report.failed.insert(id.clone());
                    self.report.failure_reasons.insert(id, reason);
                }
            }
        }
        self.divisions_merged += 1;
        Ok(())
    }

    pub fn divisions_merged(&self) -> usize {
        self.divisions_merged
    }

    pub fn summary(&self) -> RunSummary {
        self.report.summary()
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }
}
