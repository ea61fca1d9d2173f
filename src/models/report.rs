//! 条目结果与运行报告

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// 单个条目的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success { id: String },
    Failure { id: String, reason: String },
}

impl ItemOutcome {
    pub fn success(id: impl Into<String>) -> Self {
        ItemOutcome::Success { id: id.into() }
    }

    pub fn failure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ItemOutcome::Failure {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ItemOutcome::Success { id } | ItemOutcome::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// 一个分组处理完后交给汇总器的不可变结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionBatch {
    pub division_index: usize,
    pub outcomes: Vec<ItemOutcome>,
}

/// 运行报告
///
/// - `processed`：按完成顺序记录的条目 ID
/// - `processed = succeeded ∪ failed`，且两者不相交
/// - `failure_reasons` 的键恰好等于 `failed`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub processed: Vec<String>,
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub failure_reasons: BTreeMap<String, String>,
}

impl RunReport {
    /// 是否已经记录过该 ID
    pub fn contains(&self, id: &str) -> bool {
        self.succeeded.contains(id) || self.failed.contains(id)
    }

    /// 检查报告不变量
    pub fn check_invariants(&self) -> bool {
        let processed: BTreeSet<&String> = self.processed.iter().collect();
        let union: BTreeSet<&String> = self.succeeded.union(&self.failed).collect();
        let reason_keys: BTreeSet<&String> = self.failure_reasons.keys().collect();
        let failed: BTreeSet<&String> = self.failed.iter().collect();

        processed.len() == self.processed.len()
            && processed == union
            && self.succeeded.is_disjoint(&self.failed)
            && reason_keys == failed
    }

    /// 与另一份报告是否等价（忽略 processed 的完成顺序）
    pub fn is_equivalent(&self, other: &RunReport) -> bool {
        let mine: BTreeSet<&String> = self.processed.iter().collect();
        let theirs: BTreeSet<&String> = other.processed.iter().collect();
        self.processed.len() == other.processed.len()
            && mine == theirs
            && self.succeeded == other.succeeded
            && self.failed == other.failed
            && self.failure_reasons == other.failure_reasons
    }

    /// 生成用于显示的汇总
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            processed: self.processed.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            failed_ids: self
                .processed
                .iter()
                .filter(|id| self.failed.contains(*id))
                .cloned()
                .collect(),
        }
    }
}

/// 运行结束后的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 失败条目，按完成顺序
    pub failed_ids: Vec<String>,
}
