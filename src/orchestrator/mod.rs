//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责分组、并发调度和结果汇总，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `partition` - 分组
//! - 把 `Vec<WorkItem>` 切成连续、大小有上限的分组
//!
//! ### `scheduler` - 有界并发调度器
//! - 每个分组一个任务，Semaphore 控制同时运行的数量
//!
//! ### `division_processor` - 单个分组处理器
//! - 打开会话，顺序处理本组条目，关闭会话
//!
//! ### `aggregator` - 结果汇总器
//! - 按完成顺序合并各组结果，RunReport 的唯一写入者
//!
//! ### `batch_processor` - 批量提交处理器
//! - `Orchestrator::submit` / `dry_run` / `App`
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<WorkItem>)
//!     ↓
//! scheduler (处理 Vec<Division>)
//!     ↓
//! division_processor (处理一个 Division)
//!     ↓
//! workflow::run_guarded (处理单个 WorkItem)
//!     ↓
//! services (能力层：session / error log / report)
//!     ↓
//! infrastructure (基础设施：PageDriver)
//! ```

pub mod aggregator;
pub mod batch_processor;
pub mod division_processor;
pub mod partition;
pub mod scheduler;

// 重新导出主要类型
pub use aggregator::ResultAggregator;
pub use batch_processor::{dry_run, App, DivisionPlan, Orchestrator, Preview, RunMode, SubmitOptions};
pub use division_processor::process_division;
pub use partition::partition;
pub use scheduler::{SchedulePlan, Scheduler};
