//! 批量提交处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量条目的提交和资源管理。
//!
//! ## 核心功能
//!
//! 1. **参数校验**：并行度、分组大小、条目 ID 唯一性，任何问题都在开始前终止
//! 2. **分组**：把条目切成连续分组（`partition`）
//! 3. **并发控制**：`Scheduler` 用 Semaphore 限制同时运行的分组数
//! 4. **结果汇总**：`ResultAggregator` 按完成顺序合并为 `RunReport`
//! 5. **预演模式**：`dry_run` 只输出分组计划，不做任何远程交互
//! 6. **全局统计**：无论详细程度如何，结束时都输出 成功/已处理 与失败列表
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个条目的细节
//! - **配置显式传递**：超时等参数都在 `SubmitOptions` 中，没有全局状态
//! - **单一路径**：`max_concurrent = 1` 只是许可数为 1 的同一调度器

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{validate_parallelism, Config, FileExtensions, Timeouts};
use crate::error::Result;
use crate::models::{self, RunReport, WorkItem};
use crate::orchestrator::aggregator::ResultAggregator;
use crate::orchestrator::partition::partition;
use crate::orchestrator::scheduler::{SchedulePlan, Scheduler};
use crate::services::{
    report_writer, CmmSessionFactory, ErrorLogSink, SessionFactory, SessionOptions,
};
use crate::utils::logging;

/// 一次提交的全部参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitOptions {
    pub verbosity: u8,
    pub max_concurrent: usize,
    pub items_per_division: usize,
    pub headless: bool,
    /// 多个分组并行时，会话内的逐条日志降为静默
    pub quiet_pooled_sessions: bool,
    pub timeouts: Timeouts,
}

impl SubmitOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            verbosity: config.verbosity,
            max_concurrent: config.max_concurrent,
            items_per_division: config.items_per_division,
            headless: config.headless,
            quiet_pooled_sessions: config.quiet_pooled_sessions,
            timeouts: config.timeouts,
        }
    }

    /// 传给每个会话的参数
    pub fn session_options(&self) -> SessionOptions {
        let pooled = self.max_concurrent > 1;
        SessionOptions {
            headless: self.headless,
            verbosity: if pooled && self.quiet_pooled_sessions {
                0
            } else {
                self.verbosity
            },
            timeouts: self.timeouts,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_parallelism(self.max_concurrent)?;
        if self.items_per_division == 0 {
            return Err(crate::error::ConfigError::ZeroItemsPerDivision.into());
        }
        Ok(())
    }
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 预演结果
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub options: SubmitOptions,
    pub item_count: usize,
    pub divisions: Vec<DivisionPlan>,
    pub first_item: Option<WorkItem>,
}

/// 一个分组的计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivisionPlan {
    pub index: usize,
    pub item_ids: Vec<String>,
}

/// 预演：只计算分组计划，不做任何远程交互
pub fn dry_run(items: &[WorkItem], options: &SubmitOptions) -> Result<Preview> {
    options.validate()?;
    models::ensure_unique_ids(items)?;

    let divisions = partition(items, options.items_per_division)?
        .into_iter()
        .map(|d| DivisionPlan {
            index: d.index,
            item_ids: d.ids(),
        })
        .collect();

    Ok(Preview {
        options: *options,
        item_count: items.len(),
        divisions,
        first_item: items.first().cloned(),
    })
}

/// 批量提交编排器
pub struct Orchestrator<F: SessionFactory> {
    scheduler: Scheduler<F>,
}

impl<F: SessionFactory> Orchestrator<F> {
    pub fn new(factory: Arc<F>, sink: Arc<ErrorLogSink>) -> Self {
        Self {
            scheduler: Scheduler::new(factory, sink),
        }
    }

    /// 提交所有条目并返回运行报告
    ///
    /// 配置错误与 ID 重复在开始前返回错误；单个条目或分组的失败记录在报告中。
    pub async fn submit(&self, items: Vec<WorkItem>, options: &SubmitOptions) -> Result<RunReport> {
        options.validate()?;
        models::ensure_unique_ids(&items)?;

        let divisions = partition(&items, options.items_per_division)?;
        logging::log_plan(items.len(), divisions.len(), options.max_concurrent);

        let plan = SchedulePlan {
            max_concurrent: options.max_concurrent,
            session: options.session_options(),
            item_timeout: options.timeouts.item(),
        };

        let mut aggregator = ResultAggregator::new();
        self.scheduler.run(divisions, plan, &mut aggregator).await?;

        logging::print_final_stats(&aggregator.summary());
        Ok(aggregator.into_report())
    }
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 只输出计划
    DryRun,
    /// 真正提交
    Submit,
}

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用（校验配置）
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        logging::log_startup(&config);
        Ok(Self { config })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, mode: RunMode) -> Result<Option<RunReport>> {
        let extensions = FileExtensions::parse(&self.config.extensions)?;
        let items = models::loaders::discover_with_output_name(
            &self.config.input_folder,
            &extensions,
            &self.config.output_file_name,
        )
        .await?;

        if items.is_empty() {
            warn!("⚠️ 没有找到待处理的条目");
        }

        let options = SubmitOptions::from_config(&self.config);
        match mode {
            RunMode::DryRun => {
                let preview = dry_run(&items, &options)?;
                logging::log_preview(&preview);
                Ok(None)
            }
            RunMode::Submit => {
                let sink = Arc::new(ErrorLogSink::new(self.config.error_log_file.clone()));
                if let Err(e) = sink.begin_run().await {
                    warn!("⚠️ 无法写入错误日志: {}", e);
                }

                let factory = Arc::new(CmmSessionFactory::new(&self.config));
                let report = Orchestrator::new(factory, sink).submit(items, &options).await?;

                report_writer::save_json(&report, &self.config.report_file).await?;
                info!("错误日志: {}", self.config.error_log_file.display());
                Ok(Some(report))
            }
        }
    }
}
