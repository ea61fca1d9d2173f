//! # CMM Submit
//!
//! 把成对的结构文件与密度图批量提交到 CMM 网页工具，下载每个条目的结果文件，
//! 并汇总成一份运行报告
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `PageDriver` - 带超时的页面操作
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个条目
//! - `SessionFactory` / `RemoteSession` - 远程提交能力
//! - `CmmSessionFactory` - 基于 Chromium 的实现
//! - `ErrorLogSink` - 追加写 error.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"的隔离处理
//! - `run_guarded` - 任何失败都只变成该条目的 Failure
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 分组、有界并发、结果汇总
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Timeouts, MAX_PARALLEL_SESSIONS};
pub use error::{AppError, Result};
pub use models::{Division, ItemOutcome, RunReport, RunSummary, WorkItem};
pub use orchestrator::{dry_run, App, Orchestrator, Preview, RunMode, SubmitOptions};
pub use services::{ErrorLogSink, RemoteSession, SessionFactory, SessionOptions};
