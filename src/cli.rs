use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::config::Config;
use crate::orchestrator::{App, RunMode};
use crate::utils::logging;

#[derive(Parser, Debug)]
#[command(name = "cmm-submit")]
#[command(about = "Submit model/volume pairs to the CMM web server and download the results")]
pub struct Args {
    /// 输入目录，每个子目录包含一个结构文件和一个密度图
    #[arg(short = 'i', long)]
    pub input_folder: Option<PathBuf>,

    /// 结构文件与密度图的扩展名，如 "pdb,mrc"
    #[arg(short = 'f', long)]
    pub format: Option<String>,

    /// 同时运行的浏览器会话数（最多 4）
    #[arg(short = 'c', long)]
    pub n_cpus: Option<usize>,

    /// 每个分组的条目数
    #[arg(short = 'n', long)]
    pub n_files_per_div: Option<usize>,

    /// 详细程度（0-3）
    #[arg(short = 'v', long)]
    pub verbose: Option<u8>,

    /// 无头模式（1/0, true/false）
    #[arg(short = 'b', long, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub headless: Option<bool>,

    /// 真正提交；否则只预演（1/0, true/false）
    #[arg(short = 'r', long, action = ArgAction::Set, value_parser = BoolishValueParser::new(), default_value_t = false)]
    pub run: bool,

    /// 配置文件路径；未指定时读取 ./cmm-submit.toml（若存在）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 运行报告输出路径
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// 错误日志路径
    #[arg(long)]
    pub error_log: Option<PathBuf>,
}

impl Args {
    pub fn mode(&self) -> RunMode {
        if self.run {
            RunMode::Submit
        } else {
            RunMode::DryRun
        }
    }

    /// 命令行参数覆盖配置（默认值 → 配置文件 → 环境变量 → 命令行）
    pub fn apply(&self, config: Config) -> Config {
        Config {
            input_folder: self.input_folder.clone().unwrap_or(config.input_folder),
            extensions: self.format.clone().unwrap_or(config.extensions),
            max_concurrent: self.n_cpus.unwrap_or(config.max_concurrent),
            items_per_division: self.n_files_per_div.unwrap_or(config.items_per_division),
            verbosity: self.verbose.unwrap_or(config.verbosity),
            headless: self.headless.unwrap_or(config.headless),
            report_file: self.report.clone().unwrap_or(config.report_file),
            error_log_file: self.error_log.clone().unwrap_or(config.error_log_file),
            ..config
        }
    }
}

/// 解析配置并运行
///
/// 单个条目失败不算进程失败；只有配置或输入目录有问题时返回错误。
pub async fn dispatch(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref())
        .context("无法加载配置")?
        .with_env_overrides();
    let config = args.apply(config);

    logging::init(config.verbosity);

    let app = App::initialize(config).context("配置无效")?;
    app.run(args.mode()).await.context("运行失败")?;
    Ok(())
}
