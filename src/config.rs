use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 同时运行的浏览器会话上限（保护远程服务）
pub const MAX_PARALLEL_SESSIONS: usize = 4;

/// 未指定 `--config` 时尝试读取的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "cmm-submit.toml";

/// 程序配置文件
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 输入目录（每个子目录一个条目）
    pub input_folder: PathBuf,
    /// 结构文件与密度图的扩展名，逗号分隔，如 "pdb,mrc"
    pub extensions: String,
    /// 同时运行的会话数量
    pub max_concurrent: usize,
    /// 每个分组包含的条目数
    pub items_per_division: usize,
    /// 详细程度：0 安静，1 进度，2 每个条目，3 全部
    pub verbosity: u8,
    /// 是否以无头模式启动浏览器
    pub headless: bool,
    /// 并行模式下是否关闭会话内的逐条日志
    pub quiet_pooled_sessions: bool,
    /// 目标URL
    pub target_url: String,
    /// 浏览器 User-Agent
    pub user_agent: String,
    /// 结果文件名（写在每个条目目录下）
    pub output_file_name: String,
    /// 错误日志文件
    pub error_log_file: PathBuf,
    /// 运行报告文件
    pub report_file: PathBuf,
    /// 浏览器下载临时目录
    pub download_dir: PathBuf,
    /// 各类超时
    pub timeouts: Timeouts,
}

/// 超时设置（秒）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// 单个页面操作（导航、填写表单）
    pub step_secs: u64,
    /// 等待远程计算完成
    pub analysis_secs: u64,
    /// 等待下载完成
    pub download_secs: u64,
    /// 单个条目的总预算
    pub item_secs: u64,
}

impl Timeouts {
    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn analysis(&self) -> Duration {
        Duration::from_secs(self.analysis_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn item(&self) -> Duration {
        Duration::from_secs(self.item_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step_secs: 30,
            analysis_secs: 600,
            download_secs: 30,
            item_secs: 900,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("volumes"),
            extensions: "pdb,mrc".to_string(),
            max_concurrent: 1,
            items_per_division: 1,
            verbosity: 1,
            headless: true,
            quiet_pooled_sessions: true,
            target_url: "https://cmm.minorlab.org/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".to_string(),
            output_file_name: "CMM_results.json".to_string(),
            error_log_file: PathBuf::from("error.txt"),
            report_file: PathBuf::from("run.json"),
            download_dir: std::env::temp_dir().join("cmm-submit-downloads"),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// 读取 TOML 配置文件；未指定路径时尝试默认文件，不存在则使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::ParseFailed { path, source })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env_overrides(self) -> Self {
        Self::with_overrides_from(self, |name| std::env::var(name).ok())
    }

    fn with_overrides_from(self, var: impl Fn(&str) -> Option<String>) -> Self {
        let timeouts = Timeouts {
            step_secs: parse_var(var("STEP_TIMEOUT_SECS")).unwrap_or(self.timeouts.step_secs),
            analysis_secs: parse_var(var("ANALYSIS_TIMEOUT_SECS")).unwrap_or(self.timeouts.analysis_secs),
            download_secs: parse_var(var("DOWNLOAD_TIMEOUT_SECS")).unwrap_or(self.timeouts.download_secs),
            item_secs: parse_var(var("ITEM_TIMEOUT_SECS")).unwrap_or(self.timeouts.item_secs),
        };
        Self {
            max_concurrent: parse_var(var("MAX_CONCURRENT_SESSIONS")).unwrap_or(self.max_concurrent),
            items_per_division: parse_var(var("ITEMS_PER_DIVISION")).unwrap_or(self.items_per_division),
            verbosity: parse_var(var("VERBOSITY")).unwrap_or(self.verbosity),
            headless: parse_var(var("HEADLESS")).unwrap_or(self.headless),
            quiet_pooled_sessions: parse_var(var("QUIET_POOLED_SESSIONS")).unwrap_or(self.quiet_pooled_sessions),
            target_url: var("TARGET_URL").unwrap_or(self.target_url),
            error_log_file: var("ERROR_LOG_FILE").map(PathBuf::from).unwrap_or(self.error_log_file),
            report_file: var("REPORT_FILE").map(PathBuf::from).unwrap_or(self.report_file),
            download_dir: var("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or(self.download_dir),
            timeouts,
            ..self
        }
    }

    /// 校验并行度、分组大小和扩展名
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_parallelism(self.max_concurrent)?;
        if self.items_per_division == 0 {
            return Err(ConfigError::ZeroItemsPerDivision);
        }
        FileExtensions::parse(&self.extensions)?;
        Ok(())
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

pub fn validate_parallelism(max_concurrent: usize) -> Result<(), ConfigError> {
    if max_concurrent == 0 || max_concurrent > MAX_PARALLEL_SESSIONS {
        return Err(ConfigError::ParallelismOutOfRange {
            value: max_concurrent,
            max: MAX_PARALLEL_SESSIONS,
        });
    }
    Ok(())
}

/// 结构文件与密度图文件的扩展名（不含点）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileExtensions {
    pub structure: String,
    pub volume: String,
}

impl FileExtensions {
    /// 解析 "pdb,mrc" 形式的字符串：第一个是结构文件，第二个是密度图
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidExtensions {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = value
            .split(',')
            .map(|s| s.trim().trim_start_matches('.'))
            .collect();
        if parts.len() != 2 {
            return Err(invalid("需要恰好两个扩展名"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("扩展名不能为空"));
        }
        if parts[0].eq_ignore_ascii_case(parts[1]) {
            return Err(invalid("两个扩展名不能相同"));
        }

        Ok(Self {
            structure: parts[0].to_string(),
            volume: parts[1].to_string(),
        })
    }
}
