use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（致命，开始前终止）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 输入发现错误（致命，调度前终止）
    #[error("输入错误: {0}")]
    Discovery(#[from] DiscoveryError),
    /// 远程交互错误
    #[error("远程交互错误: {0}")]
    Remote(#[from] RemoteError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误（InvalidConfiguration）
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 并行会话数超出范围
    #[error("并行会话数必须在 1..={max} 之间，实际为 {value}")]
    ParallelismOutOfRange { value: usize, max: usize },
    /// 每组条目数为 0
    #[error("每组条目数必须大于 0")]
    ZeroItemsPerDivision,
    /// 文件扩展名格式错误
    #[error("扩展名格式错误 '{value}': {reason}")]
    InvalidExtensions { value: String, reason: String },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("解析配置文件失败 ({path}): {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 输入发现错误（DiscoveryError）
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 输入目录不存在
    #[error("目录不存在: {}", path.display())]
    DirectoryNotFound { path: PathBuf },
    /// 读取目录失败
    #[error("读取目录失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 缺少指定扩展名的文件
    #[error("在 {} 中找不到 .{extension} 文件", folder.display())]
    MissingFile { folder: PathBuf, extension: String },
    /// 指定扩展名的文件不止一个
    #[error("{} 中有 {count} 个 .{extension} 文件，只允许一个", folder.display())]
    MultipleFiles {
        folder: PathBuf,
        extension: String,
        count: usize,
    },
    /// 条目 ID 重复
    #[error("条目 ID 重复: {id}")]
    DuplicateItemId { id: String },
}

/// 远程交互错误（RemoteInteractionFailure / DivisionFatalFailure）
#[derive(Debug, Error)]
pub enum RemoteError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    /// 某一步骤超时
    #[error("{stage} 超时 ({after:?})")]
    Timeout { stage: String, after: Duration },
    /// 页面元素不存在
    #[error("找不到页面元素 '{selector}': {reason}")]
    ElementNotFound { selector: String, reason: String },
    /// 下载未完成
    #[error("下载失败: {0}")]
    DownloadFailed(String),
    /// 输出文件不存在
    #[error("找不到下载的结果文件: {}", path.display())]
    MissingOutput { path: PathBuf },
    /// 浏览器协议错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    /// 本地文件操作失败
    #[error("本地文件操作失败: {0}")]
    Io(#[from] std::io::Error),
    /// 远程返回的其他失败（原样保留描述）
    #[error("{0}")]
    Rejected(String),
}

impl RemoteError {
    /// 创建超时错误
    pub fn timeout(stage: impl Into<String>, after: Duration) -> Self {
        RemoteError::Timeout {
            stage: stage.into(),
            after,
        }
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<tokio::sync::AcquireError> for AppError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        AppError::Other(format!("并发许可获取失败: {}", err))
    }
}

/// 应用程序结果类型
pub type Result<T> = std::result::Result<T, AppError>;
