//! 工作条目与分组

use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 一次提交的单位：一个结构文件 + 一个密度图 + 结果输出路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// 发现顺序中的位置（仅用于日志显示）
    pub index: usize,
    /// 本次运行内唯一：目录名 + "-" + 密度图文件名主干
    pub id: String,
    /// 结构文件绝对路径
    pub structure_file: PathBuf,
    /// 密度图绝对路径
    pub volume_file: PathBuf,
    /// 结果文件写入位置
    pub output_path: PathBuf,
}

impl WorkItem {
    pub fn new(
        index: usize,
        id: impl Into<String>,
        structure_file: impl Into<PathBuf>,
        volume_file: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            id: id.into(),
            structure_file: structure_file.into(),
            volume_file: volume_file.into(),
            output_path: output_path.into(),
        }
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{:>3} {}]", self.index, self.id)
    }
}

/// 分组：连续的一段条目，由一个会话顺序处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    /// 分组序号（从 0 开始）
    pub index: usize,
    pub items: Vec<WorkItem>,
}

impl Division {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}
