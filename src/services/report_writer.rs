//! 运行报告写入服务

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::FileError;

/// 将数据以格式化 JSON 写入文件
pub async fn save_json<T: Serialize>(data: &T, path: &Path) -> Result<(), FileError> {
    info!("💾 正在保存运行结果...");

    let json = serde_json::to_string_pretty(data)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| FileError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|source| FileError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

    info!("✓ 已保存至: {}", path.display());
    Ok(())
}
