use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::config::FileExtensions;
use crate::error::DiscoveryError;
use crate::models::work_item::WorkItem;

/// 结果文件的默认名称
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "CMM_results.json";

/// 扫描输入目录，每个子目录生成一个 WorkItem
///
/// 每个子目录必须恰好包含一个结构文件和一个密度图文件。
/// 隐藏目录与普通文件会被跳过；子目录按名称排序。
pub async fn discover(
    folder: &Path,
    extensions: &FileExtensions,
) -> Result<Vec<WorkItem>, DiscoveryError> {
    discover_with_output_name(folder, extensions, DEFAULT_OUTPUT_FILE_NAME).await
}

pub async fn discover_with_output_name(
    folder: &Path,
    extensions: &FileExtensions,
    output_file_name: &str,
) -> Result<Vec<WorkItem>, DiscoveryError> {
    info!("📁 正在扫描输入目录: {}", folder.display());

    let root = absolute(folder)?;
    if !fs::try_exists(&root).await.unwrap_or(false) {
        return Err(DiscoveryError::DirectoryNotFound { path: root });
    }

    let mut subfolders = Vec::new();
    for entry in list_dir(&root).await? {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.is_empty() || name.starts_with('.') {
            continue;
        }
        if fs::metadata(&entry).await.map(|m| m.is_dir()).unwrap_or(false) {
            subfolders.push(entry);
        }
    }
    subfolders.sort();

    let mut items = Vec::with_capacity(subfolders.len());
    for (index, dir) in subfolders.into_iter().enumerate() {
        let files = list_dir(&dir).await?;
        let volume = single_with_extension(&dir, &files, &extensions.volume)?;
        let structure = single_with_extension(&dir, &files, &extensions.structure)?;

        // 非 UTF-8 名称按有损转换生成 ID，目录本身仍按原路径访问
        let folder_name = dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let id = format!("{}-{}", folder_name, leading_stem(&volume));
        debug!("发现条目 {}: {}", index, id);

        let output_path = dir.join(output_file_name);
        items.push(WorkItem::new(index, id, structure, volume, output_path));
    }

    ensure_unique_ids(&items)?;
    info!("✓ 共发现 {} 个条目", items.len());
    Ok(items)
}

/// 确保 ID 唯一，重复时报错而不是合并
pub fn ensure_unique_ids(items: &[WorkItem]) -> Result<(), DiscoveryError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id.as_str()) {
            return Err(DiscoveryError::DuplicateItemId { id: item.id.clone() });
        }
    }
    Ok(())
}

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let read_failed = |source| DiscoveryError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(read_failed)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn single_with_extension(
    dir: &Path,
    files: &[PathBuf],
    extension: &str,
) -> Result<PathBuf, DiscoveryError> {
    let suffix = format!(".{}", extension);
    let matches: Vec<&PathBuf> = files
        .iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(&suffix))
        })
        .collect();

    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(DiscoveryError::MissingFile {
            folder: dir.to_path_buf(),
            extension: extension.to_string(),
        }),
        many => Err(DiscoveryError::MultipleFiles {
            folder: dir.to_path_buf(),
            extension: extension.to_string(),
            count: many.len(),
        }),
    }
}

/// 文件名中第一个 '.' 之前的部分，如 "emd_1234.map.mrc" -> "emd_1234"
fn leading_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

fn absolute(path: &Path) -> Result<PathBuf, DiscoveryError> {
    std::path::absolute(path).map_err(|source| DiscoveryError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}
