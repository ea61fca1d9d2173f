//! 分组：把条目列表切成连续、大小有上限的分组

use crate::error::ConfigError;
use crate::models::{Division, WorkItem};

/// 把条目按顺序切成 `ceil(n / items_per_division)` 个连续分组，最后一组可能较短
pub fn partition(
    items: &[WorkItem],
    items_per_division: usize,
) -> Result<Vec<Division>, ConfigError> {
    if items_per_division == 0 {
        return Err(ConfigError::ZeroItemsPerDivision);
    }

    Ok(items
        .chunks(items_per_division)
        .enumerate()
        .map(|(index, chunk)| Division {
            index,
            items: chunk.to_vec(),
        })
        .collect())
}
