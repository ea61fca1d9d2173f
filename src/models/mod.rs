pub mod loaders;
pub mod report;
pub mod work_item;

pub use loaders::{discover, ensure_unique_ids};
pub use report::{DivisionBatch, ItemOutcome, RunReport, RunSummary};
pub use work_item::{Division, WorkItem};
