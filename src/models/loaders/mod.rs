pub mod discovery;

pub use discovery::{discover, discover_with_output_name, ensure_unique_ids};
