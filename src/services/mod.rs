pub mod cmm_session;
pub mod error_log;
pub mod remote_session;
pub mod report_writer;

pub use cmm_session::{CmmSession, CmmSessionFactory};
pub use error_log::ErrorLogSink;
pub use remote_session::{RemoteSession, SessionFactory, SessionOptions};
pub use report_writer::save_json;
