pub mod item_guard;

pub use item_guard::run_guarded;
