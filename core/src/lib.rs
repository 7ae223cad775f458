pub mod allocator;
pub mod config;
pub mod coordinator;
pub mod naming;
pub mod reaper;
pub mod resume;
pub mod runtime;
pub mod urls;
pub mod worker;

pub use runtime::Runtime;
