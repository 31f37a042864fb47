pub mod batch_queue;
pub mod producer;
pub mod runner;
pub mod stats;
pub mod thread_pinning;
pub mod types;
pub mod worker;
