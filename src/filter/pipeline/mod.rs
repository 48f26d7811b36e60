//! 过滤管道模块
//!
//! 变更源 → 去重 → 缓冲 → 防抖 → 分发 → 应用结论

pub mod buffer;
pub mod dispatcher;
pub mod feed;
pub mod registry;
pub mod scheduler;
pub mod verdict;

// 重新导出主要类型
pub use buffer::{ItemBuffer, PendingItem};
pub use dispatcher::{chunk_count, chunk_items, Dispatcher, FlushOutcome, FlushReport};
pub use feed::{FeedAdapter, MutationRecord};
pub use registry::DedupRegistry;
pub use scheduler::Debouncer;
pub use verdict::{ApplyReport, VerdictApplier};
