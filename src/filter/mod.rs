//! 评论过滤模块
//!
//! 监听文档中新出现的评论，合并成批次交给远程分类服务，并隐藏被判定为有害的
//! 评论容器：
//! - **pipeline**: 去重、缓冲、防抖、分批分发与结论应用
//! - **classifier**: 分类服务的请求/响应格式与 HTTP 客户端
//! - **preferences**: 用户偏好（开关与阈值）的缓存与存储
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use comment_filter::filter::{FilterConfig, FilterService, MutationRecord};
//!
//! # async fn example(added: Vec<markup5ever_rcdom::Handle>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FilterConfig::default();
//! let service = FilterService::from_config(&config)?;
//!
//! service.ingest(&MutationRecord::new(added));
//! let report = service.flush_now().await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

/// 分类服务客户端 - 请求格式、响应解析与 HTTP 传输
pub mod classifier;

/// 配置管理模块 - 处理过滤相关的所有配置
///
/// 提供分类服务地址、批次大小、防抖延迟、选择器等配置
pub mod config;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 过滤管道模块
pub mod pipeline;

/// 用户偏好
pub mod preferences;

/// 管道服务与事件循环
pub mod service;

// ============================================================================
// 公共API导出
// ============================================================================

pub use classifier::{
    parse_verdicts, ClassifyRequest, Classifier, DeliveryHint, HttpClassifier, RequestShape,
    Verdicts,
};
pub use config::{ConfigManager, FilterConfig};
pub use error::{ErrorCategory, ErrorSeverity, FilterError, FilterResult};
pub use pipeline::{
    ApplyReport, Debouncer, DedupRegistry, FeedAdapter, FlushOutcome, FlushReport, ItemBuffer,
    MutationRecord, PendingItem, VerdictApplier,
};
pub use preferences::{
    MemoryPreferenceStore, PreferenceCache, PreferenceChange, PreferenceStore, Preferences,
    StorageArea,
};
pub use service::{FilterService, ServiceStats, ServiceStatsSnapshot};
