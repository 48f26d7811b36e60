//! # Comment Filter Library
//!
//! 监听文档中新渲染的评论，分批交给远程毒性分类服务，并隐藏被判定为有害的评论。
//!
//! ## 模块组织
//!
//! - `filter` - 过滤管道、分类客户端、偏好与配置
//! - `parsers` - HTML 解析、选择器匹配与序列化
//! - `env` - 类型化的环境变量

pub mod env;
pub mod filter;
pub mod parsers;

// Re-export commonly used items for convenience
pub use filter::{FilterConfig, FilterError, FilterResult, FilterService};
pub use parsers::{html_to_dom, serialize_document};
