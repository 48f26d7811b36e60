//! # 解析器模块
//!
//! 评论过滤管道所依赖的 HTML 文档处理：
//!
//! - HTML解析和DOM操作
//! - 选择器匹配（文本元素与评论容器）
//! - 文档序列化

pub mod html;

pub use html::{html_to_dom, serialize_document, Selector, SelectorError};
