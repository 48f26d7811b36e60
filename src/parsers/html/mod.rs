//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（父节点、文本内容、属性与内联样式）
//! - `selector`: 简单选择器匹配
//! - `serializer`: 序列化功能

pub mod dom;
pub mod selector;
pub mod serializer;

pub use dom::{
    closest, detach_node, find_descendants, get_child_node_by_name, get_node_attr, get_node_name,
    get_parent_node, get_style_property, get_text_content, html_to_dom, is_attached, is_element,
    set_node_attr, set_style_property,
};
pub use selector::{Selector, SelectorError};
pub use serializer::serialize_document;
