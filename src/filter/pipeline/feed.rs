//! 变更源适配器
//!
//! 把"新挂载节点"通知转换为待提交条目：在每个新节点及其后代中查找文本元素，
//! 经过去重后捕获文本内容。

use markup5ever_rcdom::Handle;

use super::buffer::PendingItem;
use super::registry::DedupRegistry;
use crate::parsers::html::dom::{get_text_content, is_element};
use crate::parsers::Selector;

/// 一次文档变更通知
#[derive(Debug, Clone, Default)]
pub struct MutationRecord {
    pub added_nodes: Vec<Handle>,
}

impl MutationRecord {
    pub fn new(added_nodes: Vec<Handle>) -> Self {
        Self { added_nodes }
    }
}

/// 变更源适配器
#[derive(Debug, Clone)]
pub struct FeedAdapter {
    text_selector: Selector,
}

impl FeedAdapter {
    pub fn new(text_selector: Selector) -> Self {
        Self { text_selector }
    }

    pub fn text_selector(&self) -> &Selector {
        &self.text_selector
    }

    /// 收集通知中首次出现的文本元素，按文档顺序返回
    ///
    /// 非元素节点（文本、注释）直接跳过。
    pub fn collect(&self, record: &MutationRecord, registry: &mut DedupRegistry) -> Vec<PendingItem> {
        let mut items = Vec::new();

        for node in record.added_nodes.iter().filter(|node| is_element(node)) {
            for element in self.text_selector.select_all(node) {
                if !registry.should_enqueue(&element) {
                    continue;
                }
                let text = get_text_content(&element);
                items.push(PendingItem::new(text, element));
            }
        }

        items
    }
}
