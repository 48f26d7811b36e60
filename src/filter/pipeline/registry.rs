//! 去重登记表
//!
//! 记录已经入队过的源元素，保证每个元素在整个会话中最多被处理一次。
//! 比较的是元素身份（`Rc` 指针），而不是文本内容。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

/// 低于该数量时不做清理
const MIN_PRUNE_THRESHOLD: usize = 1024;

/// 以元素身份为键的去重登记表
///
/// 只持有 `Weak` 引用，不会阻止元素被释放。`Weak` 会保留分配本身，
/// 因此在登记项存在期间同一地址不会被新元素复用；元素释放后对应的登记项
/// 视为失效，并在表规模翻倍时被清理。
#[derive(Debug)]
pub struct DedupRegistry {
    seen: HashMap<usize, Weak<Node>>,
    prune_at: usize,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self {
            seen: HashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    fn key(node: &Handle) -> usize {
        Rc::as_ptr(node) as usize
    }

    /// 元素第一次出现时返回 `true` 并登记，之后每次都返回 `false`
    pub fn should_enqueue(&mut self, node: &Handle) -> bool {
        let key = Self::key(node);

        if let Some(existing) = self.seen.get(&key) {
            if existing.strong_count() > 0 {
                return false;
            }
        }

        self.seen.insert(key, Rc::downgrade(node));

        if self.seen.len() >= self.prune_at {
            let removed = self.prune();
            self.prune_at = (self.seen.len() * 2).max(MIN_PRUNE_THRESHOLD);
            tracing::debug!(
                "去重表清理完成: 移除 {} 项, 剩余 {} 项",
                removed,
                self.seen.len()
            );
        }

        true
    }

    /// 元素是否已登记
    pub fn contains(&self, node: &Handle) -> bool {
        self.seen
            .get(&Self::key(node))
            .is_some_and(|existing| existing.strong_count() > 0)
    }

    /// 移除已被释放元素的登记项，返回移除数量
    pub fn prune(&mut self) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, existing| existing.strong_count() > 0);
        before - self.seen.len()
    }

    /// 登记项数量（包括尚未清理的失效项）
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for DedupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::html_to_dom;
    use crate::parsers::Selector;

    fn paragraphs(html: &str) -> (markup5ever_rcdom::RcDom, Vec<Handle>) {
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        let selector: Selector = "p".parse().unwrap();
        let nodes = selector.select_all(&dom.document);
        (dom, nodes)
    }

    #[test]
    fn each_element_is_enqueued_once() {
        let (_dom, nodes) = paragraphs("<p>a</p><p>b</p>");
        let mut registry = DedupRegistry::new();

        let accepted: usize = (0..5)
            .map(|_| registry.should_enqueue(&nodes[0]) as usize)
            .sum();
        assert_eq!(accepted, 1);
        assert!(registry.contains(&nodes[0]));
        assert!(!registry.contains(&nodes[1]));
    }

    #[test]
    fn identity_not_content() {
        let (_dom, nodes) = paragraphs("<p>same</p><p>same</p>");
        let mut registry = DedupRegistry::new();

        assert!(registry.should_enqueue(&nodes[0]));
        assert!(registry.should_enqueue(&nodes[1]));
        assert!(!registry.should_enqueue(&nodes[1].clone()));
    }

    #[test]
    fn registry_does_not_keep_elements_alive() {
        let mut registry = DedupRegistry::new();
        {
            let (dom, nodes) = paragraphs("<p>gone</p>");
            assert!(registry.should_enqueue(&nodes[0]));
            drop(nodes);
            drop(dom);
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }
}
