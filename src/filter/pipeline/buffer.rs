//! 待提交条目缓冲区

use std::mem;

use markup5ever_rcdom::Handle;

/// 等待提交的文本及其源元素
#[derive(Debug, Clone)]
pub struct PendingItem {
    /// 入队时捕获的文本内容
    pub text: String,
    /// 源元素
    pub node: Handle,
}

impl PendingItem {
    pub fn new(text: String, node: Handle) -> Self {
        Self { text, node }
    }
}

/// 有序缓冲区
///
/// `drain_all` 用一次 `mem::take` 完成"取出并清空"，之后追加的条目进入新的
/// 向量，不会与正在提交的快照混在一起。
#[derive(Debug, Default)]
pub struct ItemBuffer {
    items: Vec<PendingItem>,
}

impl ItemBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, item: PendingItem) {
        self.items.push(item);
    }

    /// 按插入顺序取出全部条目并清空缓冲区
    pub fn drain_all(&mut self) -> Vec<PendingItem> {
        mem::take(&mut self.items)
    }

    /// 丢弃全部条目，返回丢弃数量
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever_rcdom::RcDom;

    fn item(text: &str) -> PendingItem {
        PendingItem::new(text.to_string(), RcDom::default().document)
    }

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut buffer = ItemBuffer::new();
        for text in ["a", "b", "c"] {
            buffer.append(item(text));
        }

        let drained = buffer.drain_all();
        let texts: Vec<_> = drained.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn appends_after_drain_land_in_fresh_buffer() {
        let mut buffer = ItemBuffer::new();
        buffer.append(item("first"));
        let snapshot = buffer.drain_all();

        buffer.append(item("second"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.drain_all()[0].text, "second");
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut buffer = ItemBuffer::new();
        buffer.append(item("x"));
        buffer.append(item("y"));
        assert_eq!(buffer.clear(), 2);
        assert!(buffer.is_empty());
    }
}
