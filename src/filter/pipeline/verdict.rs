//! 结论应用器
//!
//! 把一个批次的结论按位置映射回源元素：`verdicts[i]` 对应 `chunk[i]`。被判定为
//! 有害的条目，隐藏其最近的评论容器祖先（包括自身）。

use super::buffer::PendingItem;
use crate::filter::classifier::Verdicts;
use crate::filter::config::constants;
use crate::filter::error::{FilterError, FilterResult};
use crate::parsers::html::dom::{get_style_property, is_attached, set_style_property};
use crate::parsers::Selector;

/// 一个批次的应用结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// 被判定为有害的条目数
    pub flagged: usize,
    /// 本次新隐藏的容器数
    pub hidden: usize,
    /// 找不到容器或元素已脱离文档的条目数
    pub unresolved: usize,
}

impl ApplyReport {
    pub fn merge(&mut self, other: ApplyReport) {
        self.flagged += other.flagged;
        self.hidden += other.hidden;
        self.unresolved += other.unresolved;
    }
}

#[derive(Debug, Clone)]
pub struct VerdictApplier {
    container: Selector,
}

impl VerdictApplier {
    pub fn new(container: Selector) -> Self {
        Self { container }
    }

    /// 应用一个批次的结论
    ///
    /// 逐项结论的数量与批次不一致时返回 `MalformedResponse`，且不修改任何元素。
    pub fn apply(&self, chunk: &[PendingItem], verdicts: &Verdicts) -> FilterResult<ApplyReport> {
        verdicts.check_len(chunk.len())?;

        let mut report = ApplyReport::default();
        for (index, item) in chunk.iter().enumerate() {
            if !verdicts.is_flagged(index) {
                continue;
            }
            report.flagged += 1;

            match self.hide(item) {
                Ok(true) => report.hidden += 1,
                Ok(false) => {}
                Err(e) => {
                    report.unresolved += 1;
                    tracing::debug!("跳过第 {} 项: {}", index, e);
                }
            }
        }

        Ok(report)
    }

    /// 隐藏条目所属的评论容器，返回是否发生了修改
    fn hide(&self, item: &PendingItem) -> FilterResult<bool> {
        if !is_attached(&item.node) {
            return Err(FilterError::ElementResolution(
                "源元素已不在文档中".to_string(),
            ));
        }

        let container = self.container.closest(&item.node).ok_or_else(|| {
            FilterError::ElementResolution(format!("没有匹配 `{}` 的祖先容器", self.container))
        })?;

        Ok(set_style_property(
            &container,
            constants::HIDE_PROPERTY,
            constants::HIDE_VALUE,
        ))
    }

    /// 元素所属的容器是否已被隐藏
    pub fn is_hidden(&self, item: &PendingItem) -> bool {
        self.container
            .closest(&item.node)
            .and_then(|container| get_style_property(&container, constants::HIDE_PROPERTY))
            .is_some_and(|value| value == constants::HIDE_VALUE)
    }
}
