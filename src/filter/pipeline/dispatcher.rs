//! 批次分发器
//!
//! 把一次刷新取出的快照按数量切分成连续的批次，逐个顺序提交给分类服务，
//! 成功后交给结论应用器。任何一个批次失败都会中止本轮剩余的批次，未发送的
//! 条目直接丢弃（尽力而为、最多一次，不重试）。

use super::buffer::PendingItem;
use super::verdict::{ApplyReport, VerdictApplier};
use crate::filter::classifier::{ClassifyRequest, Classifier, DeliveryHint};
use crate::filter::error::{helpers, FilterError};

/// 按数量切分批次，保持原有顺序
pub fn chunk_items(items: &[PendingItem], chunk_size: usize) -> std::slice::Chunks<'_, PendingItem> {
    items.chunks(chunk_size.max(1))
}

/// 切分后的批次数量
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    total.div_ceil(chunk_size.max(1))
}

/// 一次刷新的结果
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// 缓冲区为空，没有任何请求
    Empty,
    /// 过滤已关闭，缓冲的条目被丢弃
    Disabled,
    /// 所有批次都已提交并应用
    Completed,
    /// 某个批次失败，剩余批次被放弃
    Aborted(FilterError),
}

/// 一次刷新的统计
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    /// 从缓冲区取出的条目数
    pub drained: usize,
    /// 本轮使用的阈值（在刷新开始时读取，整轮不变）
    pub threshold: Option<f32>,
    /// 已发出的请求数（包括失败的那一个）
    pub submitted_chunks: usize,
    /// 成功应用结论的批次数
    pub applied_chunks: usize,
    /// 因关闭或失败而被丢弃的条目数
    pub dropped: usize,
    pub applied: ApplyReport,
    pub outcome: FlushOutcome,
}

impl FlushReport {
    pub fn empty() -> Self {
        Self {
            drained: 0,
            threshold: None,
            submitted_chunks: 0,
            applied_chunks: 0,
            dropped: 0,
            applied: ApplyReport::default(),
            outcome: FlushOutcome::Empty,
        }
    }

    pub fn disabled(dropped: usize) -> Self {
        Self {
            drained: dropped,
            dropped,
            outcome: FlushOutcome::Disabled,
            ..Self::empty()
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Aborted(_))
    }

    /// 简短描述，用于日志
    pub fn summary(&self) -> String {
        format!(
            "取出 {} 项, 提交 {} 批, 应用 {} 批, 隐藏 {} 个, 丢弃 {} 项",
            self.drained,
            self.submitted_chunks,
            self.applied_chunks,
            self.applied.hidden,
            self.dropped
        )
    }
}

/// 批次分发器
pub struct Dispatcher<C> {
    classifier: C,
    applier: VerdictApplier,
    chunk_size: usize,
}

impl<C: Classifier> Dispatcher<C> {
    pub fn new(classifier: C, applier: VerdictApplier, chunk_size: usize) -> Self {
        Self {
            classifier,
            applier,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn applier(&self) -> &VerdictApplier {
        &self.applier
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 顺序提交快照中的全部批次
    ///
    /// 下一个批次只会在上一个批次的结果（成功或失败）已知之后才提交。
    pub async fn dispatch(
        &self,
        items: Vec<PendingItem>,
        threshold: f32,
        hint: DeliveryHint,
    ) -> FlushReport {
        let total = items.len();
        let total_chunks = chunk_count(total, self.chunk_size);
        let mut report = FlushReport {
            drained: total,
            threshold: Some(threshold),
            ..FlushReport::empty()
        };
        let mut consumed = 0;

        tracing::debug!("开始分发 {} 项, 共 {} 批", total, total_chunks);

        for (index, chunk) in chunk_items(&items, self.chunk_size).enumerate() {
            let request = ClassifyRequest::new(
                chunk.iter().map(|item| item.text.clone()).collect(),
                threshold,
            );

            report.submitted_chunks += 1;
            let result = match self.classifier.classify(&request, hint).await {
                Ok(verdicts) => self.applier.apply(chunk, &verdicts),
                Err(e) => Err(e),
            };

            match result {
                Ok(applied) => {
                    tracing::debug!(
                        "批次 {}/{} 完成: {} 项, 命中 {}, 隐藏 {}",
                        index + 1,
                        total_chunks,
                        chunk.len(),
                        applied.flagged,
                        applied.hidden
                    );
                    consumed += chunk.len();
                    report.applied_chunks += 1;
                    report.applied.merge(applied);
                }
                Err(e) => {
                    let e = e.with_context(format!("批次 {}/{}", index + 1, total_chunks));
                    helpers::log_error(&e);
                    report.dropped = total - consumed;
                    tracing::warn!(
                        "放弃本轮剩余的 {} 批, 丢弃 {} 项",
                        total_chunks - index - 1,
                        report.dropped
                    );
                    report.outcome = FlushOutcome::Aborted(e);
                    return report;
                }
            }
        }

        report.outcome = FlushOutcome::Completed;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever_rcdom::RcDom;

    fn items(count: usize) -> Vec<PendingItem> {
        let dom = RcDom::default();
        (0..count)
            .map(|i| PendingItem::new(format!("item-{}", i), dom.document.clone()))
            .collect()
    }

    #[test]
    fn chunks_preserve_order_and_bound_size() {
        for (total, size) in [(0, 50), (1, 50), (50, 50), (51, 50), (120, 50), (7, 3)] {
            let source = items(total);
            let chunks: Vec<_> = chunk_items(&source, size).collect();

            assert_eq!(chunks.len(), chunk_count(total, size), "M={} C={}", total, size);
            assert!(chunks.iter().all(|chunk| chunk.len() <= size && !chunk.is_empty()));

            let flattened: Vec<_> = chunks.concat().into_iter().map(|i| i.text).collect();
            let expected: Vec<_> = source.into_iter().map(|i| i.text).collect();
            assert_eq!(flattened, expected);
        }
    }

    #[test]
    fn sizes_for_a_hundred_and_twenty_items() {
        let source = items(120);
        let sizes: Vec<_> = chunk_items(&source, 50).map(<[PendingItem]>::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        assert_eq!(chunk_count(3, 0), 3);
    }
}
