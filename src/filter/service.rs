//! 过滤服务
//!
//! 本模块提供管道对象 `FilterService`，它持有缓冲区、去重表、偏好缓存、调度器与
//! 分发器，并在单线程事件循环上驱动整个管道。
//!
//! ## 并发模型
//!
//! 所有工作都运行在同一个线程上（rcdom 的节点句柄是 `Rc`），"并发"只是异步 I/O
//! 完成的交错。唯一的挂起点是分发器中逐批次等待分类结果的地方；缓冲区追加与
//! 取出、去重检查、调度器的安排与取消、结论应用都是同步完成的，并且不会跨越
//! `.await` 持有任何 `RefCell` 借用。
//!
//! - 刷新进行中到达的变更照常处理，新条目进入新的缓冲区；
//! - 同一时间最多只有一个刷新在进行；
//! - 关闭时先取消防抖，等待进行中的刷新结束（不取消已发出的请求），再以
//!   `Keepalive` 提示执行最后一次刷新。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use comment_filter::filter::{FilterConfig, FilterService, HttpClassifier, MemoryPreferenceStore};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FilterConfig::default();
//! let service = FilterService::new(&config, HttpClassifier::new(&config)?)?;
//! let store = MemoryPreferenceStore::new();
//!
//! let (feed_tx, feed_rx) = mpsc::unbounded_channel();
//! # drop(feed_tx);
//! let stats = service
//!     .run(feed_rx, store.subscribe(), &store, std::future::pending())
//!     .await;
//! println!("隐藏了 {} 条评论", stats.items_hidden);
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use futures::future::{Fuse, FusedFuture, FutureExt, LocalBoxFuture};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};

use crate::filter::classifier::{Classifier, DeliveryHint, HttpClassifier};
use crate::filter::config::FilterConfig;
use crate::filter::error::FilterResult;
use crate::filter::pipeline::{
    Debouncer, DedupRegistry, Dispatcher, FeedAdapter, FlushOutcome, FlushReport, ItemBuffer,
    MutationRecord, VerdictApplier,
};
use crate::filter::preferences::{PreferenceCache, PreferenceChange, PreferenceStore};

/// 评论过滤管道
///
/// 每个文档上下文构造一次，通过引用交给协作方使用。
pub struct FilterService<C> {
    /// 偏好缓存，每次刷新前读取
    preferences: PreferenceCache,

    /// 已入队元素的登记表，整个会话内不淘汰
    registry: RefCell<DedupRegistry>,

    /// 等待提交的条目
    buffer: RefCell<ItemBuffer>,

    /// 防抖调度器
    scheduler: RefCell<Debouncer>,

    feed: FeedAdapter,
    dispatcher: Dispatcher<C>,

    /// 缓冲区上限，达到后立即刷新
    max_buffered_items: Option<usize>,

    stats: ServiceStats,
}

impl FilterService<HttpClassifier> {
    /// 使用 HTTP 分类服务创建管道
    pub fn from_config(config: &FilterConfig) -> FilterResult<Self> {
        let classifier = HttpClassifier::new(config)?;
        Self::new(config, classifier)
    }
}

impl<C: Classifier> FilterService<C> {
    /// 创建新的管道实例
    pub fn new(config: &FilterConfig, classifier: C) -> FilterResult<Self> {
        config.validate()?;

        let feed = FeedAdapter::new(config.text_selector()?);
        let applier = VerdictApplier::new(config.container_selector()?);

        Ok(Self {
            preferences: PreferenceCache::new(config.default_preferences()),
            registry: RefCell::new(DedupRegistry::new()),
            buffer: RefCell::new(ItemBuffer::new()),
            scheduler: RefCell::new(Debouncer::new(config.debounce_delay())),
            feed,
            dispatcher: Dispatcher::new(classifier, applier, config.chunk_size),
            max_buffered_items: config.max_buffered_items,
            stats: ServiceStats::default(),
        })
    }

    pub fn preferences(&self) -> &PreferenceCache {
        &self.preferences
    }

    pub fn classifier(&self) -> &C {
        self.dispatcher.classifier()
    }

    pub fn applier(&self) -> &VerdictApplier {
        self.dispatcher.applier()
    }

    /// 缓冲区中等待提交的条目数
    pub fn pending(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// 下一次防抖刷新的截止时间
    pub fn next_flush_at(&self) -> Option<Instant> {
        self.scheduler.borrow().deadline()
    }

    /// 处理一次变更通知，返回新入队的条目数
    ///
    /// 至少新增一项时才通知调度器，且每条通知只通知一次。
    pub fn ingest(&self, record: &MutationRecord) -> usize {
        self.stats.records_received.fetch_add(1, Ordering::Relaxed);

        let items = self.feed.collect(record, &mut self.registry.borrow_mut());
        if items.is_empty() {
            return 0;
        }

        let added = items.len();
        let pending = {
            let mut buffer = self.buffer.borrow_mut();
            for item in items {
                buffer.append(item);
            }
            buffer.len()
        };
        self.stats.items_enqueued.fetch_add(added, Ordering::Relaxed);

        let now = Instant::now();
        let mut scheduler = self.scheduler.borrow_mut();
        scheduler.notify_items_added(now);
        if let Some(limit) = self.max_buffered_items {
            if pending >= limit {
                tracing::debug!("缓冲区达到上限 {}，立即刷新", limit);
                scheduler.force(now);
            }
        }

        added
    }

    /// 执行一次刷新
    ///
    /// 阈值在开始时读取一次，整轮刷新期间不变。无论成功与否，取出的条目都不会
    /// 回到缓冲区。
    pub async fn flush(&self, hint: DeliveryHint) -> FlushReport {
        if self.buffer.borrow().is_empty() {
            return FlushReport::empty();
        }

        let preferences = self.preferences.get();
        if !preferences.enabled {
            let dropped = self.buffer.borrow_mut().clear();
            tracing::debug!("过滤已关闭，丢弃 {} 项", dropped);
            let report = FlushReport::disabled(dropped);
            self.stats.record_flush(&report);
            return report;
        }

        let snapshot = self.buffer.borrow_mut().drain_all();
        let report = self
            .dispatcher
            .dispatch(snapshot, preferences.threshold, hint)
            .await;
        self.stats.record_flush(&report);
        report
    }

    /// 取消待执行的防抖刷新并立即刷新（关闭时使用）
    pub async fn flush_now(&self) -> FlushReport {
        if self.scheduler.borrow_mut().cancel() {
            tracing::debug!("已取消待执行的防抖刷新");
        }
        self.flush(DeliveryHint::Keepalive).await
    }

    /// 防抖截止时间已到时执行刷新
    pub async fn flush_if_due(&self) -> Option<FlushReport> {
        if self.scheduler.borrow_mut().take_due(Instant::now()) {
            Some(self.flush(DeliveryHint::Normal).await)
        } else {
            None
        }
    }

    /// 运行事件循环，直到 `shutdown` 完成或变更源关闭
    ///
    /// 偏好的首次读取与循环并行进行，在此之前使用默认偏好。
    pub async fn run<S, F>(
        &self,
        mut feed: UnboundedReceiver<MutationRecord>,
        mut changes: UnboundedReceiver<PreferenceChange>,
        store: &S,
        shutdown: F,
    ) -> ServiceStatsSnapshot
    where
        S: PreferenceStore + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let initial_load = store.load(self.preferences.get()).fuse();
        tokio::pin!(initial_load);

        let in_flight: Fuse<LocalBoxFuture<'_, FlushReport>> = Fuse::terminated();
        tokio::pin!(in_flight);

        let mut changes_open = true;

        tracing::info!("评论过滤管道已启动");

        loop {
            let deadline = self.scheduler.borrow().deadline();
            let flush_idle = in_flight.is_terminated();
            let load_pending = !initial_load.is_terminated();

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("收到关闭信号");
                    break;
                }

                record = feed.recv() => match record {
                    Some(record) => {
                        self.ingest(&record);
                    }
                    None => {
                        tracing::info!("变更源已关闭");
                        break;
                    }
                },

                change = changes.recv(), if changes_open => match change {
                    Some(change) => {
                        self.preferences.apply_change(&change);
                    }
                    None => {
                        tracing::debug!("偏好变更通知已关闭");
                        changes_open = false;
                    }
                },

                loaded = &mut initial_load, if load_pending => match loaded {
                    Ok(preferences) => self.preferences.replace(preferences),
                    Err(e) => tracing::warn!("读取偏好失败，继续使用默认值: {}", e),
                },

                report = &mut in_flight, if !flush_idle => {
                    log_flush(&report);
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if flush_idle && deadline.is_some() => {
                    if self.scheduler.borrow_mut().take_due(Instant::now()) {
                        in_flight.set(self.flush(DeliveryHint::Normal).boxed_local().fuse());
                    }
                }
            }
        }

        if !in_flight.is_terminated() {
            tracing::debug!("等待进行中的刷新完成");
            let report = in_flight.as_mut().await;
            log_flush(&report);
        }

        let report = self.flush_now().await;
        log_flush(&report);

        tracing::info!("评论过滤管道已停止");
        self.stats()
    }

    /// 获取统计快照
    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }
}

fn log_flush(report: &FlushReport) {
    match &report.outcome {
        FlushOutcome::Empty => tracing::trace!("缓冲区为空，跳过刷新"),
        FlushOutcome::Disabled => tracing::info!("过滤已关闭，丢弃 {} 项", report.dropped),
        FlushOutcome::Completed => tracing::info!("刷新完成: {}", report.summary()),
        FlushOutcome::Aborted(e) => tracing::warn!("刷新中止: {} ({})", report.summary(), e),
    }
}

/// 服务统计信息
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// 收到的变更通知数
    pub records_received: AtomicUsize,

    /// 入队的条目数
    pub items_enqueued: AtomicUsize,

    /// 实际执行的刷新次数（不含空刷新）
    pub flushes: AtomicUsize,

    /// 发出的分类请求数
    pub chunks_submitted: AtomicUsize,

    /// 被隐藏的评论容器数
    pub items_hidden: AtomicUsize,

    /// 被丢弃（关闭或失败）的条目数
    pub items_dropped: AtomicUsize,

    /// 中止的刷新次数
    pub flush_failures: AtomicUsize,

    last_flush_at: RefCell<Option<DateTime<Utc>>>,
}

impl ServiceStats {
    fn record_flush(&self, report: &FlushReport) {
        if report.outcome == FlushOutcome::Empty {
            return;
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.chunks_submitted
            .fetch_add(report.submitted_chunks, Ordering::Relaxed);
        self.items_hidden
            .fetch_add(report.applied.hidden, Ordering::Relaxed);
        self.items_dropped.fetch_add(report.dropped, Ordering::Relaxed);
        if report.is_aborted() {
            self.flush_failures.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_flush_at.borrow_mut() = Some(Utc::now());
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            chunks_submitted: self.chunks_submitted.load(Ordering::Relaxed),
            items_hidden: self.items_hidden.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            last_flush_at: *self.last_flush_at.borrow(),
        }
    }
}

/// 统计信息快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub records_received: usize,
    pub items_enqueued: usize,
    pub flushes: usize,
    pub chunks_submitted: usize,
    pub items_hidden: usize,
    pub items_dropped: usize,
    pub flush_failures: usize,
    pub last_flush_at: Option<DateTime<Utc>>,
}
