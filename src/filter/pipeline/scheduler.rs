//! 防抖调度器
//!
//! 纯防抖：每次有新条目都把截止时间推迟到 `now + delay`，持续的变更会一直
//! 推迟刷新，直到整整一个延迟窗口内没有新条目。调度器本身不持有定时器，
//! 事件循环根据 [`Debouncer::deadline`] 睡眠，到期后调用 [`Debouncer::take_due`]。

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 安排或重新安排一次刷新
    pub fn notify_items_added(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// 让刷新立即到期（缓冲区达到上限时使用）
    pub fn force(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    /// 取消待执行的刷新，返回之前是否有待执行的刷新
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// 截止时间已到时消耗它并返回 `true`
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(250);

    #[test]
    fn burst_coalesces_into_one_flush_after_last_call() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);

        let mut fired = 0;
        for step in 0..10u64 {
            let now = start + Duration::from_millis(step * 100);
            if debouncer.take_due(now) {
                fired += 1;
            }
            debouncer.notify_items_added(now);
        }
        assert_eq!(fired, 0);

        let last = start + Duration::from_millis(900);
        assert_eq!(debouncer.deadline(), Some(last + DELAY));
        assert!(!debouncer.take_due(last + DELAY - Duration::from_millis(1)));
        assert!(debouncer.take_due(last + DELAY));
        assert!(!debouncer.take_due(last + DELAY * 4));
    }

    #[test]
    fn cancel_drops_pending_deadline() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        assert!(!debouncer.cancel());

        debouncer.notify_items_added(now);
        assert!(debouncer.is_pending());
        assert!(debouncer.cancel());
        assert!(!debouncer.take_due(now + DELAY));
    }

    #[test]
    fn force_makes_deadline_due_immediately() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.notify_items_added(now);
        debouncer.force(now);
        assert!(debouncer.take_due(now));
    }
}
