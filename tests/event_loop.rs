//! 事件循环集成测试
//!
//! 使用暂停的 tokio 时钟验证防抖、容量上限、偏好变更与关闭流程

use std::future::pending;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use comment_filter::filter::{
    DeliveryHint, FilterConfig, FilterService, MemoryPreferenceStore, Preferences,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{test_config, HtmlTestHelper, MockClassifier};

fn service_with(config: &FilterConfig, mock: &MockClassifier) -> FilterService<MockClassifier> {
    FilterService::new(config, mock.clone()).expect("test config should be valid")
}

/// 连续到达的变更合并为一次刷新，在最后一次变更后整整一个延迟才触发
#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_single_flush() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("burst", 3),
    ));
    let records = HtmlTestHelper::per_comment_records(&dom);

    let mock = MockClassifier::new();
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let driver = async {
        for record in records {
            feed_tx.send(record).unwrap();
            sleep(Duration::from_millis(100)).await;
        }

        // 最后一次变更之后 100ms，防抖尚未到期
        assert!(mock.requests().is_empty(), "Flush should wait for a quiet period");

        sleep(Duration::from_millis(200)).await;
        assert_eq!(mock.chunk_sizes(), vec![3], "Burst should produce exactly one request");
        assert_eq!(mock.hints(), vec![DeliveryHint::Normal]);

        drop(feed_tx);
    };

    let (stats, ()) = tokio::join!(
        service.run(feed_rx, store.subscribe(), &store, pending()),
        driver
    );

    assert_eq!(stats.records_received, 3);
    assert_eq!(stats.items_enqueued, 3);
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.chunks_submitted, 1);
}

/// 缓冲区达到上限时不等待防抖
#[tokio::test(start_paused = true)]
async fn test_size_cap_flushes_without_waiting() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("cap", 4),
    ));
    let config = FilterConfig {
        debounce_ms: 60_000,
        max_buffered_items: Some(4),
        ..test_config()
    };

    let mock = MockClassifier::new();
    let service = service_with(&config, &mock);
    let store = MemoryPreferenceStore::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let driver = async {
        feed_tx.send(HtmlTestHelper::body_record(&dom)).unwrap();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(mock.chunk_sizes(), vec![4]);
        drop(feed_tx);
    };

    tokio::join!(
        service.run(feed_rx, store.subscribe(), &store, pending()),
        driver
    );
}

/// 变更源关闭时立即以 Keepalive 刷新剩余条目
#[tokio::test(start_paused = true)]
async fn test_feed_close_flushes_with_keepalive() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("close", 2),
    ));
    let mock = MockClassifier::new();
    mock.flag("close-1");
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    feed_tx.send(HtmlTestHelper::body_record(&dom)).unwrap();
    drop(feed_tx);

    let stats = service
        .run(feed_rx, store.subscribe(), &store, pending())
        .await;

    assert_eq!(mock.hints(), vec![DeliveryHint::Keepalive]);
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.items_hidden, 1);
    assert_eq!(HtmlTestHelper::hidden_texts(&dom), vec!["close-1"]);
}

/// 刷新进行中到达的条目进入新的缓冲区，由下一次刷新处理
#[tokio::test(start_paused = true)]
async fn test_items_arriving_mid_flight_go_to_next_flush() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(&[
        "first".to_string(),
        "second".to_string(),
    ]));
    let mut records = HtmlTestHelper::per_comment_records(&dom).into_iter();
    let (first, second) = (records.next().unwrap(), records.next().unwrap());

    let mock = MockClassifier::new();
    mock.with_latency(Duration::from_millis(100));
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let driver = async {
        feed_tx.send(first).unwrap();

        // 第一次刷新在 250ms 开始，350ms 完成
        sleep(Duration::from_millis(300)).await;
        assert_eq!(mock.requests().len(), 1, "First flush should be in flight");

        feed_tx.send(second).unwrap();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(service.pending(), 1, "New item should land in the fresh buffer");

        sleep(Duration::from_millis(700)).await;
        drop(feed_tx);
    };

    let (stats, ()) = tokio::join!(
        service.run(feed_rx, store.subscribe(), &store, pending()),
        driver
    );

    let texts: Vec<Vec<String>> = mock.requests().into_iter().map(|r| r.texts).collect();
    assert_eq!(texts, vec![vec!["first".to_string()], vec!["second".to_string()]]);
    assert_eq!(stats.flushes, 2);
}

/// 关闭信号到达时等待进行中的刷新，再以 Keepalive 刷新剩余条目
#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_flush() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(&[
        "early".to_string(),
        "late".to_string(),
    ]));
    let mut records = HtmlTestHelper::per_comment_records(&dom).into_iter();
    let (early, late) = (records.next().unwrap(), records.next().unwrap());

    let mock = MockClassifier::new();
    mock.with_latency(Duration::from_millis(100));
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let driver = async {
        feed_tx.send(early).unwrap();
        sleep(Duration::from_millis(260)).await;
        feed_tx.send(late).unwrap();
        sleep(Duration::from_millis(1)).await;
        shutdown_tx.send(()).unwrap();
    };
    let shutdown = async {
        let _ = shutdown_rx.await;
    };

    let (stats, ()) = tokio::join!(
        service.run(feed_rx, store.subscribe(), &store, shutdown),
        driver
    );

    assert_eq!(
        mock.hints(),
        vec![DeliveryHint::Normal, DeliveryHint::Keepalive]
    );
    let texts: Vec<Vec<String>> = mock.requests().into_iter().map(|r| r.texts).collect();
    assert_eq!(texts, vec![vec!["early".to_string()], vec!["late".to_string()]]);
    assert_eq!(stats.flushes, 2);
    assert_eq!(service.pending(), 0);
}

/// 存储中保存的偏好在首次刷新前生效
#[tokio::test(start_paused = true)]
async fn test_saved_preferences_are_loaded() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("saved", 2),
    ));
    let mock = MockClassifier::new();
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::with_saved(Preferences {
        enabled: true,
        threshold: 0.5,
    });
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let driver = async {
        feed_tx.send(HtmlTestHelper::body_record(&dom)).unwrap();
        sleep(Duration::from_secs(1)).await;
        drop(feed_tx);
    };

    tokio::join!(
        service.run(feed_rx, store.subscribe(), &store, pending()),
        driver
    );

    assert_eq!(mock.requests().len(), 1);
    assert_eq!(mock.requests()[0].threshold, 0.5);
}

/// 偏好变更在下一次刷新时生效
#[tokio::test(start_paused = true)]
async fn test_preference_changes_apply_to_next_flush() {
    let off = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("off", 3),
    ));
    let on = HtmlTestHelper::create_test_dom(&HtmlTestHelper::comment_page(
        &HtmlTestHelper::numbered("on", 2),
    ));

    let mock = MockClassifier::new();
    let service = service_with(&test_config(), &mock);
    let store = MemoryPreferenceStore::new();
    let changes = store.subscribe();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let driver = async {
        store.set_enabled(false);
        sleep(Duration::from_millis(1)).await;
        assert!(!service.preferences().get().enabled);

        feed_tx.send(HtmlTestHelper::body_record(&off)).unwrap();
        sleep(Duration::from_secs(1)).await;
        assert!(mock.requests().is_empty(), "Disabled flush must not send requests");

        store.set_enabled(true);
        store.set_threshold(0.3);
        sleep(Duration::from_millis(1)).await;

        feed_tx.send(HtmlTestHelper::body_record(&on)).unwrap();
        sleep(Duration::from_secs(1)).await;
        drop(feed_tx);
    };

    let (stats, ()) = tokio::join!(service.run(feed_rx, changes, &store, pending()), driver);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].texts, vec!["on-0", "on-1"]);
    assert!((requests[0].threshold - 0.3).abs() < 1e-6);
    assert_eq!(stats.items_dropped, 3);
}
