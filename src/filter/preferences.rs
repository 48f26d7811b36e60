//! 偏好缓存
//!
//! 保存最近一次已知的 `{enabled, threshold}`，供每次刷新前读取。初始值为默认值，
//! 在偏好存储返回之后被替换，并随变更通知逐字段更新。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::filter::config::constants;
use crate::filter::error::FilterResult;

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_THRESHOLD: &str = "threshold";

/// 用户偏好
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub enabled: bool,
    /// 始终为 [0, 1] 内的有限数
    pub threshold: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled: constants::DEFAULT_ENABLED,
            threshold: constants::DEFAULT_THRESHOLD,
        }
    }
}

/// 阈值是否合法
pub fn is_valid_threshold(threshold: f64) -> bool {
    threshold.is_finite() && (0.0..=1.0).contains(&threshold)
}

/// 存储区域，只有 `sync` 区域的变更会被采纳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    Local,
    Managed,
    Session,
}

/// 单个字段的变更
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// `None` 表示该字段被删除
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// 一次变更通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceChange {
    pub area: StorageArea,
    pub changes: HashMap<String, ValueChange>,
}

impl PreferenceChange {
    /// 构造 `sync` 区域中单个字段的变更
    pub fn sync(key: &str, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        let mut changes = HashMap::new();
        changes.insert(
            key.to_string(),
            ValueChange {
                old_value,
                new_value,
            },
        );
        Self {
            area: StorageArea::Sync,
            changes,
        }
    }
}

/// 进程内的偏好缓存
///
/// 读取不阻塞；所有写入都发生在事件循环上，因此使用 `Cell` 即可。
#[derive(Debug)]
pub struct PreferenceCache {
    current: Cell<Preferences>,
    defaults: Preferences,
}

impl PreferenceCache {
    pub fn new(defaults: Preferences) -> Self {
        Self {
            current: Cell::new(defaults),
            defaults,
        }
    }

    /// 最近一次已知的偏好
    pub fn get(&self) -> Preferences {
        self.current.get()
    }

    /// 用存储返回的完整偏好替换当前值，非法阈值保留原值
    pub fn replace(&self, loaded: Preferences) {
        let mut next = self.current.get();
        next.enabled = loaded.enabled;
        if is_valid_threshold(loaded.threshold as f64) {
            next.threshold = loaded.threshold;
        } else {
            tracing::warn!("存储返回的阈值 {} 无效，保留 {}", loaded.threshold, next.threshold);
        }
        self.current.set(next);
        tracing::info!(
            "偏好已加载: enabled={}, threshold={}",
            next.enabled,
            next.threshold
        );
    }

    /// 应用一次变更通知，返回偏好是否发生变化
    ///
    /// 每个字段独立处理：只改一个字段时另一个保持不变。
    pub fn apply_change(&self, change: &PreferenceChange) -> bool {
        if change.area != StorageArea::Sync {
            return false;
        }

        let before = self.current.get();
        let mut next = before;

        if let Some(enabled) = change.changes.get(KEY_ENABLED) {
            match &enabled.new_value {
                Some(Value::Bool(value)) => next.enabled = *value,
                None => next.enabled = self.defaults.enabled,
                Some(other) => tracing::warn!("忽略非布尔的 enabled 值: {}", other),
            }
        }

        if let Some(threshold) = change.changes.get(KEY_THRESHOLD) {
            match &threshold.new_value {
                Some(value) => match value.as_f64() {
                    Some(number) if is_valid_threshold(number) => next.threshold = number as f32,
                    _ => tracing::warn!("忽略无效的 threshold 值: {}", value),
                },
                None => next.threshold = self.defaults.threshold,
            }
        }

        self.current.set(next);
        if next != before {
            tracing::debug!(
                "偏好已更新: enabled={}, threshold={}",
                next.enabled,
                next.threshold
            );
        }
        next != before
    }
}

impl Default for PreferenceCache {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

/// 偏好存储抽象
#[async_trait(?Send)]
pub trait PreferenceStore {
    /// 读取偏好，未保存的字段取 `defaults` 中的值
    async fn load(&self, defaults: Preferences) -> FilterResult<Preferences>;
}

/// 进程内偏好存储
///
/// 写入时向所有订阅者发送变更通知（值未变化时不发送）。
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    enabled: Cell<Option<bool>>,
    threshold: Cell<Option<f32>>,
    listeners: RefCell<Vec<UnboundedSender<PreferenceChange>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已保存的偏好创建存储
    pub fn with_saved(saved: Preferences) -> Self {
        let store = Self::new();
        store.enabled.set(Some(saved.enabled));
        store.threshold.set(Some(saved.threshold));
        store
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> UnboundedReceiver<PreferenceChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.borrow_mut().push(tx);
        rx
    }

    pub fn set_enabled(&self, enabled: bool) {
        let old = self.enabled.replace(Some(enabled));
        if old != Some(enabled) {
            self.notify(PreferenceChange::sync(
                KEY_ENABLED,
                old.map(Value::from),
                Some(Value::from(enabled)),
            ));
        }
    }

    pub fn set_threshold(&self, threshold: f32) {
        let old = self.threshold.replace(Some(threshold));
        if old != Some(threshold) {
            self.notify(PreferenceChange::sync(
                KEY_THRESHOLD,
                old.map(|value| Value::from(value as f64)),
                Some(Value::from(threshold as f64)),
            ));
        }
    }

    fn notify(&self, change: PreferenceChange) {
        self.listeners
            .borrow_mut()
            .retain(|listener| listener.send(change.clone()).is_ok());
    }
}

#[async_trait(?Send)]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self, defaults: Preferences) -> FilterResult<Preferences> {
        Ok(Preferences {
            enabled: self.enabled.get().unwrap_or(defaults.enabled),
            threshold: self.threshold.get().unwrap_or(defaults.threshold),
        })
    }
}
