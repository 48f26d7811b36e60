//! 分类服务接口
//!
//! 定义分类服务的抽象（`Classifier`）、请求/响应的线上格式，以及基于
//! `reqwest` 的 HTTP 实现。
//!
//! ## 协议变体
//!
//! 请求体有两种形态，由 [`RequestShape`] 选择：
//!
//! - `Batch`: `{"texts": ["...", ...], "threshold": 0.7}`
//! - `Joined`: `{"text": "a\nb\n...", "threshold": 0.7}`（旧版单文本接口）
//!
//! 响应同样有两种形态，按字段是否存在来识别：
//!
//! - `{"results": [true, false, ...]}`，与 `texts` 逐项对齐
//! - `{"hateful": true, "score": 0.93}`，对整个批次给出一个结论
//!
//! 两个字段同时存在时以 `results` 为准。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::filter::config::FilterConfig;
use crate::filter::error::{helpers, FilterError, FilterResult};

/// 请求体形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestShape {
    /// `{texts, threshold}`
    #[default]
    Batch,
    /// `{text, threshold}`，所有文本以换行拼接
    Joined,
}

/// 投递提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryHint {
    /// 常规的防抖刷新
    #[default]
    Normal,
    /// 关闭前的最后一次刷新，请求不能因为页面卸载而被丢弃
    Keepalive,
}

/// 一次分类请求
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyRequest {
    pub texts: Vec<String>,
    pub threshold: f32,
}

impl ClassifyRequest {
    pub fn new(texts: Vec<String>, threshold: f32) -> Self {
        Self { texts, threshold }
    }

    /// 按指定形态生成 JSON 请求体
    pub fn to_body(&self, shape: RequestShape) -> Value {
        match shape {
            RequestShape::Batch => json!({
                "texts": self.texts,
                "threshold": self.threshold,
            }),
            RequestShape::Joined => json!({
                "text": self.texts.join("\n"),
                "threshold": self.threshold,
            }),
        }
    }
}

/// 分类结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdicts {
    /// 与批次逐项对齐的结论
    PerItem(Vec<bool>),
    /// 整个批次共用一个结论
    Aggregate(bool),
}

impl Verdicts {
    /// 第 `index` 项是否被判定为有害
    pub fn is_flagged(&self, index: usize) -> bool {
        match self {
            Verdicts::PerItem(results) => results.get(index).copied().unwrap_or(false),
            Verdicts::Aggregate(hateful) => *hateful,
        }
    }

    /// 检查结论数量与批次大小是否一致
    pub fn check_len(&self, chunk_len: usize) -> FilterResult<()> {
        match self {
            Verdicts::PerItem(results) if results.len() != chunk_len => {
                Err(helpers::malformed_response(format!(
                    "结果数量 {} 与批次大小 {} 不一致",
                    results.len(),
                    chunk_len
                )))
            }
            _ => Ok(()),
        }
    }
}

/// 解析分类服务的响应体
pub fn parse_verdicts(body: &Value) -> FilterResult<Verdicts> {
    let object = body
        .as_object()
        .ok_or_else(|| helpers::malformed_response("响应体不是 JSON 对象"))?;

    if let Some(results) = object.get("results") {
        let items = results
            .as_array()
            .ok_or_else(|| helpers::malformed_response("`results` 不是数组"))?;
        let flags = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_bool().ok_or_else(|| {
                    helpers::malformed_response(format!("`results[{}]` 不是布尔值", index))
                })
            })
            .collect::<FilterResult<Vec<bool>>>()?;
        return Ok(Verdicts::PerItem(flags));
    }

    if let Some(hateful) = object.get("hateful") {
        let hateful = hateful
            .as_bool()
            .ok_or_else(|| helpers::malformed_response("`hateful` 不是布尔值"))?;
        if let Some(score) = object.get("score").and_then(Value::as_f64) {
            tracing::debug!("批次整体得分: {:.3}", score);
        }
        return Ok(Verdicts::Aggregate(hateful));
    }

    Err(helpers::malformed_response(
        "响应体既没有 `results` 也没有 `hateful` 字段",
    ))
}

/// 分类服务抽象
///
/// 管道运行在单线程事件循环上，实现不需要是 `Send`。
#[async_trait(?Send)]
pub trait Classifier {
    /// 提交一个批次并等待结论
    async fn classify(
        &self,
        request: &ClassifyRequest,
        hint: DeliveryHint,
    ) -> FilterResult<Verdicts>;
}

/// 基于 HTTP 的分类服务客户端
pub struct HttpClassifier {
    client: Client,
    api_url: String,
    shape: RequestShape,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl HttpClassifier {
    /// 根据配置创建客户端
    pub fn new(config: &FilterConfig) -> FilterResult<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FilterError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            shape: config.request_shape,
            request_timeout: config.request_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn timeout_for(&self, hint: DeliveryHint) -> Duration {
        match hint {
            DeliveryHint::Normal => self.request_timeout,
            DeliveryHint::Keepalive => self.shutdown_timeout,
        }
    }
}

#[async_trait(?Send)]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        request: &ClassifyRequest,
        hint: DeliveryHint,
    ) -> FilterResult<Verdicts> {
        let body = request.to_body(self.shape);

        tracing::debug!(
            "提交分类请求: {} 条文本, 阈值 {}, {:?}",
            request.texts.len(),
            request.threshold,
            hint
        );

        let response = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout_for(hint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(helpers::network_error(format!(
                "分类服务返回状态码 {}",
                status
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| helpers::malformed_response(format!("响应体不是合法 JSON: {}", e)))?;

        parse_verdicts(&payload)
    }
}
