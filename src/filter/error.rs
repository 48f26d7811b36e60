//! 过滤模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。刷新周期内产生的所有错误都在本地记录，
//! 不会传播到变更源或事件循环之外。

use std::fmt;

use thiserror::Error;

/// 过滤错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误（请求发送失败、DNS、非 2xx 状态码）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 分类服务响应格式错误（缺少字段、类型不符、结果数量与批次不一致）
    #[error("响应格式错误: {0}")]
    MalformedResponse(String),

    /// 源元素或评论容器已不在文档中
    #[error("元素解析失败: {0}")]
    ElementResolution(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl FilterError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FilterError::ConfigError(_) => ErrorSeverity::Critical,
            FilterError::NetworkError(_) => ErrorSeverity::Warning,
            FilterError::TimeoutError(_) => ErrorSeverity::Warning,
            FilterError::MalformedResponse(_) => ErrorSeverity::Error,
            FilterError::ElementResolution(_) => ErrorSeverity::Info,
            FilterError::InvalidInput(_) => ErrorSeverity::Info,
            FilterError::SerializationError(_) => ErrorSeverity::Error,
            FilterError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            FilterError::ConfigError(_) => ErrorCategory::Configuration,
            FilterError::NetworkError(_) => ErrorCategory::Transport,
            FilterError::TimeoutError(_) => ErrorCategory::Transport,
            FilterError::MalformedResponse(_) => ErrorCategory::Response,
            FilterError::ElementResolution(_) => ErrorCategory::Document,
            FilterError::InvalidInput(_) => ErrorCategory::Input,
            FilterError::SerializationError(_) => ErrorCategory::Serialization,
            FilterError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let new_msg = match &self {
            FilterError::ConfigError(msg)
            | FilterError::NetworkError(msg)
            | FilterError::TimeoutError(msg)
            | FilterError::MalformedResponse(msg)
            | FilterError::ElementResolution(msg)
            | FilterError::InvalidInput(msg)
            | FilterError::SerializationError(msg)
            | FilterError::InternalError(msg) => format!("{} (上下文: {})", msg, context),
        };

        match &mut self {
            FilterError::ConfigError(msg)
            | FilterError::NetworkError(msg)
            | FilterError::TimeoutError(msg)
            | FilterError::MalformedResponse(msg)
            | FilterError::ElementResolution(msg)
            | FilterError::InvalidInput(msg)
            | FilterError::SerializationError(msg)
            | FilterError::InternalError(msg) => *msg = new_msg,
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Response,
    Document,
    Input,
    Serialization,
    Internal,
}

impl From<reqwest::Error> for FilterError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FilterError::TimeoutError(format!("分类请求超时: {}", error))
        } else if error.is_decode() {
            FilterError::MalformedResponse(format!("响应体解码失败: {}", error))
        } else {
            FilterError::NetworkError(error.to_string())
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(error: std::io::Error) -> Self {
        FilterError::InternalError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(error: serde_json::Error) -> Self {
        FilterError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for FilterError {
    fn from(error: toml::de::Error) -> Self {
        FilterError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for FilterError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        FilterError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<crate::parsers::SelectorError> for FilterError {
    fn from(error: crate::parsers::SelectorError) -> Self {
        FilterError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type FilterResult<T> = Result<T, FilterError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，附带错误类别
    pub fn log_error(error: &FilterError) {
        let category = error.category();
        match error.severity() {
            ErrorSeverity::Info => tracing::info!(?category, "过滤信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!(?category, "过滤警告: {}", error),
            ErrorSeverity::Error => tracing::error!(?category, "过滤错误: {}", error),
            ErrorSeverity::Critical => tracing::error!(?category, "过滤严重错误: {}", error),
        }
    }

    /// 创建网络错误
    pub fn network_error<T: fmt::Display>(msg: T) -> FilterError {
        FilterError::NetworkError(msg.to_string())
    }

    /// 创建响应格式错误
    pub fn malformed_response<T: fmt::Display>(msg: T) -> FilterError {
        FilterError::MalformedResponse(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_warnings() {
        let error = helpers::network_error("connection refused");
        assert_eq!(error.category(), ErrorCategory::Transport);
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn context_is_appended() {
        let error = helpers::malformed_response("missing `results`").with_context("chunk 2/3");
        assert_eq!(
            error,
            FilterError::MalformedResponse("missing `results` (上下文: chunk 2/3)".to_string())
        );
        assert_eq!(error.to_string(), "响应格式错误: missing `results` (上下文: chunk 2/3)");
    }
}
