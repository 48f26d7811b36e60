//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::env::validate_api_url;
use crate::filter::classifier::RequestShape;
use crate::filter::error::{FilterError, FilterResult};
use crate::filter::preferences::Preferences;
use crate::parsers::Selector;

/// 过滤管道配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    // 分类服务
    pub api_url: String,
    pub request_shape: RequestShape,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,

    // 批次与调度
    pub chunk_size: usize,
    pub debounce_ms: u64,
    /// 缓冲区达到该数量时立即刷新；`None` 表示只按时间防抖
    pub max_buffered_items: Option<usize>,

    // 文档选择器
    pub text_selector: String,
    pub container_selector: String,

    // 偏好初始值（存储返回之前使用）
    pub default_enabled: bool,
    pub default_threshold: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            request_shape: RequestShape::default(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            shutdown_timeout_secs: constants::DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),

            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            debounce_ms: constants::DEFAULT_DEBOUNCE.as_millis() as u64,
            max_buffered_items: None,

            text_selector: constants::DEFAULT_TEXT_SELECTOR.to_string(),
            container_selector: constants::DEFAULT_CONTAINER_SELECTOR.to_string(),

            default_enabled: constants::DEFAULT_ENABLED,
            default_threshold: constants::DEFAULT_THRESHOLD,
        }
    }
}

impl FilterConfig {
    /// 验证配置
    pub fn validate(&self) -> FilterResult<()> {
        if self.chunk_size == 0 {
            return Err(FilterError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.debounce_ms == 0 {
            return Err(FilterError::ConfigError("防抖延迟不能为0".to_string()));
        }

        if self.max_buffered_items == Some(0) {
            return Err(FilterError::ConfigError("缓冲区上限不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 || self.shutdown_timeout_secs == 0 {
            return Err(FilterError::ConfigError("请求超时必须大于0".to_string()));
        }

        if !self.default_threshold.is_finite() || !(0.0..=1.0).contains(&self.default_threshold)
        {
            return Err(FilterError::ConfigError(format!(
                "阈值 {} 超出 0.0 - 1.0 范围",
                self.default_threshold
            )));
        }

        validate_api_url(&self.api_url).map_err(FilterError::ConfigError)?;

        self.text_selector()?;
        self.container_selector()?;

        Ok(())
    }

    /// 应用环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{filter, EnvVar};

        match filter::ApiUrl::get_set() {
            Some(Ok(api_url)) => {
                self.api_url = api_url;
                tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
            }
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }

        match filter::ChunkSize::get_set() {
            Some(Ok(chunk_size)) => self.chunk_size = chunk_size,
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }

        match filter::DebounceMs::get_set() {
            Some(Ok(delay)) => self.debounce_ms = delay.as_millis() as u64,
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }

        match filter::RequestTimeout::get_set() {
            Some(Ok(timeout)) => self.request_timeout_secs = timeout.as_secs(),
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }

        match filter::Enabled::get_set() {
            Some(Ok(enabled)) => self.default_enabled = enabled,
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }

        match filter::Threshold::get_set() {
            Some(Ok(threshold)) => self.default_threshold = threshold,
            Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
            None => {}
        }
    }

    /// 转换为Duration类型
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// 存储返回之前使用的偏好
    pub fn default_preferences(&self) -> Preferences {
        Preferences {
            enabled: self.default_enabled,
            threshold: self.default_threshold,
        }
    }

    pub fn text_selector(&self) -> FilterResult<Selector> {
        Ok(self.text_selector.parse()?)
    }

    pub fn container_selector(&self) -> FilterResult<Selector> {
        Ok(self.container_selector.parse()?)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: FilterConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器：`.env` → 配置文件 → 环境变量覆盖 → 验证
    pub fn new() -> FilterResult<Self> {
        Self::load_dotenv();
        let config = Self::load_config()?;
        Self::finish(config)
    }

    /// 从指定文件创建配置管理器
    pub fn from_file<P: AsRef<Path>>(path: P) -> FilterResult<Self> {
        Self::load_dotenv();
        let config = Self::load_from_file(path.as_ref())?;
        Self::finish(config)
    }

    fn finish(mut config: FilterConfig) -> FilterResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn into_config(self) -> FilterConfig {
        self.config
    }

    /// 在搜索路径中查找配置文件
    fn load_config() -> FilterResult<FilterConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(FilterConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> FilterResult<FilterConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FilterError::ConfigError(format!("读取配置文件失败 {}: {}", path.display(), e))
        })?;

        // 根据扩展名选择格式，默认TOML
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .map_err(|e| FilterError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| FilterError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> FilterResult<()> {
        let config = FilterConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| FilterError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FilterError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
