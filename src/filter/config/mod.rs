//! 过滤配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, FilterConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_CHUNK_SIZE: usize = 50;
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

    // 偏好默认值
    pub const DEFAULT_ENABLED: bool = true;
    pub const DEFAULT_THRESHOLD: f32 = 0.7;

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/check";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

    // 文档选择器
    pub const DEFAULT_TEXT_SELECTOR: &str = "#content-text";
    pub const DEFAULT_CONTAINER_SELECTOR: &str = "#comment";

    // 隐藏评论容器所用的内联样式
    pub const HIDE_PROPERTY: &str = "display";
    pub const HIDE_VALUE: &str = "none";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "comment-filter.toml",
        ".comment-filter.toml",
        "comment-filter.json",
        "~/.config/comment-filter/config.toml",
        "/etc/comment-filter/config.toml",
    ];
}
