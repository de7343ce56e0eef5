//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有可调参数集中到 `ClientConfig`，保证运行时行为可观测、可调整、可测试。
//! 校验规则（10MB / 240 字符 / 0.1~5.0）属于业务不变量，不在此处开放。
//!
//! ## 实现思路
//!
//! - `Default` 提供可直接连接本地后端的配置。
//! - 来源优先级：默认值 → JSON 文件 → 环境变量 →（调用方）命令行参数。
//! - `validate` 对超时、路径等做范围检查，拒绝明显错误的组合。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asset::MIB;

pub const ENV_BASE_URL: &str = "INVISIGUARD_BASE_URL";
pub const ENV_API_PREFIX: &str = "INVISIGUARD_API_PREFIX";
pub const ENV_REQUEST_TIMEOUT: &str = "INVISIGUARD_REQUEST_TIMEOUT_SECS";
pub const ENV_SNIFF_CONTENT: &str = "INVISIGUARD_SNIFF_CONTENT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// 客户端配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 后端根地址（不含 API 前缀）。
    pub base_url: String,
    /// 所有接口共享的路径前缀。
    pub api_prefix: String,
    /// 单次请求总超时（秒）。水印嵌入在大图上可能较慢。
    pub request_timeout_secs: u64,
    /// 建立连接（TCP/TLS）超时（秒）。
    pub connect_timeout_secs: u64,
    /// 启动探活超时（秒）。
    pub health_timeout_secs: u64,
    /// 下载产物时使用的固定文件名。
    pub download_file_name: String,
    /// 下载产物允许的最大体积（字节）。
    pub max_download_bytes: u64,
    /// 提交前是否检查文件签名（magic bytes）。
    pub sniff_content: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 8,
            health_timeout_secs: 5,
            download_file_name: "watermarked_image.png".to_string(),
            max_download_bytes: 64 * MIB,
            sniff_content: false,
        }
    }
}

impl ClientConfig {
    /// 从 JSON 文件加载；文件不存在时返回默认配置。
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("⚙️ 未找到配置文件，使用默认配置 - {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 应用进程环境变量覆盖。
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// 以任意键值来源覆盖配置，便于测试时注入。
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(prefix) = lookup(ENV_API_PREFIX) {
            self.api_prefix = prefix;
        }
        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = timeout.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_REQUEST_TIMEOUT,
                message: format!("expected whole seconds, got {:?}", timeout),
            })?;
        }
        if let Some(flag) = lookup(ENV_SNIFF_CONTENT) {
            self.sniff_content = parse_flag(&flag).ok_or_else(|| ConfigError::Invalid {
                key: ENV_SNIFF_CONTENT,
                message: format!("expected true/false, got {:?}", flag),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = reqwest::Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            key: "base_url",
            message: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "base_url",
                message: "only http and https are supported".to_string(),
            });
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "api_prefix",
                message: "must start with '/'".to_string(),
            });
        }
        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                message: "must be between 1 and 600 seconds".to_string(),
            });
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(ConfigError::Invalid {
                key: "connect_timeout_secs",
                message: "must be between 1 and 120 seconds".to_string(),
            });
        }
        if !(1..=60).contains(&self.health_timeout_secs) {
            return Err(ConfigError::Invalid {
                key: "health_timeout_secs",
                message: "must be between 1 and 60 seconds".to_string(),
            });
        }
        if self.download_file_name.trim().is_empty()
            || self.download_file_name.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid {
                key: "download_file_name",
                message: "must be a plain, non-empty file name".to_string(),
            });
        }
        if self.max_download_bytes < MIB {
            return Err(ConfigError::Invalid {
                key: "max_download_bytes",
                message: "must be at least 1MB".to_string(),
            });
        }
        Ok(())
    }

    /// 拼出完整接口地址，如 `http://host/api/v1/embed`。
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
