//! # 图片资源模型
//!
//! ## 设计思路
//!
//! `ImageAsset` 表示用户选中的一张图片：原始字节 + 文件名 + “声明的”媒体类型。
//! 声明类型来自文件选择器（扩展名），与文件真实内容无关；
//! 是否信任内容由校验层决定（见 `validation::file`）。
//!
//! ## 实现思路
//!
//! - 字节使用 `bytes::Bytes` 共享存储，克隆只增加引用计数，
//!   便于各模式各自持有一份而不互相别名。
//! - `MediaType` 只覆盖后端接受的 PNG / JPEG，解析时忽略大小写与 `;` 之后的参数。

use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

/// 1 MiB（字节）。
pub const MIB: u64 = 1024 * 1024;

/// 后端接受的图片类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Png,
    Jpeg,
}

impl MediaType {
    /// 解析声明的媒体类型字符串。
    ///
    /// 接受 `image/png`、`image/jpeg` 以及部分浏览器使用的非标准 `image/jpg`。
    ///
    /// # 示例
    /// ```rust
    /// use invisiguard_client::asset::MediaType;
    ///
    /// assert_eq!(MediaType::from_declared("IMAGE/PNG"), Some(MediaType::Png));
    /// assert_eq!(MediaType::from_declared("image/jpeg; q=1"), Some(MediaType::Jpeg));
    /// assert_eq!(MediaType::from_declared("image/gif"), None);
    /// ```
    pub fn from_declared(declared: &str) -> Option<Self> {
        let essence = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn as_mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// 用户选中的图片。
#[derive(Debug, Clone)]
pub struct ImageAsset {
    file_name: String,
    declared_type: String,
    size: u64,
    data: Bytes,
}

impl ImageAsset {
    /// 由内存字节构建，体积取实际字节长度。
    pub fn new(file_name: impl Into<String>, declared_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            file_name: file_name.into(),
            declared_type: declared_type.into(),
            size: data.len() as u64,
            data,
        }
    }

    /// 读取本地文件，按扩展名推断声明类型（与浏览器文件选择器行为一致）。
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let declared_type = declared_type_for_path(path);

        log::debug!(
            "📁 读取本地图片 - 文件: {} 类型: {} 大小: {}",
            file_name,
            declared_type,
            format_file_size(data.len() as u64)
        );

        Ok(Self::new(file_name, declared_type, data))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// 声明类型对应的 `MediaType`；不受支持时返回 `None`。
    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_declared(&self.declared_type)
    }
}

/// 按扩展名推断声明类型。
fn declared_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// 人类可读的文件体积（如 `2.5 MB`），保留至多两位小数。
///
/// # 示例
/// ```rust
/// use invisiguard_client::asset::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
