//! # 文件约束校验
//!
//! 只看声明的元数据（类型 + 体积），不读取文件内容。
//! 可选开启内容嗅探：在元数据校验通过后用 `infer` 检查 magic bytes，
//! 对外仍返回同一个 `Result<(), FileViolation>`。

use crate::asset::{ImageAsset, MediaType, MIB};

/// 单张图片允许的最大体积（字节）。
pub const MAX_IMAGE_BYTES: u64 = 10 * MIB;

const MAX_IMAGE_MIB: u64 = MAX_IMAGE_BYTES / MIB;

/// 图片文件未通过校验的原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileViolation {
    #[error("No file selected")]
    Missing,

    #[error("Invalid file format. Only PNG and JPG images are supported. Got: {declared}")]
    UnsupportedType { declared: String },

    #[error("File size ({:.2}MB) exceeds maximum allowed size of {}MB", size_in_mib(.size), MAX_IMAGE_MIB)]
    TooLarge { size: u64 },

    #[error("File content does not match its declared type {declared} (detected: {})", .detected.as_deref().unwrap_or("unknown"))]
    SignatureMismatch {
        declared: String,
        detected: Option<String>,
    },
}

fn size_in_mib(size: &u64) -> f64 {
    *size as f64 / MIB as f64
}

/// 文件约束校验器。
///
/// 默认只校验元数据；`with_content_sniffing(true)` 追加签名检查。
#[derive(Debug, Clone, Copy, Default)]
pub struct FileConstraintValidator {
    sniff_content: bool,
}

impl FileConstraintValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_content = enabled;
        self
    }

    pub fn sniffs_content(&self) -> bool {
        self.sniff_content
    }

    pub fn check_image(&self, asset: Option<&ImageAsset>) -> Result<(), FileViolation> {
        let asset = check_image_metadata(asset)?;
        if self.sniff_content {
            check_signature(asset)?;
        }
        Ok(())
    }
}

/// 元数据校验（默认行为）。
///
/// # 示例
/// ```rust
/// use invisiguard_client::asset::ImageAsset;
/// use invisiguard_client::validation::{check_image, FileViolation};
///
/// let gif = ImageAsset::new("a.gif", "image/gif", vec![0u8; 16]);
/// assert!(matches!(check_image(Some(&gif)), Err(FileViolation::UnsupportedType { .. })));
/// assert_eq!(check_image(None), Err(FileViolation::Missing));
/// ```
pub fn check_image(asset: Option<&ImageAsset>) -> Result<(), FileViolation> {
    check_image_metadata(asset).map(|_| ())
}

fn check_image_metadata(asset: Option<&ImageAsset>) -> Result<&ImageAsset, FileViolation> {
    let asset = asset.ok_or(FileViolation::Missing)?;

    if asset.media_type().is_none() {
        return Err(FileViolation::UnsupportedType {
            declared: asset.declared_type().to_string(),
        });
    }

    if asset.size() > MAX_IMAGE_BYTES {
        return Err(FileViolation::TooLarge { size: asset.size() });
    }

    Ok(asset)
}

/// 通过文件签名（magic bytes）确认内容与声明一致。
fn check_signature(asset: &ImageAsset) -> Result<(), FileViolation> {
    let declared = asset.declared_type().to_string();
    let detected: Option<&'static str> = infer::get(asset.bytes()).map(|kind| kind.mime_type());

    let detected_type = detected.and_then(MediaType::from_declared);
    if detected_type.is_some() && detected_type == asset.media_type() {
        return Ok(());
    }

    log::warn!(
        "⚠️ 文件签名与声明类型不一致 - 文件: {} 声明: {} 检测: {:?}",
        asset.file_name(),
        declared,
        detected
    );

    Err(FileViolation::SignatureMismatch {
        declared,
        detected: detected.map(str::to_string),
    })
}
