//! # 请求级校验
//!
//! 按模式组合文件校验与参数校验。所有检查都会执行（不在第一个错误处返回），
//! 错误按固定字段顺序收集：图片 → 文本 → 强度，保证多次运行输出一致。

use std::fmt;

use serde::Serialize;

use super::file::FileConstraintValidator;
use super::params::{check_strength, check_text, StrengthInput};
use crate::asset::ImageAsset;

/// 提交前校验结果。`valid == errors.is_empty()`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ok() -> Self {
        Self::from_errors(Vec::new())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return f.write_str("ok");
        }
        f.write_str(&self.errors.join("; "))
    }
}

/// 提取模式下图片的角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractRole {
    Original,
    Suspect,
}

impl ExtractRole {
    /// 错误消息前缀使用的标签。
    pub fn label(self) -> &'static str {
        match self {
            Self::Original => "Original image",
            Self::Suspect => "Suspect image",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator {
    files: FileConstraintValidator,
}

impl RequestValidator {
    pub fn new(files: FileConstraintValidator) -> Self {
        Self { files }
    }

    pub fn validate_embed(
        &self,
        image: Option<&ImageAsset>,
        text: &str,
        strength: &StrengthInput,
    ) -> ValidationReport {
        let mut errors = Vec::new();

        if let Err(violation) = self.files.check_image(image) {
            errors.push(violation.to_string());
        }
        if let Err(violation) = check_text(text) {
            errors.push(violation.to_string());
        }
        if let Err(violation) = check_strength(strength) {
            errors.push(violation.to_string());
        }

        ValidationReport::from_errors(errors)
    }

    pub fn validate_extract(
        &self,
        original: Option<&ImageAsset>,
        suspect: Option<&ImageAsset>,
    ) -> ValidationReport {
        let errors = [(ExtractRole::Original, original), (ExtractRole::Suspect, suspect)]
            .into_iter()
            .filter_map(|(role, asset)| {
                self.files
                    .check_image(asset)
                    .err()
                    .map(|violation| format!("{}: {}", role.label(), violation))
            })
            .collect();

        ValidationReport::from_errors(errors)
    }

    pub fn validate_verify(&self, image: Option<&ImageAsset>) -> ValidationReport {
        let errors = self
            .files
            .check_image(image)
            .err()
            .map(|violation| violation.to_string())
            .into_iter()
            .collect();

        ValidationReport::from_errors(errors)
    }
}
