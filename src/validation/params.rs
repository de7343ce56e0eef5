//! # 参数校验（水印文本 / 强度）
//!
//! ## 设计思路
//!
//! 校验即构造：`WatermarkText::parse` 与 `StrengthParameter::parse` 是获得这两个类型的唯一途径，
//! 因此进入请求的文本一定已去除首尾空白，强度一定落在区间内。
//! 超出范围的输入一律拒绝，绝不截断或四舍五入。

use serde::Serialize;

/// 水印文本最大长度（按字符计，校验未去空白的原文）。
pub const MAX_TEXT_CHARS: usize = 240;
/// 强度下限（含）。
pub const ALPHA_MIN: f64 = 0.1;
/// 强度上限（含）。
pub const ALPHA_MAX: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterViolation {
    #[error("Watermark text cannot be empty")]
    Empty,

    #[error("Watermark text exceeds maximum length of {limit} characters")]
    TooLong { limit: usize },

    #[error("Alpha value must be a number")]
    NotANumber,

    #[error("Alpha value must be between {min} and {max}. Got: {value}")]
    OutOfRange { value: f64, min: f64, max: f64 },
}

/// 已校验、已去除首尾空白的水印文本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WatermarkText(String);

impl WatermarkText {
    pub fn parse(raw: &str) -> Result<Self, ParameterViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParameterViolation::Empty);
        }
        if raw.chars().count() > MAX_TEXT_CHARS {
            return Err(ParameterViolation::TooLong { limit: MAX_TEXT_CHARS });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 强度的原始输入，来自滑块（数值）、文本框（字符串）或缺失。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StrengthInput {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl StrengthInput {
    /// 数值化；无法得到数值时返回 `None`。
    ///
    /// 空白文本、缺失值与 NaN 均视为无法转换；`inf` 视为数值（随后按范围拒绝）。
    pub fn coerce(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Absent => return None,
        };
        (!value.is_nan()).then_some(value)
    }
}

impl From<f64> for StrengthInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for StrengthInput {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Number)
    }
}

impl From<&str> for StrengthInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StrengthInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// 已校验的强度（alpha），保证为有限值且位于 `[ALPHA_MIN, ALPHA_MAX]`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StrengthParameter(f64);

impl StrengthParameter {
    pub fn parse(input: &StrengthInput) -> Result<Self, ParameterViolation> {
        let value = input.coerce().ok_or(ParameterViolation::NotANumber)?;
        if !(ALPHA_MIN..=ALPHA_MAX).contains(&value) {
            return Err(ParameterViolation::OutOfRange {
                value,
                min: ALPHA_MIN,
                max: ALPHA_MAX,
            });
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

pub fn check_text(raw: &str) -> Result<(), ParameterViolation> {
    WatermarkText::parse(raw).map(|_| ())
}

pub fn check_strength(input: &StrengthInput) -> Result<(), ParameterViolation> {
    StrengthParameter::parse(input).map(|_| ())
}
