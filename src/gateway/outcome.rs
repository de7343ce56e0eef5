//! # 后端成功结果模型
//!
//! 网关只返回完整的结果：任何字段缺失或越界都会被当作协议错误，不存在“部分成功”。

use serde::Serialize;

/// 嵌入结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedOutcome {
    /// 产物地址（已相对后端根地址解析为绝对 URL）。
    pub image_url: String,
    /// 峰值信噪比（保真度）。
    pub psnr: f64,
    /// 结构相似度。
    pub ssim: f64,
    /// 可视化差异图地址。
    pub signal_map_url: Option<String>,
}

/// 提取前可疑图与原图的配准状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    Aligned,
    NotAligned,
    Other(String),
    NotReported,
}

impl AlignmentStatus {
    pub fn from_reported(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return Self::NotReported;
        };

        match status.trim().to_ascii_lowercase().as_str() {
            "aligned" | "ok" | "success" => Self::Aligned,
            "not_aligned" | "unaligned" | "misaligned" | "failed" | "alignment_failed" => Self::NotAligned,
            "" => Self::NotReported,
            _ => Self::Other(status.to_string()),
        }
    }
}

/// 差分提取结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractOutcome {
    /// 解出的文本；为空表示未恢复出任何内容。
    pub decoded_text: String,
    /// 置信度，范围 `[0, 1]`。
    pub confidence: f64,
    pub alignment: AlignmentStatus,
    pub is_match: Option<bool>,
}

impl ExtractOutcome {
    pub fn recovered(&self) -> bool {
        !self.decoded_text.is_empty()
    }
}

/// 盲检时后端检测到并校正的几何变换。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryCorrection {
    pub rotation_degrees: f64,
    pub scale: f64,
    pub corrected: bool,
}

/// 盲检结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyOutcome {
    pub decoded_text: String,
    pub confidence: f64,
    pub verified: bool,
    pub geometry: Option<GeometryCorrection>,
}

impl VerifyOutcome {
    pub fn recovered(&self) -> bool {
        !self.decoded_text.is_empty()
    }
}

/// `GET /health` 的响应。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
}
