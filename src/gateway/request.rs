//! 已校验的请求体。字段类型本身携带不变量，只能由校验通过的输入构造。

use crate::asset::ImageAsset;
use crate::validation::{StrengthParameter, WatermarkText};

#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub image: ImageAsset,
    pub text: WatermarkText,
    pub strength: StrengthParameter,
}

/// 差分提取：`original` 为嵌入前的参考图，`suspect` 为待检测图，两者不可互换。
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub original: ImageAsset,
    pub suspect: ImageAsset,
}

/// 盲检：只有一张图，没有参考图。
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub image: ImageAsset,
}
