//! # 提交前校验模块（validation）
//!
//! ## 设计思路
//!
//! 在任何网络请求之前判断“图片 / 文本 / 强度”组合是否合法。
//! 所有函数都是纯函数：同步、无副作用、总能返回结果。
//!
//! - `file`：图片声明类型与体积（可选签名嗅探）
//! - `params`：水印文本与强度
//! - `request`：按模式（embed / extract / verify）组合并汇总全部错误
//!
//! ## 实现思路
//!
//! 单项检查返回带标签的 `Result<(), Violation>`，调用方可穷举匹配；
//! 汇总层再把违规渲染为面向用户的消息列表。

mod file;
mod params;
mod request;

pub use file::{check_image, FileConstraintValidator, FileViolation, MAX_IMAGE_BYTES};
pub use params::{
    check_strength, check_text, ParameterViolation, StrengthInput, StrengthParameter, WatermarkText,
    ALPHA_MAX, ALPHA_MIN, MAX_TEXT_CHARS,
};
pub use request::{ExtractRole, RequestValidator, ValidationReport};
