//! # 线上数据格式
//!
//! ## 设计思路
//!
//! 后端响应的反序列化结构与对外结果模型分离：
//! 这里尽量宽容地解析（兼容字段别名、可选字段），
//! 转换为 `outcome` 类型时再做完整性校验，不满足约定即视为协议错误。
//!
//! 错误体兼容三种写法：
//! - `{status, error_code, message, suggestion, details}`（业务错误）
//! - `{detail: "..."}`（框架抛出的 HTTP 异常）
//! - `{detail: [{msg, ...}, ...]}`（框架的参数校验错误）

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::GatewayError;
use super::outcome::{
    AlignmentStatus, EmbedOutcome, ExtractOutcome, GeometryCorrection, HealthReport, VerifyOutcome,
};

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedData {
    image_url: String,
    psnr: f64,
    ssim: f64,
    #[serde(default)]
    signal_map_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DebugInfo {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractData {
    #[serde(default)]
    decoded_text: Option<String>,
    confidence: f64,
    #[serde(default)]
    is_match: Option<bool>,
    #[serde(default)]
    debug_info: Option<DebugInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationMetadata {
    rotation_detected: f64,
    scale_detected: f64,
    geometry_corrected: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyData {
    #[serde(default, alias = "watermark_text")]
    decoded_text: Option<String>,
    confidence: f64,
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    metadata: Option<VerificationMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthData {
    status: String,
    #[serde(default)]
    service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// 取出面向用户的错误描述：`message` → `detail` 字符串 → `detail[].msg` 拼接。
    fn resolve_message(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return Some(message.to_string());
        }

        match self.detail.as_ref()? {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
            serde_json::Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|msg| msg.as_str()))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        }
    }
}

/// 解析成功响应体。
pub(crate) fn decode_success<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Protocol(format!("malformed response body: {}", e)))
}

/// 将非 2xx 响应转换为网关错误。
///
/// 能解析出错误描述的一律视为业务错误；
/// 无法解析的 5xx（常见于代理返回的 HTML 错误页）视为传输错误。
pub(crate) fn decode_failure(status: u16, reason: &str, body: &[u8]) -> GatewayError {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
    let message = parsed.as_ref().and_then(ErrorBody::resolve_message);

    match (parsed, message) {
        (Some(body), Some(message)) => GatewayError::Business {
            status,
            code: body.error_code,
            message,
            suggestion: body.suggestion,
        },
        _ if status >= 500 => GatewayError::Transport(format!("HTTP {} {}", status, reason)),
        _ => GatewayError::Business {
            status,
            code: None,
            message: format!("Request rejected by the watermark service (HTTP {} {})", status, reason),
            suggestion: None,
        },
    }
}

fn checked_confidence(confidence: f64) -> Result<f64, GatewayError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(GatewayError::Protocol(format!(
            "confidence {} is outside [0, 1]",
            confidence
        )))
    }
}

impl EmbedData {
    /// `resolve` 把后端返回的相对地址解析为绝对地址。
    pub(crate) fn into_outcome<F>(self, resolve: F) -> Result<EmbedOutcome, GatewayError>
    where
        F: Fn(&str) -> Result<String, GatewayError>,
    {
        if self.image_url.trim().is_empty() {
            return Err(GatewayError::Protocol("image_url is empty".to_string()));
        }

        let signal_map_url = match self.signal_map_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Some(resolve(url)?),
            None => None,
        };

        Ok(EmbedOutcome {
            image_url: resolve(&self.image_url)?,
            psnr: self.psnr,
            ssim: self.ssim,
            signal_map_url,
        })
    }
}

impl ExtractData {
    pub(crate) fn into_outcome(self) -> Result<ExtractOutcome, GatewayError> {
        let status = self.debug_info.unwrap_or_default().status;
        Ok(ExtractOutcome {
            decoded_text: self.decoded_text.unwrap_or_default(),
            confidence: checked_confidence(self.confidence)?,
            alignment: AlignmentStatus::from_reported(status.as_deref()),
            is_match: self.is_match,
        })
    }
}

impl VerifyData {
    pub(crate) fn into_outcome(self) -> Result<VerifyOutcome, GatewayError> {
        let decoded_text = self.decoded_text.unwrap_or_default();
        let verified = self.verified.unwrap_or(!decoded_text.is_empty());

        Ok(VerifyOutcome {
            confidence: checked_confidence(self.confidence)?,
            verified,
            geometry: self.metadata.map(|meta| GeometryCorrection {
                rotation_degrees: meta.rotation_detected,
                scale: meta.scale_detected,
                corrected: meta.geometry_corrected,
            }),
            decoded_text,
        })
    }
}

impl HealthData {
    pub(crate) fn into_report(self) -> HealthReport {
        HealthReport {
            status: self.status,
            service: self.service.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(url: &str) -> Result<String, GatewayError> {
        Ok(url.to_string())
    }

    #[test]
    fn embed_body_decodes() {
        let body = br#"{"status":"success","data":{"image_url":"/static/out.png","psnr":41.2,"ssim":0.98,"signal_map_url":null}}"#;
        let envelope: Envelope<EmbedData> = decode_success(body).expect("valid body");
        let outcome = envelope.data.into_outcome(identity).expect("complete payload");

        assert_eq!(outcome.image_url, "/static/out.png");
        assert_eq!(outcome.psnr, 41.2);
        assert_eq!(outcome.signal_map_url, None);
    }

    #[test]
    fn embed_body_missing_metrics_is_protocol_error() {
        let body = br#"{"data":{"image_url":"/static/out.png"}}"#;
        let result: Result<Envelope<EmbedData>, _> = decode_success(body);
        assert!(matches!(result, Err(GatewayError::Protocol(_))));
    }

    #[test]
    fn extract_body_decodes_alignment() {
        let body = br#"{"data":{"decoded_text":"hello","confidence":1.0,"is_match":true,"debug_info":{"status":"aligned"}}}"#;
        let envelope: Envelope<ExtractData> = decode_success(body).expect("valid body");
        let outcome = envelope.data.into_outcome().expect("complete payload");

        assert_eq!(outcome.decoded_text, "hello");
        assert_eq!(outcome.alignment, AlignmentStatus::Aligned);
        assert_eq!(outcome.is_match, Some(true));
        assert!(outcome.recovered());
    }

    #[test]
    fn extract_without_debug_info_or_text() {
        let body = br#"{"data":{"decoded_text":"","confidence":0.5,"debug_info":null}}"#;
        let envelope: Envelope<ExtractData> = decode_success(body).expect("valid body");
        let outcome = envelope.data.into_outcome().expect("complete payload");

        assert!(!outcome.recovered());
        assert_eq!(outcome.alignment, AlignmentStatus::NotReported);
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let body = br#"{"data":{"decoded_text":"x","confidence":1.7}}"#;
        let envelope: Envelope<ExtractData> = decode_success(body).expect("valid body");
        assert!(matches!(envelope.data.into_outcome(), Err(GatewayError::Protocol(_))));
    }

    #[test]
    fn verify_accepts_backend_field_names() {
        let body = br#"{"status":"success","data":{"verified":true,"watermark_text":"owner","confidence":0.91,
            "metadata":{"rotation_detected":12.5,"scale_detected":0.8,"geometry_corrected":true}}}"#;
        let envelope: Envelope<VerifyData> = decode_success(body).expect("valid body");
        let outcome = envelope.data.into_outcome().expect("complete payload");

        assert_eq!(outcome.decoded_text, "owner");
        assert!(outcome.verified);
        let geometry = outcome.geometry.expect("geometry reported");
        assert_eq!(geometry.rotation_degrees, 12.5);
        assert!(geometry.corrected);
    }

    #[test]
    fn verify_mirrors_extract_shape() {
        let body = br#"{"data":{"decoded_text":"","confidence":0.0,"debug_info":{"status":"n/a"}}}"#;
        let envelope: Envelope<VerifyData> = decode_success(body).expect("valid body");
        let outcome = envelope.data.into_outcome().expect("complete payload");

        assert!(!outcome.verified);
        assert!(!outcome.recovered());
    }

    #[test]
    fn structured_error_body_is_business() {
        let body = br#"{"status":"error","error_code":"WATERMARK_VERIFICATION_FAILED","message":"Failed to verify watermark in image","suggestion":"The image may not contain a watermark"}"#;
        let err = decode_failure(500, "Internal Server Error", body);

        assert_eq!(
            err,
            GatewayError::Business {
                status: 500,
                code: Some("WATERMARK_VERIFICATION_FAILED".into()),
                message: "Failed to verify watermark in image".into(),
                suggestion: Some("The image may not contain a watermark".into()),
            }
        );
    }

    #[test]
    fn framework_detail_bodies_are_business() {
        let plain = decode_failure(400, "Bad Request", br#"{"detail":"Could not decode image"}"#);
        assert!(matches!(plain, GatewayError::Business { ref message, .. } if message == "Could not decode image"));

        let listed = decode_failure(
            422,
            "Unprocessable Entity",
            br#"{"detail":[{"loc":["body","text"],"msg":"field required"},{"loc":["body","file"],"msg":"field required"}]}"#,
        );
        assert!(matches!(listed, GatewayError::Business { ref message, .. } if message == "field required; field required"));
    }

    #[test]
    fn unparseable_server_error_is_transport() {
        let err = decode_failure(502, "Bad Gateway", b"<html>bad gateway</html>");
        assert!(matches!(err, GatewayError::Transport(_)));

        let client_err = decode_failure(404, "Not Found", b"");
        assert!(matches!(client_err, GatewayError::Business { status: 404, .. }));
    }
}
