//! # HTTP 网关
//!
//! ## 设计思路
//!
//! 客户端与后端之间唯一的网络边界。
//! 每个模式一个 multipart 请求，响应统一经过 `wire` 解码，
//! 失败统一映射为 `GatewayError`，绝不返回部分成功。
//!
//! ## 实现思路
//!
//! - 一个共享的 `reqwest::Client`（总超时 + 连接超时），探活请求单独设置更短的超时。
//! - 日志中的 URL 一律去掉 query / fragment。
//! - 不做自动重试：业务错误重试无意义，传输错误交给用户决定。
//! - 产物下载按块读取并限制总大小，写盘前嗅探格式，非 PNG 只告警。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};

use super::outcome::{EmbedOutcome, ExtractOutcome, HealthReport, VerifyOutcome};
use super::request::{EmbedRequest, ExtractRequest, VerifyRequest};
use super::wire::{self, EmbedData, Envelope, ExtractData, HealthData, VerifyData};
use super::{BackendGateway, GatewayError};
use crate::asset::ImageAsset;
use crate::config::ClientConfig;
use crate::error::AppError;

const EMBED_PATH: &str = "embed";
const EXTRACT_PATH: &str = "extract";
const VERIFY_PATH: &str = "verify";
const HEALTH_PATH: &str = "health";

/// 基于 `reqwest` 的网关实现。克隆开销很小，内部共享连接池。
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: Arc<ClientConfig>,
    base: reqwest::Url,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        config.validate()?;

        let base = reqwest::Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid base url: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("cannot create HTTP client: {}", e)))?;

        Ok(Self {
            config: Arc::new(config),
            base,
            client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 下载嵌入产物，保存为 `dest_dir/<download_file_name>`，返回写入路径。
    pub async fn download_artifact(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, AppError> {
        let url = self.resolve_artifact_url(reference)?;
        let started = Instant::now();
        log::info!("⬇️ 下载产物 - {}", redact_url_for_log(&url));

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, &url, self.config.request_timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let body = response.bytes().await.unwrap_or_default();
            return Err(wire::decode_failure(status.as_u16(), reason, &body).into());
        }

        let limit = self.config.max_download_bytes;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(GatewayError::Protocol(format!(
                    "artifact is {:.2}MB, limit is {:.2}MB",
                    len as f64 / 1024.0 / 1024.0,
                    limit as f64 / 1024.0 / 1024.0
                ))
                .into());
            }
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_reqwest_error(e, &url, self.config.request_timeout_secs))?
        {
            if (buffer.len() + chunk.len()) as u64 > limit {
                return Err(GatewayError::Protocol("artifact exceeds the download size limit".to_string()).into());
            }
            buffer.extend_from_slice(&chunk);
        }

        match infer::get(&buffer).map(|kind| kind.mime_type()) {
            Some("image/png") => {}
            detected => log::warn!(
                "⚠️ 产物不是 PNG，有损格式可能破坏水印 - detected: {}",
                detected.unwrap_or("unknown")
            ),
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&self.config.download_file_name);
        tokio::fs::write(&path, &buffer).await?;

        log::info!(
            "✅ 产物已保存 - {} ({} bytes, {}ms)",
            path.display(),
            buffer.len(),
            started.elapsed().as_millis()
        );
        Ok(path)
    }

    fn resolve_artifact_url(&self, reference: &str) -> Result<String, GatewayError> {
        self.base
            .join(reference.trim())
            .map(|url| url.to_string())
            .map_err(|e| GatewayError::Protocol(format!("invalid artifact reference {:?}: {}", reference, e)))
    }

    async fn post_form<T>(&self, path: &str, form: Form) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        let started = Instant::now();

        let response = self
            .client
            .post(url.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, &url, self.config.request_timeout_secs))?;

        let result = self
            .read_response(response, &url, self.config.request_timeout_secs)
            .await;

        match &result {
            Ok(_) => log::debug!(
                "🌐 {} 完成 - {}ms",
                redact_url_for_log(&url),
                started.elapsed().as_millis()
            ),
            Err(err) => log::warn!(
                "⚠️ {} 失败 [{}] - {}",
                redact_url_for_log(&url),
                err.code(),
                err
            ),
        }
        result
    }

    async fn read_response<T>(
        &self,
        response: reqwest::Response,
        url: &str,
        timeout_secs: u64,
    ) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e, url, timeout_secs))?;

        if status.is_success() {
            wire::decode_success(&body)
        } else {
            Err(wire::decode_failure(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                &body,
            ))
        }
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &str, timeout_secs: u64) -> GatewayError {
        let err_msg = e.to_string().replace(url, &redact_url_for_log(url));

        if e.is_timeout() {
            GatewayError::Timeout(timeout_secs)
        } else if e.is_connect() {
            GatewayError::Transport(format!("connection failed: {}", err_msg))
        } else {
            GatewayError::Transport(format!("request failed: {}", err_msg))
        }
    }
}

impl BackendGateway for HttpGateway {
    async fn health(&self) -> Result<HealthReport, GatewayError> {
        let url = self.config.endpoint(HEALTH_PATH);
        let timeout_secs = self.config.health_timeout_secs;

        let response = self
            .client
            .get(url.as_str())
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, &url, timeout_secs))?;

        let data: HealthData = self.read_response(response, &url, timeout_secs).await?;
        Ok(data.into_report())
    }

    async fn embed(&self, request: &EmbedRequest) -> Result<EmbedOutcome, GatewayError> {
        log::info!(
            "🌐 提交嵌入 - file: {}, type: {}, size: {} bytes, text: {} chars, alpha: {}",
            request.image.file_name(),
            request.image.declared_type(),
            request.image.size(),
            request.text.as_str().chars().count(),
            request.strength.value()
        );

        let form = Form::new()
            .part("file", file_part(&request.image)?)
            .text("text", request.text.as_str().to_string())
            .text("alpha", request.strength.value().to_string());

        let envelope: Envelope<EmbedData> = self.post_form(EMBED_PATH, form).await?;
        let outcome = envelope
            .data
            .into_outcome(|reference| self.resolve_artifact_url(reference))?;

        log::info!("✅ 嵌入完成 - psnr: {:.2}, ssim: {:.4}", outcome.psnr, outcome.ssim);
        Ok(outcome)
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractOutcome, GatewayError> {
        log::info!(
            "🌐 提交提取 - original: {} ({} bytes), suspect: {} ({} bytes)",
            request.original.file_name(),
            request.original.size(),
            request.suspect.file_name(),
            request.suspect.size()
        );

        let form = Form::new()
            .part("original_file", file_part(&request.original)?)
            .part("suspect_file", file_part(&request.suspect)?);

        let envelope: Envelope<ExtractData> = self.post_form(EXTRACT_PATH, form).await?;
        let outcome = envelope.data.into_outcome()?;

        log::info!(
            "✅ 提取完成 - recovered: {}, confidence: {:.2}",
            outcome.recovered(),
            outcome.confidence
        );
        Ok(outcome)
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, GatewayError> {
        log::info!(
            "🌐 提交盲检 - file: {}, type: {}, size: {} bytes",
            request.image.file_name(),
            request.image.declared_type(),
            request.image.size()
        );

        let form = Form::new().part("file", file_part(&request.image)?);

        let envelope: Envelope<VerifyData> = self.post_form(VERIFY_PATH, form).await?;
        let outcome = envelope.data.into_outcome()?;

        log::info!(
            "✅ 盲检完成 - verified: {}, confidence: {:.2}",
            outcome.verified,
            outcome.confidence
        );
        Ok(outcome)
    }
}

/// 文件分片携带文件名与声明类型；声明类型不是合法 MIME 时退回规范化类型。
fn file_part(asset: &ImageAsset) -> Result<Part, GatewayError> {
    let part = || Part::bytes(asset.bytes().to_vec()).file_name(asset.file_name().to_string());

    part().mime_str(asset.declared_type()).or_else(|_| {
        let fallback = asset
            .media_type()
            .map(|media| media.as_mime())
            .unwrap_or("application/octet-stream");
        part()
            .mime_str(fallback)
            .map_err(|e| GatewayError::Transport(format!("cannot encode file part: {}", e)))
    })
}

fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = parsed.path();

    format!("{}://{}{}{}", parsed.scheme(), host, port, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{StrengthInput, StrengthParameter, WatermarkText};
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::thread;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn gateway_for(addr: SocketAddr) -> HttpGateway {
        HttpGateway::new(ClientConfig {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            request_timeout_secs: 1,
            connect_timeout_secs: 1,
            health_timeout_secs: 1,
            ..ClientConfig::default()
        })
        .expect("gateway init failed")
    }

    /// 读完整个请求（头 + Content-Length 指定的正文）。
    fn read_request(stream: &mut TcpStream) -> String {
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .expect("set read timeout failed");

        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn write_response(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write headers failed");
        stream.write_all(body).expect("write body failed");
        stream.flush().expect("flush failed");
    }

    /// 单次应答服务器，返回监听地址与请求内容。
    fn serve_once(status: &'static str, content_type: &'static str, body: Vec<u8>) -> (SocketAddr, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let request = read_request(&mut stream);
            write_response(&mut stream, status, content_type, &body);
            request
        });

        (addr, server)
    }

    fn embed_request() -> EmbedRequest {
        EmbedRequest {
            image: ImageAsset::new("cat.png", "image/png", PNG_HEADER.to_vec()),
            text: WatermarkText::parse("  hello  ").expect("valid text"),
            strength: StrengthParameter::parse(&StrengthInput::from(1.5)).expect("valid strength"),
        }
    }

    #[test]
    fn redact_url_strips_query_and_fragment() {
        assert_eq!(
            redact_url_for_log("http://127.0.0.1:8000/static/out.png?token=abc#frag"),
            "http://127.0.0.1:8000/static/out.png"
        );
        assert_eq!(redact_url_for_log("not a url"), "<invalid-url>");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let result = HttpGateway::new(ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn embed_sends_expected_fields_and_resolves_artifact() {
        let body = br#"{"status":"success","data":{"image_url":"/static/wm.png","psnr":42.5,"ssim":0.99}}"#.to_vec();
        let (addr, server) = serve_once("200 OK", "application/json", body);

        let gateway = gateway_for(addr);
        let outcome = gateway.embed(&embed_request()).await;
        let request = server.join().expect("server thread failed");

        let outcome = outcome.expect("embed should succeed");
        assert_eq!(outcome.image_url, format!("http://127.0.0.1:{}/static/wm.png", addr.port()));
        assert_eq!(outcome.psnr, 42.5);

        assert!(request.starts_with("POST /api/v1/embed "));
        assert!(request.contains("name=\"file\"; filename=\"cat.png\""));
        assert!(request.contains("Content-Type: image/png"));
        assert!(request.contains("name=\"text\"\r\n\r\nhello\r\n"));
        assert!(request.contains("name=\"alpha\"\r\n\r\n1.5\r\n"));
    }

    #[tokio::test]
    async fn extract_uses_role_specific_field_names() {
        let body = br#"{"data":{"decoded_text":"owner","confidence":0.87,"debug_info":{"status":"aligned"}}}"#.to_vec();
        let (addr, server) = serve_once("200 OK", "application/json", body);

        let gateway = gateway_for(addr);
        let request = ExtractRequest {
            original: ImageAsset::new("original.png", "image/png", PNG_HEADER.to_vec()),
            suspect: ImageAsset::new("suspect.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
        };
        let outcome = gateway.extract(&request).await.expect("extract should succeed");
        let raw = server.join().expect("server thread failed");

        assert_eq!(outcome.decoded_text, "owner");
        assert!(raw.starts_with("POST /api/v1/extract "));
        assert!(raw.contains("name=\"original_file\"; filename=\"original.png\""));
        assert!(raw.contains("name=\"suspect_file\"; filename=\"suspect.jpg\""));
    }

    #[tokio::test]
    async fn verify_posts_single_file() {
        let body = br#"{"data":{"decoded_text":"","confidence":0.1}}"#.to_vec();
        let (addr, server) = serve_once("200 OK", "application/json", body);

        let gateway = gateway_for(addr);
        let request = VerifyRequest {
            image: ImageAsset::new("photo.jpeg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
        };
        let outcome = gateway.verify(&request).await.expect("verify should succeed");
        let raw = server.join().expect("server thread failed");

        assert!(!outcome.recovered());
        assert!(raw.starts_with("POST /api/v1/verify "));
        assert!(raw.contains("name=\"file\"; filename=\"photo.jpeg\""));
    }

    #[tokio::test]
    async fn structured_error_body_maps_to_business() {
        let body = br#"{"status":"error","error_code":"INVALID_ALPHA","message":"Alpha out of range","suggestion":"Use a value between 0.1 and 5.0"}"#.to_vec();
        let (addr, server) = serve_once("400 Bad Request", "application/json", body);

        let result = gateway_for(addr).embed(&embed_request()).await;
        server.join().expect("server thread failed");

        match result {
            Err(GatewayError::Business { status, code, message, suggestion }) => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("INVALID_ALPHA"));
                assert_eq!(message, "Alpha out of range");
                assert_eq!(suggestion.as_deref(), Some("Use a value between 0.1 and 5.0"));
            }
            other => panic!("expected business error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bare_server_error_maps_to_transport() {
        let (addr, server) = serve_once("502 Bad Gateway", "text/html", b"<html>oops</html>".to_vec());

        let result = gateway_for(addr).embed(&embed_request()).await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn malformed_success_maps_to_protocol() {
        let (addr, server) = serve_once("200 OK", "application/json", br#"{"data":{"psnr":40}}"#.to_vec());

        let result = gateway_for(addr).embed(&embed_request()).await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(GatewayError::Protocol(_))));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");
        drop(listener);

        let result = gateway_for(addr).health().await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn stalled_server_maps_to_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let _ = read_request(&mut stream);
            thread::sleep(Duration::from_millis(2500));
        });

        let result = gateway_for(addr).health().await;
        server.join().expect("server thread failed");

        assert_eq!(result, Err(GatewayError::Timeout(1)));
    }

    #[tokio::test]
    async fn health_reports_service() {
        let body = br#"{"status":"ok","service":"InvisiGuard API"}"#.to_vec();
        let (addr, server) = serve_once("200 OK", "application/json", body);

        let report = gateway_for(addr).health().await.expect("health should succeed");
        let raw = server.join().expect("server thread failed");

        assert_eq!(report.status, "ok");
        assert_eq!(report.service, "InvisiGuard API");
        assert!(raw.starts_with("GET /api/v1/health "));
    }

    #[tokio::test]
    async fn download_artifact_writes_fixed_file_name() {
        let (addr, server) = serve_once("200 OK", "image/png", PNG_HEADER.to_vec());

        let gateway = gateway_for(addr);
        let dest = std::env::temp_dir().join(format!("invisiguard-download-{}", std::process::id()));
        let path = gateway
            .download_artifact("/static/wm.png?sig=1", &dest)
            .await
            .expect("download should succeed");
        let raw = server.join().expect("server thread failed");

        assert_eq!(path, dest.join("watermarked_image.png"));
        assert_eq!(std::fs::read(&path).expect("read artifact failed"), PNG_HEADER);
        assert!(raw.starts_with("GET /static/wm.png?sig=1 "));

        let _ = std::fs::remove_dir_all(&dest);
    }

    #[tokio::test]
    async fn download_artifact_propagates_http_errors() {
        let (addr, server) = serve_once("404 Not Found", "application/json", br#"{"detail":"Not Found"}"#.to_vec());

        let dest = std::env::temp_dir().join(format!("invisiguard-download-missing-{}", std::process::id()));
        let result = gateway_for(addr).download_artifact("/static/none.png", &dest).await;
        server.join().expect("server thread failed");

        assert!(matches!(
            result,
            Err(AppError::Gateway(GatewayError::Business { status: 404, .. }))
        ));
        assert!(!dest.join("watermarked_image.png").exists());
    }
}
