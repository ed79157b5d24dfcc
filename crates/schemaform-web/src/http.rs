//! HTTP transport for uploads: a JSON signing call followed by a raw PUT of
//! the file bytes to the signed destination.

use schemaform_core::error::UploadError;
use schemaform_core::upload::{FileSelection, SignRequest, SignedUpload, UploadBackend};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEndpoints {
    pub sign_url: String,
    #[serde(default = "default_upload_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_upload_timeout_ms() -> u64 {
    30000
}

impl UploadEndpoints {
    pub fn new(sign_url: impl Into<String>) -> Self {
        Self {
            sign_url: sign_url.into(),
            timeout_ms: default_upload_timeout_ms(),
        }
    }
}

/// Blocking `ureq` calls, each moved onto tokio's blocking pool.
#[derive(Clone)]
pub struct HttpUploadBackend {
    endpoints: UploadEndpoints,
    agent: ureq::Agent,
}

impl HttpUploadBackend {
    pub fn new(endpoints: UploadEndpoints) -> Self {
        let timeout = Duration::from_millis(endpoints.timeout_ms.max(1));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self { endpoints, agent }
    }
}

fn sign_blocking(agent: &ureq::Agent, sign_url: &str, request: &SignRequest) -> Result<SignedUpload, UploadError> {
    let body = serde_json::to_string(request).map_err(|e| UploadError::Signing(e.to_string()))?;
    let response = agent
        .post(sign_url)
        .set("content-type", "application/json")
        .send_string(&body);
    match response {
        Ok(resp) => {
            let text = resp
                .into_string()
                .map_err(|e| UploadError::Signing(format!("unreadable response: {e}")))?;
            serde_json::from_str::<SignedUpload>(&text)
                .map_err(|e| UploadError::Signing(format!("unexpected response: {e}")))
        }
        Err(ureq::Error::Status(code, _)) => {
            Err(UploadError::Signing(format!("signing endpoint returned status {code}")))
        }
        Err(ureq::Error::Transport(err)) => Err(UploadError::Transport(err.to_string())),
    }
}

fn transfer_blocking(agent: &ureq::Agent, upload_url: &str, file: &FileSelection) -> Result<(), UploadError> {
    let content_type = if file.file_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        file.file_type.as_str()
    };
    match agent
        .put(upload_url)
        .set("content-type", content_type)
        .send_bytes(&file.bytes)
    {
        Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
        Ok(resp) => Err(UploadError::Rejected {
            status: resp.status(),
        }),
        Err(ureq::Error::Status(code, _)) => Err(UploadError::Rejected { status: code }),
        Err(ureq::Error::Transport(err)) => Err(UploadError::Transport(err.to_string())),
    }
}

impl UploadBackend for HttpUploadBackend {
    async fn sign(&self, request: &SignRequest) -> Result<SignedUpload, UploadError> {
        let agent = self.agent.clone();
        let sign_url = self.endpoints.sign_url.clone();
        let request = request.clone();
        debug!(file = %request.file_name, folder = %request.folder_name, "requesting upload signature");
        tokio::task::spawn_blocking(move || sign_blocking(&agent, &sign_url, &request))
            .await
            .map_err(|e| UploadError::Transport(format!("signing task failed: {e}")))?
    }

    async fn transfer(&self, signed: &SignedUpload, file: &FileSelection) -> Result<(), UploadError> {
        let agent = self.agent.clone();
        let upload_url = signed.upload_url.clone();
        let file = file.clone();
        debug!(file = %file.file_name, bytes = file.bytes.len(), "transferring upload");
        tokio::task::spawn_blocking(move || transfer_blocking(&agent, &upload_url, &file))
            .await
            .map_err(|e| UploadError::Transport(format!("transfer task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// One-shot HTTP server answering with `status` and `body`, returning the
    /// raw request it received.
    fn serve_once(status: u16, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).expect("read");
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn request() -> SignRequest {
        SignRequest {
            file_name: "id.png".into(),
            file_type: "image/png".into(),
            folder_name: "kyc".into(),
        }
    }

    #[tokio::test]
    async fn sign_posts_camel_case_json() {
        let (base, server) = serve_once(200, r#"{"uploadURL":"https://put.test/1","fileURL":"https://cdn.test/kyc/id.png"}"#);
        let backend = HttpUploadBackend::new(UploadEndpoints::new(format!("{base}/sign")));
        let signed = backend.sign(&request()).await.expect("signed");
        assert_eq!(signed.file_url, "https://cdn.test/kyc/id.png");

        let raw = server.join().expect("server");
        assert!(raw.starts_with("POST /sign"));
        assert!(raw.contains(r#""fileName":"id.png""#));
        assert!(raw.contains(r#""folderName":"kyc""#));
    }

    #[tokio::test]
    async fn sign_failure_is_reported() {
        let (base, server) = serve_once(500, "{}");
        let backend = HttpUploadBackend::new(UploadEndpoints::new(base));
        let err = backend.sign(&request()).await.expect_err("should fail");
        assert!(matches!(err, UploadError::Signing(msg) if msg.contains("500")));
        server.join().expect("server");
    }

    #[tokio::test]
    async fn transfer_puts_bytes_and_maps_status() {
        let (base, server) = serve_once(200, "");
        let backend = HttpUploadBackend::new(UploadEndpoints::new("unused"));
        let signed = SignedUpload {
            upload_url: format!("{base}/bucket/id.png"),
            file_url: "https://cdn.test/id.png".into(),
        };
        let file = FileSelection::new("id.png", "image/png", b"PNGDATA".to_vec());
        backend.transfer(&signed, &file).await.expect("transfer");
        let raw = server.join().expect("server");
        assert!(raw.starts_with("PUT /bucket/id.png"));
        assert!(raw.to_ascii_lowercase().contains("content-type: image/png"));
        assert!(raw.ends_with("PNGDATA"));

        let (base, server) = serve_once(403, "");
        let signed = SignedUpload {
            upload_url: format!("{base}/denied"),
            file_url: String::new(),
        };
        assert_eq!(
            backend.transfer(&signed, &file).await,
            Err(UploadError::Rejected { status: 403 })
        );
        server.join().expect("server");
    }

    #[test]
    fn endpoints_default_timeout() {
        let endpoints: UploadEndpoints =
            serde_json::from_str(r#"{"signUrl": "https://api.test/sign"}"#).expect("endpoints");
        assert_eq!(endpoints.timeout_ms, 30000);
    }
}
