//! Same-origin download proxy support.
//!
//! Browsers ignore the `download` attribute for cross-origin links, so file
//! views link to a proxy endpoint that streams the remote bytes back with an
//! attachment disposition. The remote URL is only fetched if it matches the
//! policy's allow list, and bodies larger than `max_bytes` are cut off.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyPolicy {
    /// URL patterns; `*` matches any run of characters. A pattern without
    /// `*` is treated as a prefix.
    #[serde(default)]
    pub allow_prefixes: Vec<String>,
    #[serde(default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest remote body relayed to the browser.
    #[serde(default = "default_proxy_max_bytes")]
    pub max_bytes: u64,
}

fn default_proxy_timeout_ms() -> u64 {
    15000
}

fn default_proxy_max_bytes() -> u64 {
    100 * 1024 * 1024
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            allow_prefixes: Vec::new(),
            timeout_ms: default_proxy_timeout_ms(),
            max_bytes: default_proxy_max_bytes(),
        }
    }
}

impl ProxyPolicy {
    pub fn allows(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return false;
        }
        self.allow_prefixes.iter().any(|pattern| {
            if pattern.contains('*') {
                wildcard_match(pattern, url)
            } else {
                url.starts_with(pattern.as_str())
            }
        })
    }
}

fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut pos = 0usize;
    let mut first = true;
    for chunk in pattern.split('*') {
        if chunk.is_empty() {
            continue;
        }
        if first && !pattern.starts_with('*') {
            if !value[pos..].starts_with(chunk) {
                return false;
            }
            pos += chunk.len();
            first = false;
            continue;
        }
        match value[pos..].find(chunk) {
            Some(found) => pos += found + chunk.len(),
            None => return false,
        }
        first = false;
    }
    if !pattern.ends_with('*') {
        if let Some(last_chunk) = pattern.rsplit('*').next() {
            return value.ends_with(last_chunk);
        }
    }
    true
}

/// `<proxy_base>?url=<remote>&filename=<name>` with both values encoded.
pub fn download_proxy_url(proxy_base: &str, url: &str, file_name: &str) -> String {
    let sep = if proxy_base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}url={}&filename={}",
        proxy_base,
        sep,
        urlencoding::encode(url),
        urlencoding::encode(file_name)
    )
}

/// `attachment` disposition with a header-safe ASCII name plus an RFC 5987
/// encoded one for everything else.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let ascii = if ascii.trim().is_empty() {
        "download".to_string()
    } else {
        ascii
    };
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("missing 'url' query parameter")]
    MissingUrl,
    #[error("url '{0}' is not allowed by the download policy")]
    NotAllowed(String),
    #[error("upstream responded with status {0}")]
    Upstream(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote file is larger than the {limit} byte proxy limit")]
    TooLarge { limit: u64 },
}

/// An upstream response whose body has not been read yet.
pub struct Fetched {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send + 'static>,
    pub max_bytes: u64,
}

impl std::fmt::Debug for Fetched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetched")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

const CHUNK_BYTES: usize = 64 * 1024;

/// Blocking relay of `body` into `tx` in bounded chunks. Stops with an
/// error item once more than `max_bytes` arrive, and quietly when the
/// receiver goes away.
pub fn pump_body(
    mut body: impl Read,
    max_bytes: u64,
    tx: tokio::sync::mpsc::Sender<std::io::Result<Vec<u8>>>,
) {
    let mut sent = 0u64;
    loop {
        let mut chunk = vec![0u8; CHUNK_BYTES];
        let read = match body.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.blocking_send(Err(err));
                return;
            }
        };
        sent += read as u64;
        if sent > max_bytes {
            warn!(limit = max_bytes, "download proxy cut off an oversized body");
            let _ = tx.blocking_send(Err(std::io::Error::other(
                ProxyError::TooLarge { limit: max_bytes },
            )));
            return;
        }
        chunk.truncate(read);
        if tx.blocking_send(Ok(chunk)).is_err() {
            return;
        }
    }
}

/// Blocking fetch of `url` under `policy`. Run it off the async runtime.
pub fn fetch_remote(policy: &ProxyPolicy, url: &str) -> Result<Fetched, ProxyError> {
    if url.trim().is_empty() {
        return Err(ProxyError::MissingUrl);
    }
    if !policy.allows(url) {
        warn!(url, "download proxy refused url outside allow list");
        return Err(ProxyError::NotAllowed(url.to_string()));
    }
    let timeout = Duration::from_millis(policy.timeout_ms.max(1));
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .build();
    match agent.get(url).call() {
        Ok(resp) => {
            let content_type = resp
                .header("content-type")
                .unwrap_or("application/octet-stream")
                .to_string();
            let content_length = resp
                .header("content-length")
                .and_then(|len| len.trim().parse::<u64>().ok());
            if content_length.is_some_and(|len| len > policy.max_bytes) {
                warn!(url, limit = policy.max_bytes, "download proxy refused oversized file");
                return Err(ProxyError::TooLarge {
                    limit: policy.max_bytes,
                });
            }
            Ok(Fetched {
                content_type,
                content_length,
                body: Box::new(resp.into_reader()),
                max_bytes: policy.max_bytes,
            })
        }
        Err(ureq::Error::Status(code, _)) => Err(ProxyError::Upstream(code)),
        Err(ureq::Error::Transport(err)) => Err(ProxyError::Transport(err.to_string())),
    }
}
