//! Asset fetcher: resolves stored-asset references to raw bytes.
//!
//! Handles authenticated/proxied retrieval of private storage objects,
//! a fixed-delay retry chain with an optional fallback URL, and
//! best-effort HEIC→JPEG normalization. Each call is independent; there
//! is no caching here, so callers needing memoization must wrap it.

use std::io::Cursor;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::AssetRef;

/// Supplies the bearer token attached to proxied storage requests.
///
/// The hosting application owns token acquisition (cookie jar, local
/// store, ...); the engine only consumes whatever this yields. A `None`
/// is not fatal — requests proceed unauthenticated and may still
/// succeed for public assets.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// No credentials at all.
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// A fixed token, handed in by the caller (CLI flag, test, ...).
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Ordered lookup across several providers; the first token wins.
///
/// Mirrors the host portal's auth-cookie → cookie-header → local-store
/// resolution order, consolidated behind one injected capability.
#[derive(Default)]
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Box<dyn CredentialProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl CredentialProvider for CredentialChain {
    fn bearer_token(&self) -> Option<String> {
        self.providers.iter().find_map(|p| p.bearer_token())
    }
}

/// Per-call retry policy.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Attempts per URL before giving up on it.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// After the primary URL is exhausted, the whole retry sequence is
    /// repeated once against this URL.
    pub fallback_url: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            fallback_url: None,
        }
    }
}

/// Where the proxy endpoint lives and which storage namespace needs it.
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    /// Origin carrying the proxy endpoint, e.g. `https://portal.example.com`.
    pub base_url: String,
    /// Path marker identifying the private storage namespace.
    pub private_prefix: String,
    /// Same-origin proxy endpoint accepting `?url=<original>&mode=stream`.
    pub proxy_path: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            base_url: String::new(),
            private_prefix: "/storage/private/".to_string(),
            proxy_path: "/api/storage/proxy".to_string(),
        }
    }
}

/// A successfully resolved asset.
#[derive(Clone, Debug)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ResolvedTarget {
    /// Public asset, requested directly and unauthenticated.
    Direct(String),
    /// Private asset, routed through the same-origin proxy.
    Proxied { endpoint: String, original: String },
}

pub struct AssetFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    credentials: Box<dyn CredentialProvider>,
}

impl AssetFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        AssetFetcher {
            client: reqwest::Client::new(),
            config,
            credentials: Box::new(Anonymous),
        }
    }

    pub fn with_credentials(mut self, credentials: Box<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Resolve an asset reference to raw bytes.
    ///
    /// Retries the primary URL `max_retries` times with a fixed delay,
    /// then repeats the sequence once against `fallback_url` if one was
    /// supplied. HEIC payloads are normalized to JPEG on the way out.
    pub async fn fetch(&self, asset: &AssetRef, opts: &FetchOptions) -> Result<FetchedAsset> {
        match self.fetch_with_retries(&asset.url, asset, opts).await {
            Ok(fetched) => Ok(normalize(fetched)),
            Err(primary_err) => {
                let Some(fallback) = opts.fallback_url.as_deref() else {
                    return Err(primary_err);
                };
                log::warn!(
                    "primary asset url exhausted ({primary_err}), retrying via fallback {fallback}"
                );
                self.fetch_with_retries(fallback, asset, opts)
                    .await
                    .map(normalize)
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        url: &str,
        asset: &AssetRef,
        opts: &FetchOptions,
    ) -> Result<FetchedAsset> {
        let attempts = opts.max_retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.fetch_once(url, asset).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => {
                    log::debug!("fetch attempt {attempt}/{attempts} for {url} failed: {e}");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(opts.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::AssetFetch {
            url: url.to_string(),
            reason: "no attempts made".to_string(),
        }))
    }

    async fn fetch_once(&self, url: &str, asset: &AssetRef) -> Result<FetchedAsset> {
        let fetch_err = |reason: String| Error::AssetFetch {
            url: url.to_string(),
            reason,
        };

        let request = match self.resolve(url) {
            ResolvedTarget::Direct(direct) => self.client.get(direct),
            ResolvedTarget::Proxied { endpoint, original } => {
                let mut req = self
                    .client
                    .get(endpoint)
                    .query(&[("url", original.as_str()), ("mode", "stream")]);
                if let Some(token) = self.credentials.bearer_token() {
                    req = req.bearer_auth(token);
                }
                req
            }
        };

        let response = request.send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("unexpected status {status}")));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .to_vec();

        let content_type = header_type
            .filter(|t| !t.is_empty() && t != "application/octet-stream")
            .or_else(|| asset.content_type.clone())
            .unwrap_or_else(|| sniff_content_type(&bytes).to_string());

        Ok(FetchedAsset { bytes, content_type })
    }

    pub(crate) fn resolve(&self, url: &str) -> ResolvedTarget {
        if url.contains(&self.config.private_prefix) {
            ResolvedTarget::Proxied {
                endpoint: format!("{}{}", self.config.base_url, self.config.proxy_path),
                original: url.to_string(),
            }
        } else {
            ResolvedTarget::Direct(url.to_string())
        }
    }
}

/// Best-effort HEIC detection: scan the leading bytes for an `ftypheic`
/// family brand. This is a heuristic, not a container parse, so files
/// the marker scan would have accepted are never rejected downstream.
pub(crate) fn looks_like_heic(bytes: &[u8]) -> bool {
    const BRANDS: [&[u8]; 3] = [b"ftypheic", b"ftypheif", b"ftypheix"];
    let window = &bytes[..bytes.len().min(32)];
    window
        .windows(8)
        .any(|w| BRANDS.iter().any(|brand| w == *brand))
}

/// Convert HEIC payloads to JPEG. Conversion failure degrades to the
/// original bytes with a best-guess content type rather than failing
/// the whole fetch.
fn normalize(asset: FetchedAsset) -> FetchedAsset {
    if !looks_like_heic(&asset.bytes) {
        return asset;
    }
    match image::load_from_memory(&asset.bytes) {
        Ok(img) => {
            let mut out = Vec::new();
            let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
            match rgb.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg) {
                Ok(()) => FetchedAsset {
                    bytes: out,
                    content_type: "image/jpeg".to_string(),
                },
                Err(e) => keep_original(asset, &e.to_string()),
            }
        }
        Err(e) => keep_original(asset, &e.to_string()),
    }
}

fn keep_original(asset: FetchedAsset, reason: &str) -> FetchedAsset {
    log::warn!("HEIC conversion failed ({reason}); passing original bytes through");
    let content_type = if asset.content_type.is_empty() {
        "image/heic".to_string()
    } else {
        asset.content_type
    };
    FetchedAsset {
        bytes: asset.bytes,
        content_type,
    }
}

fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"%PDF") {
        "application/pdf"
    } else if looks_like_heic(bytes) {
        "image/heic"
    } else {
        "application/octet-stream"
    }
}
