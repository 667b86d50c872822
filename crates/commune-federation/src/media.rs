//! Media proxying between local storage and the federation network.
//!
//! Outbound: a locally uploaded file is read from object storage and pushed
//! to the remote media repository, yielding the content reference embedded in
//! the outgoing file message.
//!
//! Inbound: remote media is fetched through a fixed, ordered list of
//! candidate endpoints spanning several protocol versions and both secure and
//! insecure transport. Candidates are tried strictly sequentially — a later
//! endpoint is attempted only after the previous one definitively failed —
//! and the first 2xx response is streamed to the client without buffering.
//! The proxy always terminates in exactly one of 200, 404 or 500.

use std::{pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use commune_common::models::FileRecord;
use futures_util::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::BridgeError,
    services::MediaService,
    store::BridgeStore,
    types::ContentUri,
};

/// Per-candidate request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// `Cache-Control` max-age applied to proxied media.
pub const CACHE_MAX_AGE: u64 = 86_400;

const USER_AGENT: &str = concat!("Commune-Federation/", env!("CARGO_PKG_VERSION"));

// ─── Endpoint descriptors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Https,
    Http,
}

impl Transport {
    fn scheme(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// One candidate download endpoint.
#[derive(Debug, Clone)]
pub struct MediaEndpoint {
    pub name: &'static str,
    pub transport: Transport,
    pub url: String,
}

/// The fixed candidate list, in trial order.
pub fn media_endpoints(origin_server: &str, media_id: &str) -> Vec<MediaEndpoint> {
    const CANDIDATES: [(&str, Transport, &str); 7] = [
        ("media_v1_https", Transport::Https, "_matrix/media/v1/download"),
        ("media_v3_https", Transport::Https, "_matrix/media/v3/download"),
        ("media_v3_http", Transport::Http, "_matrix/media/v3/download"),
        ("media_r0_https", Transport::Https, "_matrix/media/r0/download"),
        ("media_r0_http", Transport::Http, "_matrix/media/r0/download"),
        ("client_v1_https", Transport::Https, "_matrix/client/v1/media/download"),
        ("client_v1_http", Transport::Http, "_matrix/client/v1/media/download"),
    ];

    CANDIDATES
        .iter()
        .map(|&(name, transport, path)| MediaEndpoint {
            name,
            transport,
            url: format!(
                "{}://{}/{}/{}/{}",
                transport.scheme(),
                origin_server,
                path,
                origin_server,
                media_id
            ),
        })
        .collect()
}

// ─── Fetching ────────────────────────────────────────────────────────────────

pub type MediaByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// A successful (2xx) response from a candidate endpoint.
pub struct FetchedMedia {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: MediaByteStream,
}

/// Issues one GET against a candidate endpoint.
///
/// `Err` carries the text recorded as the last error — either
/// `name: status reason` or the transport failure.
#[async_trait]
pub trait EndpointFetcher: Send + Sync {
    async fn fetch(&self, endpoint: &MediaEndpoint) -> Result<FetchedMedia, String>;
}

/// Production fetcher. Holds one certificate-lenient client for the https
/// candidates and one keep-alive client for the http candidates, both with
/// the fixed per-request timeout.
pub struct HttpFetcher {
    https: reqwest::Client,
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        // Remote media hosts frequently present certificates for a delegated
        // name rather than the origin server name in the content URI.
        let https = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .expect("failed to build https media client");

        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .expect("failed to build http media client");

        Self { https, http }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointFetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &MediaEndpoint) -> Result<FetchedMedia, String> {
        let client = match endpoint.transport {
            Transport::Https => &self.https,
            Transport::Http => &self.http,
        };

        let resp = client
            .get(&endpoint.url)
            .header("Accept", "*/*")
            .send()
            .await
            .map_err(|e| format!("{}: {}", endpoint.name, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!(
                "{}: {} {}",
                endpoint.name,
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let content_length = resp.content_length();
        let body = resp
            .bytes_stream()
            .map_err(|e| BridgeError::Http(e.to_string()))
            .boxed();

        Ok(FetchedMedia { content_type, content_length, body })
    }
}

// ─── Response sink ───────────────────────────────────────────────────────────

/// Narrow interface over the HTTP response being produced: status setter,
/// header setter, streaming body writer.
#[async_trait]
pub trait MediaSink: Send {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()>;
}

// ─── Proxy ───────────────────────────────────────────────────────────────────

/// Relays media in both directions across the bridge.
pub struct MediaProxy {
    store: Arc<dyn BridgeStore>,
    media: Arc<dyn MediaService>,
    fetcher: Arc<dyn EndpointFetcher>,
}

impl MediaProxy {
    pub fn new(store: Arc<dyn BridgeStore>, media: Arc<dyn MediaService>) -> Self {
        Self::with_fetcher(store, media, Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(
        store: Arc<dyn BridgeStore>,
        media: Arc<dyn MediaService>,
        fetcher: Arc<dyn EndpointFetcher>,
    ) -> Self {
        Self { store, media, fetcher }
    }

    // ── Outbound ────────────────────────────────────────────────────────────

    /// Push a locally uploaded file to the remote media repository and return
    /// its content reference.
    pub async fn prepare_local_file(&self, file_id: Uuid) -> Result<ContentUri, BridgeError> {
        let file = self
            .store
            .file_by_id(file_id)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("file {file_id}")))?;
        let data = self.store.file_data(&file).await?;
        self.media.upload_file(&file, data).await
    }

    /// Fetch a remote file's bytes through the protocol media capability,
    /// for in-process use (previews, thumbnails). Proxying to a client goes
    /// through [`MediaProxy::download_remote_file`] instead.
    pub async fn fetch_remote_bytes(
        &self,
        content_uri: &str,
    ) -> Result<Option<Vec<u8>>, BridgeError> {
        let Some(uri) = ContentUri::parse(content_uri) else {
            warn!(%content_uri, "Invalid content reference");
            return Ok(None);
        };
        self.media.download_file(&uri.server, &uri.media_id).await
    }

    // ── Inbound ─────────────────────────────────────────────────────────────

    /// Download a remote file and stream it to the client.
    ///
    /// Always terminates in an HTTP status on the sink; never returns an
    /// error to the caller.
    pub async fn download_remote_file(&self, file: &FileRecord, sink: &mut dyn MediaSink) {
        if let Err(error) = self.proxy_remote_file(file, sink).await {
            error!(file = %file.id, %error, "Error while proxying remote file");
            sink.set_status(500);
            if let Err(e) = sink.write(b"Internal server error").await {
                debug!(error = %e, "Failed to write error response");
            }
        }
    }

    async fn proxy_remote_file(
        &self,
        file: &FileRecord,
        sink: &mut dyn MediaSink,
    ) -> Result<(), BridgeError> {
        // 1. Required metadata: content URI + origin server + media id. No
        //    network calls are made when any of it is missing.
        let Some((content_uri, server_name, media_id)) = remote_metadata(file) else {
            warn!(file = %file.id, "Remote file metadata missing");
            sink.set_status(404);
            let _ = sink.write(b"Remote file metadata missing").await;
            return Ok(());
        };

        // 2. A parsed content URI is authoritative; the explicit metadata
        //    fields are the fallback.
        let (origin_server, media_id) = match ContentUri::parse(content_uri) {
            Some(uri) => (uri.server, uri.media_id),
            None => (server_name.to_owned(), media_id.to_owned()),
        };

        // 3-4. Sequential trial over the fixed candidate list.
        let endpoints = media_endpoints(&origin_server, &media_id);
        let mut last_error: Option<String> = None;
        let mut fetched: Option<FetchedMedia> = None;

        for endpoint in &endpoints {
            debug!(endpoint = endpoint.name, url = %endpoint.url, "Trying media endpoint");
            match self.fetcher.fetch(endpoint).await {
                Ok(media) => {
                    info!(endpoint = endpoint.name, "Fetched remote media");
                    fetched = Some(media);
                    break;
                }
                Err(e) => {
                    warn!(endpoint = endpoint.name, error = %e, "Media endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        // 5. Total failure.
        let Some(media) = fetched else {
            let reason = last_error.unwrap_or_else(|| "no endpoints available".to_owned());
            error!(file = %file.id, %origin_server, %media_id, %reason,
                "Failed to fetch remote file from all endpoints");
            sink.set_status(404);
            let _ = sink.write(format!("Failed to fetch remote file: {reason}").as_bytes()).await;
            return Ok(());
        };

        // 6. Forward headers and stream the body.
        let content_type = media.content_type.clone().unwrap_or_else(|| {
            if file.content_type.is_empty() {
                "application/octet-stream".to_owned()
            } else {
                file.content_type.clone()
            }
        });
        sink.set_header("Content-Type", &content_type);
        if let Some(length) = media.content_length {
            sink.set_header("Content-Length", &length.to_string());
        }
        sink.set_header(
            "Content-Disposition",
            &format!("inline; filename=\"{}\"", urlencoded(&file.name)),
        );
        sink.set_header("Cache-Control", &format!("public, max-age={CACHE_MAX_AGE}"));
        sink.set_status(200);

        let mut body = media.body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    if let Err(e) = sink.write(&bytes).await {
                        debug!(file = %file.id, error = %e, "Client went away mid-stream");
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(file = %file.id, error = %e, "Remote media stream interrupted");
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

/// The (content_uri, origin_server, media_id) triple when fully present.
fn remote_metadata(file: &FileRecord) -> Option<(&str, &str, &str)> {
    let federation = file.federation.as_ref()?;
    Some((
        federation.content_uri.as_deref()?,
        federation.origin_server.as_deref()?,
        federation.media_id.as_deref()?,
    ))
}

fn urlencoded(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
