use crate::download::{ProxyError, ProxyPolicy, content_disposition, fetch_remote, pump_body};
use crate::form::{FormOptions, render_form, render_options};
use crate::html::escape_html;
use crate::page::{Theme, render_page};
use crate::view::{ViewOptions, render_view};
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Json, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use schemaform_core::media::file_name_from_url;
use schemaform_core::upload::{Completion, FileSelection, UploadBackend, UploadTarget, perform_upload};
use schemaform_core::{FormEvent, FormSchema, FormSession, SubmitError, resolve_view};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub type SubmitHandler = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Largest file `/upload` accepts unless configured otherwise.
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

struct FormHost {
    schema: FormSchema,
    session: FormSession,
}

/// Serves one live form over HTTP. The session is shared behind a mutex
/// that is never held across an upload's network calls.
pub struct AxumFormAdapter<B> {
    host: Arc<Mutex<FormHost>>,
    backend: Arc<B>,
    proxy: Arc<ProxyPolicy>,
    theme: Theme,
    on_submit: SubmitHandler,
    upload_limit_bytes: usize,
}

impl<B> Clone for AxumFormAdapter<B> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            backend: Arc::clone(&self.backend),
            proxy: Arc::clone(&self.proxy),
            theme: self.theme.clone(),
            on_submit: Arc::clone(&self.on_submit),
            upload_limit_bytes: self.upload_limit_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub path: String,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    pub filename: String,
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
}

impl UploadQuery {
    fn target(&self) -> Result<UploadTarget, String> {
        match (self.slot.as_deref().unwrap_or("value"), self.index) {
            ("value", _) => Ok(UploadTarget::value(self.path.clone())),
            ("append", _) => Ok(UploadTarget::append(self.path.clone())),
            ("item", Some(index)) => Ok(UploadTarget::item(self.path.clone(), index)),
            ("item", None) => Err("slot 'item' requires an index".to_string()),
            (other, _) => Err(format!("unknown upload slot '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    pub path: String,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

fn default_submit_handler(state: &Value) {
    info!(state = %state, "form submitted");
}

impl<B> AxumFormAdapter<B>
where
    B: UploadBackend + Send + Sync + 'static,
{
    pub fn new(schema: FormSchema, backend: B) -> Self {
        let session = FormSession::from_schema(&schema);
        Self {
            host: Arc::new(Mutex::new(FormHost { schema, session })),
            backend: Arc::new(backend),
            proxy: Arc::new(ProxyPolicy::default()),
            theme: Theme::default(),
            on_submit: Arc::new(default_submit_handler),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
        }
    }

    /// Request body cap for `/upload`, replacing axum's 2 MB default.
    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit_bytes = bytes;
        self
    }

    pub fn with_proxy_policy(mut self, policy: ProxyPolicy) -> Self {
        self.proxy = Arc::new(policy);
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_submit_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_submit = Arc::new(handler);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, FormHost>, Response> {
        self.host.lock().map_err(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to lock form session").into_response()
        })
    }

    /// Swap in a new schema, keeping the values entered so far. Uploads
    /// still in flight for the old session are abandoned.
    pub fn replace_schema(&self, schema: FormSchema) -> Result<(), String> {
        let mut host = self
            .host
            .lock()
            .map_err(|_| "failed to lock form session".to_string())?;
        host.session.abandon_uploads();
        let state = host.session.state().clone();
        host.session = FormSession::new(schema.fields.clone(), Some(state));
        host.schema = schema;
        info!("form schema replaced");
        Ok(())
    }

    pub fn state(&self) -> Option<Value> {
        self.host.lock().ok().map(|host| host.session.state().clone())
    }

    fn title(host: &FormHost) -> String {
        host.schema.title.clone().unwrap_or_else(|| "Form".to_string())
    }

    fn fragment(host: &FormHost, options: &FormOptions, notice: Option<&str>) -> String {
        let notice = notice
            .map(|msg| format!("<p class=\"sf-error\" role=\"alert\">{}</p>\n", escape_html(msg)))
            .unwrap_or_default();
        format!("{}{}", notice, render_form(&host.session, options))
    }

    pub fn render_index(&self) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let body = Self::fragment(&host, &FormOptions::default(), None);
        Html(render_page(&Self::title(&host), &body, &self.theme, Some(""))).into_response()
    }

    pub fn render_fragment(&self) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        Html(Self::fragment(&host, &FormOptions::default(), None)).into_response()
    }

    /// Read-only detail page of the current state.
    pub fn render_detail(&self) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let entries = resolve_view(&host.schema.view_descriptors(), host.session.state());
        let body = render_view(&entries, &ViewOptions::default());
        Html(render_page(&Self::title(&host), &body, &self.theme, None)).into_response()
    }

    pub fn apply_event(&self, event: FormEvent) -> Response {
        let mut host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        match host.session.apply(event) {
            Ok(()) => Html(Self::fragment(&host, &FormOptions::default(), None)).into_response(),
            Err(err) => {
                warn!(%err, "form event rejected");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Html(Self::fragment(&host, &FormOptions::default(), Some(&err.to_string()))),
                )
                    .into_response()
            }
        }
    }

    /// `<option>` list of a select narrowed to labels matching the query.
    pub fn search_options(&self, query: OptionsQuery) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let matches = match host.session.search_options(&query.path, &query.q) {
            Ok(matches) => matches,
            Err(err) => return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response(),
        };
        let allow_others = host
            .session
            .field(&query.path)
            .is_ok_and(|field| field.kind.offers_others());
        let value = host.session.value(&query.path);
        Html(render_options(&matches, value, allow_others)).into_response()
    }

    /// Register, run and apply one upload. The session lock is released
    /// while the file is signed and transferred.
    pub async fn upload(&self, query: UploadQuery, body: Bytes) -> Response {
        let target = match query.target() {
            Ok(t) => t,
            Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
        };
        let file = FileSelection::new(
            query.filename,
            query.file_type.unwrap_or_default(),
            body.to_vec(),
        );

        let ticket = {
            let mut host = match self.lock() {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            let dispatched = host
                .session
                .select_file(target, file)
                .and_then(|id| host.session.dispatch_upload(id));
            match dispatched {
                Ok(ticket) => ticket,
                Err(err) => {
                    warn!(%err, "upload rejected");
                    return (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Html(Self::fragment(&host, &FormOptions::default(), Some(&err.to_string()))),
                    )
                        .into_response();
                }
            }
        };

        let outcome = perform_upload(self.backend.as_ref(), ticket).await;

        let mut host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        match host.session.complete_upload(outcome) {
            Completion::Applied(task) => debug!(path = %task.target.owner_path, "upload stored"),
            Completion::Failed { target, error } => {
                warn!(path = %target.owner_path, %error, "upload failed")
            }
            Completion::Discarded => debug!("late upload result discarded"),
        }
        Html(Self::fragment(&host, &FormOptions::default(), None)).into_response()
    }

    pub fn submit(&self) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        match host.session.submit(|state| (self.on_submit)(state)) {
            Ok(()) => Html(format!(
                "<p class=\"sf-notice\" role=\"status\">Saved.</p>\n{}",
                render_form(&host.session, &FormOptions::default())
            ))
            .into_response(),
            Err(err @ SubmitError::UploadsPending { .. }) => (
                StatusCode::CONFLICT,
                Html(Self::fragment(&host, &FormOptions::default(), Some(&err.to_string()))),
            )
                .into_response(),
            Err(SubmitError::Invalid(report)) => {
                let options = FormOptions {
                    errors: Some(report),
                    ..FormOptions::default()
                };
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Html(Self::fragment(&host, &options, None)),
                )
                    .into_response()
            }
        }
    }

    pub async fn download(&self, query: DownloadQuery) -> Response {
        proxy_download(Arc::clone(&self.proxy), query).await
    }

    pub fn router(self) -> Router {
        let upload_limit = DefaultBodyLimit::max(self.upload_limit_bytes);
        Router::new()
            .route("/", get(route_index::<B>))
            .route("/form", get(route_fragment::<B>))
            .route("/view", get(route_detail::<B>))
            .route("/state", get(route_state::<B>))
            .route("/event", post(route_event::<B>))
            .route("/options", get(route_options::<B>))
            .route("/upload", post(route_upload::<B>).layer(upload_limit))
            .route("/submit", post(route_submit::<B>))
            .route("/download", get(route_download::<B>))
            .with_state(self)
    }
}

/// Fetch an allow-listed remote file and stream it back as an attachment.
pub async fn proxy_download(policy: Arc<ProxyPolicy>, query: DownloadQuery) -> Response {
    let url = query.url.unwrap_or_default();
    let file_name = query
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| file_name_from_url(&url));
    let fetched = tokio::task::spawn_blocking(move || fetch_remote(&policy, &url)).await;
    match fetched {
        Ok(Ok(file)) => {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            let max_bytes = file.max_bytes;
            let body = file.body;
            tokio::task::spawn_blocking(move || pump_body(body, max_bytes, tx));
            let chunks = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            (
                [
                    (header::CONTENT_TYPE, file.content_type),
                    (header::CONTENT_DISPOSITION, content_disposition(&file_name)),
                ],
                Body::from_stream(chunks),
            )
                .into_response()
        }
        Ok(Err(err)) => {
            let status = match err {
                ProxyError::MissingUrl => StatusCode::BAD_REQUEST,
                ProxyError::NotAllowed(_) => StatusCode::FORBIDDEN,
                ProxyError::Upstream(_) | ProxyError::Transport(_) | ProxyError::TooLarge { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (status, err.to_string()).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("download task failed: {err}"),
        )
            .into_response(),
    }
}

/// Just the download proxy, for apps that render views themselves.
pub fn download_router(policy: ProxyPolicy) -> Router {
    Router::new()
        .route("/download", get(route_proxy_only))
        .with_state(Arc::new(policy))
}

async fn route_proxy_only(
    State(policy): State<Arc<ProxyPolicy>>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    proxy_download(policy, query).await
}

async fn route_index<B>(State(adapter): State<AxumFormAdapter<B>>) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.render_index()
}

async fn route_fragment<B>(State(adapter): State<AxumFormAdapter<B>>) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.render_fragment()
}

async fn route_detail<B>(State(adapter): State<AxumFormAdapter<B>>) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.render_detail()
}

async fn route_state<B>(State(adapter): State<AxumFormAdapter<B>>) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    match adapter.state() {
        Some(state) => Json(state).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "failed to lock form session").into_response(),
    }
}

async fn route_event<B>(
    State(adapter): State<AxumFormAdapter<B>>,
    Json(event): Json<FormEvent>,
) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.apply_event(event)
}

async fn route_options<B>(
    State(adapter): State<AxumFormAdapter<B>>,
    Query(query): Query<OptionsQuery>,
) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.search_options(query)
}

async fn route_upload<B>(
    State(adapter): State<AxumFormAdapter<B>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.upload(query, body).await
}

async fn route_submit<B>(State(adapter): State<AxumFormAdapter<B>>) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.submit()
}

async fn route_download<B>(
    State(adapter): State<AxumFormAdapter<B>>,
    Query(query): Query<DownloadQuery>,
) -> Response
where
    B: UploadBackend + Send + Sync + 'static,
{
    adapter.download(query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaform_core::error::UploadError;
    use schemaform_core::upload::{SignRequest, SignedUpload};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemoryBackend;

    impl UploadBackend for MemoryBackend {
        async fn sign(&self, request: &SignRequest) -> Result<SignedUpload, UploadError> {
            Ok(SignedUpload {
                upload_url: format!("https://put.test/{}", request.file_name),
                file_url: format!("https://cdn.test/{}/{}", request.folder_name, request.file_name),
            })
        }

        async fn transfer(&self, _signed: &SignedUpload, file: &FileSelection) -> Result<(), UploadError> {
            if file.file_name == "blocked.png" {
                return Err(UploadError::Rejected { status: 403 });
            }
            Ok(())
        }
    }

    fn schema() -> FormSchema {
        FormSchema::from_json(
            r#"{
                "title": "New lead",
                "fields": [
                    {"label": "Name", "path": "lead.name", "kind": "text", "required": true},
                    {"label": "Photo", "path": "lead.photo", "kind": "file", "folderHint": "faces"}
                ]
            }"#,
        )
        .expect("schema")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn upload_query(path: &str, filename: &str) -> UploadQuery {
        UploadQuery {
            path: path.to_string(),
            slot: None,
            index: None,
            filename: filename.to_string(),
            file_type: Some("image/png".to_string()),
        }
    }

    #[tokio::test]
    async fn index_renders_full_page() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        let response = adapter.render_index();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<title>New lead</title>"));
        assert!(html.contains("data-path=\"lead.name\""));
    }

    #[tokio::test]
    async fn events_update_state() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        let response = adapter.apply_event(FormEvent::Input {
            path: "lead.name".into(),
            value: json!("Meera"),
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(adapter.state(), Some(json!({"lead": {"name": "Meera"}})));

        let rejected = adapter.apply_event(FormEvent::Toggle {
            path: "lead.name".into(),
            checked: true,
        });
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn upload_writes_url_and_failures_keep_value() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        let ok = adapter
            .upload(upload_query("lead.photo", "me.png"), Bytes::from_static(b"png"))
            .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(
            adapter.state(),
            Some(json!({"lead": {"photo": "https://cdn.test/faces/me.png"}}))
        );

        let failed = adapter
            .upload(upload_query("lead.photo", "blocked.png"), Bytes::from_static(b"png"))
            .await;
        let html = body_text(failed).await;
        assert!(html.contains("Could not upload blocked.png"));
        assert_eq!(
            adapter.state(),
            Some(json!({"lead": {"photo": "https://cdn.test/faces/me.png"}}))
        );
    }

    #[tokio::test]
    async fn bad_upload_slot_is_rejected() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        let mut query = upload_query("lead.photo", "me.png");
        query.slot = Some("item".into());
        let response = adapter.upload(query, Bytes::from_static(b"png")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_validates_then_calls_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend).with_submit_handler(move |state| {
            assert_eq!(state["lead"]["name"], json!("Meera"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let refused = adapter.submit();
        assert_eq!(refused.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(refused).await.contains("Name is required"));

        adapter.apply_event(FormEvent::Input {
            path: "lead.name".into(),
            value: json!("Meera"),
        });
        let accepted = adapter.submit();
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schema_reload_keeps_entered_values() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        adapter.apply_event(FormEvent::Input {
            path: "lead.name".into(),
            value: json!("Meera"),
        });
        let mut next = schema();
        next.title = Some("Edit lead".into());
        adapter.replace_schema(next).expect("replace");
        let html = body_text(adapter.render_index()).await;
        assert!(html.contains("<title>Edit lead</title>"));
        assert!(html.contains("value=\"Meera\""));
    }

    #[tokio::test]
    async fn download_refuses_urls_outside_policy() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend).with_proxy_policy(ProxyPolicy {
            allow_prefixes: vec!["https://cdn.test/".into()],
            ..ProxyPolicy::default()
        });
        let response = adapter
            .download(DownloadQuery {
                url: Some("https://elsewhere.test/secret.pdf".into()),
                filename: None,
            })
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let missing = adapter
            .download(DownloadQuery {
                url: None,
                filename: None,
            })
            .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    async fn upstream() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let files = Router::new()
            .route("/kyc.pdf", get(|| async { vec![5u8; 300 * 1024] }))
            .route(
                "/stream.bin",
                get(|| async {
                    let chunks = (0..5).map(|_| Ok::<_, std::io::Error>(vec![9u8; 64 * 1024]));
                    Body::from_stream(futures_util::stream::iter(chunks))
                }),
            );
        tokio::spawn(async move {
            let _ = axum::serve(listener, files).await;
        });
        addr
    }

    fn download_of(addr: std::net::SocketAddr, file: &str) -> DownloadQuery {
        DownloadQuery {
            url: Some(format!("http://{addr}/{file}")),
            filename: None,
        }
    }

    #[tokio::test]
    async fn download_streams_allowed_files() {
        let addr = upstream().await;
        let policy = Arc::new(ProxyPolicy {
            allow_prefixes: vec![format!("http://{addr}/")],
            ..ProxyPolicy::default()
        });
        let response = proxy_download(policy, download_of(addr, "kyc.pdf")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"kyc.pdf\"; filename*=UTF-8''kyc.pdf"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(body.len(), 300 * 1024);
    }

    #[tokio::test]
    async fn download_enforces_the_size_limit() {
        let addr = upstream().await;
        let policy = Arc::new(ProxyPolicy {
            allow_prefixes: vec![format!("http://{addr}/")],
            max_bytes: 100 * 1024,
            ..ProxyPolicy::default()
        });

        // Declared length over the limit: refused before any body is relayed.
        let declared = proxy_download(Arc::clone(&policy), download_of(addr, "kyc.pdf")).await;
        assert_eq!(declared.status(), StatusCode::BAD_GATEWAY);

        // Chunked body: the stream is cut off once the limit is passed.
        let chunked = proxy_download(policy, download_of(addr, "stream.bin")).await;
        assert_eq!(chunked.status(), StatusCode::OK);
        assert!(
            axum::body::to_bytes(chunked.into_body(), usize::MAX)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn detail_view_is_read_only() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        adapter.apply_event(FormEvent::Input {
            path: "lead.name".into(),
            value: json!("Meera"),
        });
        let html = body_text(adapter.render_detail()).await;
        assert!(html.contains("<dt>Name</dt>"));
        assert!(html.contains("Meera"));
        assert!(!html.contains("<script>"));
    }

    async fn serve(adapter: AxumFormAdapter<MemoryBackend>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, adapter.router()).await;
        });
        addr
    }

    fn post_bytes(url: String, len: usize) -> Result<u16, u16> {
        let body = vec![7u8; len];
        match ureq::post(&url)
            .set("content-type", "application/octet-stream")
            .send_bytes(&body)
        {
            Ok(resp) => Ok(resp.status()),
            Err(ureq::Error::Status(code, _)) => Err(code),
            Err(err) => panic!("transport error: {err}"),
        }
    }

    #[tokio::test]
    async fn large_uploads_pass_the_route_limit() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend);
        let addr = serve(adapter.clone()).await;
        let url = format!("http://{addr}/upload?path=lead.photo&filename=scan.pdf&type=application%2Fpdf");

        let status = tokio::task::spawn_blocking(move || post_bytes(url, 3 * 1024 * 1024))
            .await
            .expect("join");
        assert_eq!(status, Ok(200));
        assert_eq!(
            adapter.state(),
            Some(json!({"lead": {"photo": "https://cdn.test/faces/scan.pdf"}}))
        );
    }

    #[tokio::test]
    async fn upload_limit_is_configurable() {
        let adapter = AxumFormAdapter::new(schema(), MemoryBackend).with_upload_limit(1024);
        let addr = serve(adapter.clone()).await;
        let url = format!("http://{addr}/upload?path=lead.photo&filename=scan.pdf");

        let status = tokio::task::spawn_blocking(move || post_bytes(url, 4096))
            .await
            .expect("join");
        assert_eq!(status, Err(413));
        assert_eq!(adapter.state(), Some(json!({})));
    }

    #[tokio::test]
    async fn option_search_narrows_a_select() {
        let schema = FormSchema::from_json(
            r#"{
                "fields": [
                    {"label": "City", "path": "lead.city", "kind": "select", "allowOthers": true,
                     "options": [
                        {"value": "BLR", "label": "Bengaluru"},
                        {"value": "BOM", "label": "Mumbai"},
                        {"value": "MAA", "label": "Chennai"}
                     ]},
                    {"label": "Name", "path": "lead.name", "kind": "text"}
                ]
            }"#,
        )
        .expect("schema");
        let adapter = AxumFormAdapter::new(schema, MemoryBackend);
        adapter.apply_event(FormEvent::Choose {
            path: "lead.city".into(),
            value: json!("BOM"),
        });
        let addr = serve(adapter.clone()).await;

        let html = tokio::task::spawn_blocking(move || {
            ureq::get(&format!("http://{addr}/options?path=lead.city&q=MUM"))
                .call()
                .expect("options")
                .into_string()
                .expect("body")
        })
        .await
        .expect("join");
        assert!(html.contains("<option value=\"&quot;BOM&quot;\" selected>Mumbai</option>"));
        assert!(!html.contains("Chennai"));
        assert!(html.contains(">Others</option>"));

        let rejected = adapter.search_options(OptionsQuery {
            path: "lead.name".into(),
            q: String::new(),
        });
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
