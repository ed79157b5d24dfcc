use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use schemaform_core::error::UploadError;
use schemaform_core::upload::{FileSelection, SignRequest, SignedUpload, UploadBackend};
use schemaform_core::{FormSchema, FormSession, ValidationReport, resolve_view};
use schemaform_web::{
    AxumFormAdapter, FormOptions, HttpUploadBackend, ProxyPolicy, Theme, UploadEndpoints,
    ViewOptions, render_form, render_page, render_view,
};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "schemaform",
    version,
    about = "Render, validate and serve schema-driven forms"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the editable form as a standalone HTML page.
    RenderForm {
        #[arg(long)]
        schema: PathBuf,
        /// JSON file or inline JSON used as initial data.
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render the read-only detail view of a record.
    RenderView {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        data: Option<String>,
        #[arg(long, default_value = "/download")]
        proxy_base: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check a record against the form's validation rules.
    Validate {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        data: Option<String>,
    },
    /// Serve the form with live uploads and schema hot reload.
    Serve {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        data: Option<String>,
        #[arg(long, default_value_t = 3000)]
        port: u16,
        /// Signing endpoint for uploads; without it every upload fails.
        #[arg(long)]
        sign_url: Option<String>,
        /// URL prefix the download proxy may fetch from (repeatable).
        #[arg(long = "allow-prefix")]
        allow_prefixes: Vec<String>,
        /// Largest accepted upload, in megabytes.
        #[arg(long, default_value_t = 25)]
        upload_limit_mb: usize,
        #[arg(long, overrides_with = "no_watch")]
        watch: bool,
        #[arg(long = "no-watch")]
        no_watch: bool,
    },
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run_from_env() -> Result<()> {
    init_tracing();
    run(Cli::parse()).await
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::RenderForm { schema, data, out } => {
            let schema = load_schema(&schema, data)?;
            write_output(out.as_deref(), &form_page(&schema))
        }
        Command::RenderView {
            schema,
            data,
            proxy_base,
            out,
        } => {
            let schema = load_schema(&schema, data)?;
            write_output(out.as_deref(), &view_page(&schema, &proxy_base))
        }
        Command::Validate { schema, data } => {
            let schema = load_schema(&schema, data)?;
            let report = validate_schema_data(&schema);
            if report.is_valid() {
                println!("ok");
                return Ok(());
            }
            for (path, message) in &report.errors {
                println!("{path}: {message}");
            }
            bail!("{} field(s) failed validation", report.errors.len())
        }
        Command::Serve {
            schema,
            data,
            port,
            sign_url,
            allow_prefixes,
            upload_limit_mb,
            watch: _,
            no_watch,
        } => {
            let settings = ServeSettings {
                schema_path: schema,
                data,
                port,
                sign_url,
                allow_prefixes,
                upload_limit_bytes: upload_limit_mb.saturating_mul(1024 * 1024),
                watch: !no_watch,
            };
            run_server(settings).await
        }
    }
}

fn load_data_payload(data: Option<String>) -> Result<Option<Value>> {
    let Some(input) = data else {
        return Ok(None);
    };

    let as_path = PathBuf::from(&input);
    if as_path.exists() {
        let content = fs::read_to_string(&as_path)
            .with_context(|| format!("failed to read {}", as_path.display()))?;
        let parsed = serde_json::from_str::<Value>(&content)
            .with_context(|| format!("invalid JSON in {}", as_path.display()))?;
        return Ok(Some(parsed));
    }

    let parsed = serde_json::from_str::<Value>(&input).context("invalid --data JSON")?;
    Ok(Some(parsed))
}

/// Schema from disk, with `--data` taking the place of its initial data.
fn load_schema(path: &Path, data: Option<String>) -> Result<FormSchema> {
    let mut schema = FormSchema::from_file(path)
        .with_context(|| format!("failed to load schema {}", path.display()))?;
    if let Some(data) = load_data_payload(data)? {
        schema.initial_data = Some(data);
    }
    Ok(schema)
}

fn title(schema: &FormSchema) -> &str {
    schema.title.as_deref().unwrap_or("Form")
}

fn form_page(schema: &FormSchema) -> String {
    let session = FormSession::from_schema(schema);
    render_page(
        title(schema),
        &render_form(&session, &FormOptions::default()),
        &Theme::default(),
        None,
    )
}

fn view_page(schema: &FormSchema, proxy_base: &str) -> String {
    let data = schema.initial_data.clone().unwrap_or(Value::Null);
    let entries = resolve_view(&schema.view_descriptors(), &data);
    let options = ViewOptions {
        proxy_base: proxy_base.to_string(),
        ..ViewOptions::default()
    };
    render_page(title(schema), &render_view(&entries, &options), &Theme::default(), None)
}

fn validate_schema_data(schema: &FormSchema) -> ValidationReport {
    FormSession::from_schema(schema).validate()
}

fn write_output(out: Option<&Path>, html: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote page");
        }
        None => println!("{html}"),
    }
    Ok(())
}

/// Upload backend for `serve`: HTTP when a signing endpoint is configured.
enum ServeBackend {
    Http(HttpUploadBackend),
    Unconfigured,
}

impl UploadBackend for ServeBackend {
    async fn sign(&self, request: &SignRequest) -> Result<SignedUpload, UploadError> {
        match self {
            ServeBackend::Http(backend) => backend.sign(request).await,
            ServeBackend::Unconfigured => Err(UploadError::Signing(
                "no signing endpoint configured (pass --sign-url)".to_string(),
            )),
        }
    }

    async fn transfer(&self, signed: &SignedUpload, file: &FileSelection) -> Result<(), UploadError> {
        match self {
            ServeBackend::Http(backend) => backend.transfer(signed, file).await,
            ServeBackend::Unconfigured => Err(UploadError::Transport(
                "no upload transport configured".to_string(),
            )),
        }
    }
}

#[derive(Debug)]
struct ServeSettings {
    schema_path: PathBuf,
    data: Option<String>,
    port: u16,
    sign_url: Option<String>,
    allow_prefixes: Vec<String>,
    upload_limit_bytes: usize,
    watch: bool,
}

async fn run_server(settings: ServeSettings) -> Result<()> {
    let schema_path = settings
        .schema_path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", settings.schema_path.display()))?;
    let schema = load_schema(&schema_path, settings.data)?;

    let backend = match settings.sign_url {
        Some(url) => ServeBackend::Http(HttpUploadBackend::new(UploadEndpoints::new(url))),
        None => {
            warn!("no --sign-url given; uploads will fail");
            ServeBackend::Unconfigured
        }
    };
    let policy = ProxyPolicy {
        allow_prefixes: settings.allow_prefixes,
        ..ProxyPolicy::default()
    };
    let adapter = AxumFormAdapter::new(schema, backend)
        .with_proxy_policy(policy)
        .with_upload_limit(settings.upload_limit_bytes);

    if settings.watch {
        let watched = adapter.clone();
        let reloader = SchemaReloader::new(schema_path.clone(), watched);
        tokio::spawn(reloader.run());
    }

    let app = adapter.router();
    let host = format!("0.0.0.0:{}", settings.port);
    info!(
        schema = %schema_path.display(),
        url = %format!("http://localhost:{}", settings.port),
        watch = settings.watch,
        "schemaform serve"
    );

    let listener = tokio::net::TcpListener::bind(&host)
        .await
        .with_context(|| format!("failed to bind {host}"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("server failed: {e}"))?;
    Ok(())
}

const POLL_EVERY: Duration = Duration::from_millis(1500);
const QUIET_FOR: Duration = Duration::from_millis(120);

#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Poll,
    FileEvent,
    WatcherGone,
}

/// Reloads the served schema whenever the file's bytes change.
struct SchemaReloader<B> {
    path: PathBuf,
    adapter: AxumFormAdapter<B>,
    fingerprint: u64,
}

impl<B> SchemaReloader<B>
where
    B: UploadBackend + Send + Sync + 'static,
{
    fn new(path: PathBuf, adapter: AxumFormAdapter<B>) -> Self {
        let fingerprint = schema_fingerprint(&path);
        Self {
            path,
            adapter,
            fingerprint,
        }
    }

    async fn run(mut self) {
        let mut poll = tokio::time::interval(POLL_EVERY);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut events = match start_fs_watcher(&self.path) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(%err, path = %self.path.display(), "cannot watch schema file, polling it");
                None
            }
        };

        loop {
            let wake = match events.as_mut() {
                Some((_, rx)) => tokio::select! {
                    _ = poll.tick() => Wake::Poll,
                    evt = rx.recv() => match evt {
                        Some(()) => {
                            wait_until_quiet(rx, QUIET_FOR).await;
                            Wake::FileEvent
                        }
                        None => Wake::WatcherGone,
                    },
                },
                None => {
                    poll.tick().await;
                    Wake::Poll
                }
            };
            if wake == Wake::WatcherGone {
                warn!(path = %self.path.display(), "schema watcher stopped, polling it");
                events = None;
                continue;
            }
            self.reload_if_changed();
        }
    }

    /// Returns whether a new schema was installed.
    fn reload_if_changed(&mut self) -> bool {
        let current = schema_fingerprint(&self.path);
        if current == self.fingerprint {
            return false;
        }
        self.fingerprint = current;
        let schema = match FormSchema::from_file(&self.path) {
            Ok(schema) => schema,
            Err(err) => {
                // The previous schema stays live until the file parses again.
                warn!(%err, path = %self.path.display(), "edited schema does not load");
                return false;
            }
        };
        match self.adapter.replace_schema(schema) {
            Ok(()) => {
                info!(path = %self.path.display(), "schema reloaded");
                true
            }
            Err(err) => {
                warn!(%err, "could not install edited schema");
                false
            }
        }
    }
}

/// Drain bursts of file events: returns once `quiet` passes with none.
async fn wait_until_quiet(rx: &mut mpsc::UnboundedReceiver<()>, quiet: Duration) {
    while let Ok(Some(())) = tokio::time::timeout(quiet, rx.recv()).await {}
}

// Editors often replace the file rather than write it in place, so the
// parent directory is watched and events are filtered by file name.
fn start_fs_watcher(schema_path: &Path) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
    let (tx, rx) = mpsc::unbounded_channel::<()>();
    let target = schema_path.to_path_buf();
    let dir = schema_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("schema path has no parent directory"))?;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if event_is_relevant(&event, &target) {
                let _ = tx.send(());
            }
        }
        Err(_) => {
            let _ = tx.send(());
        }
    })
    .context("failed to initialize filesystem watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;

    Ok((watcher, rx))
}

fn event_is_relevant(event: &Event, target: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == target.file_name())
}

fn schema_fingerprint(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    match fs::read(path) {
        Ok(bytes) => bytes.hash(&mut hasher),
        Err(_) => 0u8.hash(&mut hasher),
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    const SCHEMA: &str = r#"{
        "title": "Lead",
        "fields": [
            {"label": "Name", "path": "name", "kind": "text", "required": true},
            {"label": "Email", "path": "email", "kind": "email"},
            {"label": "Docs", "path": "docs", "kind": "file_array"}
        ]
    }"#;

    fn write_schema(dir: &Path) -> PathBuf {
        let path = dir.join("lead.json");
        fs::write(&path, SCHEMA).expect("write schema");
        path
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "schemaform",
            "serve",
            "--schema",
            "lead.json",
            "--port",
            "8080",
            "--allow-prefix",
            "https://cdn.test/",
            "--allow-prefix",
            "https://files.test/",
            "--upload-limit-mb",
            "50",
            "--no-watch",
        ])
        .expect("parse");
        let Command::Serve {
            port,
            allow_prefixes,
            upload_limit_mb,
            no_watch,
            sign_url,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(port, 8080);
        assert_eq!(allow_prefixes.len(), 2);
        assert_eq!(upload_limit_mb, 50);
        assert!(no_watch);
        assert_eq!(sign_url, None);

        let defaults = Cli::try_parse_from(["schemaform", "serve", "--schema", "lead.json"])
            .expect("parse defaults");
        let Command::Serve {
            upload_limit_mb,
            no_watch,
            ..
        } = defaults.command
        else {
            panic!("expected serve");
        };
        assert_eq!(upload_limit_mb, 25);
        assert!(!no_watch);
    }

    #[test]
    fn data_accepts_inline_json_or_file() {
        let dir = unique_temp_dir("schemaform-data");
        let file = dir.join("data.json");
        fs::write(&file, r#"{"name": "Asha"}"#).expect("write data");

        let from_file = load_data_payload(Some(file.display().to_string())).expect("file");
        assert_eq!(from_file, Some(serde_json::json!({"name": "Asha"})));
        let inline = load_data_payload(Some(r#"{"name": "Ravi"}"#.to_string())).expect("inline");
        assert_eq!(inline, Some(serde_json::json!({"name": "Ravi"})));
        assert!(load_data_payload(Some("{not json".to_string())).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_reports_field_errors() {
        let dir = unique_temp_dir("schemaform-validate");
        let path = write_schema(&dir);
        let schema = load_schema(&path, Some(r#"{"email": "nope"}"#.to_string())).expect("schema");
        let report = validate_schema_data(&schema);
        assert_eq!(report.error_for("name"), Some("Name is required"));
        assert_eq!(report.error_for("email"), Some("Email must be a valid email address"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn pages_render_from_schema() {
        let dir = unique_temp_dir("schemaform-render");
        let path = write_schema(&dir);
        let schema = load_schema(
            &path,
            Some(r#"{"name": "Asha", "docs": ["https://cdn.test/a.pdf"]}"#.to_string()),
        )
        .expect("schema");

        let form = form_page(&schema);
        assert!(form.contains("value=\"Asha\""));
        assert!(form.contains("data-sf-upload=\"append\""));

        let view = view_page(&schema, "/proxy");
        assert!(view.contains("/proxy?url=https%3A%2F%2Fcdn.test%2Fa.pdf&amp;filename=a.pdf"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let dir = unique_temp_dir("schemaform-watch");
        let path = dir.join("schema.json");
        fs::write(&path, r#"{"fields": []}"#).expect("write");
        let before = schema_fingerprint(&path);
        // Same size, different bytes.
        fs::write(&path, r#"{"fields": {}}"#).expect("write");
        assert_ne!(before, schema_fingerprint(&path));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unconfigured_backend_fails_uploads_cleanly() {
        let backend = ServeBackend::Unconfigured;
        let err = backend
            .sign(&SignRequest {
                file_name: "a.png".into(),
                file_type: "image/png".into(),
                folder_name: "docs".into(),
            })
            .await
            .expect_err("no endpoint");
        assert!(matches!(err, UploadError::Signing(_)));
    }

    async fn index_html(adapter: &AxumFormAdapter<ServeBackend>) -> String {
        let body = adapter.render_index().into_body();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn reloader_installs_edited_schema_and_skips_broken_ones() {
        let dir = unique_temp_dir("schemaform-reload");
        let path = write_schema(&dir);
        let schema = load_schema(&path, None).expect("schema");
        let adapter = AxumFormAdapter::new(schema, ServeBackend::Unconfigured);
        let mut reloader = SchemaReloader::new(path.clone(), adapter.clone());

        assert!(!reloader.reload_if_changed());

        fs::write(&path, SCHEMA.replace("\"Lead\"", "\"Lead intake\"")).expect("edit");
        assert!(reloader.reload_if_changed());
        assert!(index_html(&adapter).await.contains("<title>Lead intake</title>"));

        fs::write(&path, "{ not json").expect("break");
        assert!(!reloader.reload_if_changed());
        assert!(index_html(&adapter).await.contains("<title>Lead intake</title>"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn quiet_wait_drains_a_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..3 {
            tx.send(()).expect("send");
        }
        wait_until_quiet(&mut rx, Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        drop(tx);
        wait_until_quiet(&mut rx, Duration::from_secs(60)).await;
    }
}
