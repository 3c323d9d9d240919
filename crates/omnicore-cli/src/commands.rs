use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use omnicore_api::ControllerInfo;
use omnicore_provision::{local::LocalProvider, ProvisionController};
use omnicore_runtime::{QController, Runtime, RuntimeConfig};
use omnicore_store::{InMemoryStore, ResourceStore, SqliteStore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::GraphOutput;
use crate::output;

// ── Serve ─────────────────────────────────────────────────────────────────────

pub async fn serve(
    bind: String,
    port: u16,
    namespace: String,
    ephemeral: bool,
    store_path: Option<String>,
    rotate_token: bool,
    config: Option<String>,
) -> Result<()> {
    let mut addr = format!("{bind}:{port}");
    let mut max_concurrent_reconciles = 8;
    if let Some(path) = config {
        let cfg = omnicore_config::load_server_config(std::path::Path::new(&path))
            .with_context(|| format!("Failed to load config at {path}"))?;
        omnicore_config::init_compression(&cfg).context("Failed to initialize compression")?;
        addr = cfg.bind_address;
        max_concurrent_reconciles = cfg.max_concurrent_reconciles;
    }

    let token_path = default_token_path();
    let token = if !rotate_token {
        if let Ok(existing) = std::fs::read_to_string(&token_path).map(|s| s.trim().to_string()) {
            if !existing.is_empty() {
                println!("Reusing existing token from {}", token_path.display());
                existing
            } else {
                let t = generate_token();
                write_token(&token_path, &t)?;
                println!("Generated new token (written to {})", token_path.display());
                t
            }
        } else {
            let t = generate_token();
            write_token(&token_path, &t)?;
            println!("Generated new token (written to {})", token_path.display());
            t
        }
    } else {
        let t = generate_token();
        write_token(&token_path, &t)?;
        println!("Rotated token (written to {})", token_path.display());
        println!("New token: {}", t);
        t
    };

    let store: Arc<dyn ResourceStore> = if ephemeral {
        println!("Using in-memory (ephemeral) store — state will be lost on server stop");
        Arc::new(InMemoryStore::new())
    } else {
        let path = resolve_store_path(store_path);
        println!("Using persistent store at {}", path.display());
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Arc::new(SqliteStore::connect(&url).await.with_context(|| format!("Failed to open store at {}", path.display()))?)
    };

    let controllers: Vec<Arc<dyn QController>> =
        vec![Arc::new(ProvisionController::new("local-provision", LocalProvider, "LocalMachineState"))];
    let controller_infos: Vec<ControllerInfo> =
        controllers.iter().map(|c| ControllerInfo::from_controller(c.as_ref())).collect();

    let runtime = Arc::new(Runtime::new(
        store.clone(),
        RuntimeConfig { namespace: namespace.as_str().into(), max_concurrent_reconciles },
    ));
    let shutdown = CancellationToken::new();
    let mut controller_handles = Vec::new();
    for controller in controllers {
        let runtime = runtime.clone();
        let shutdown = shutdown.clone();
        controller_handles.push(tokio::spawn(async move { runtime.run_controller(controller, shutdown).await }));
    }

    println!("Starting omnicore API server on http://{addr} (namespace: {namespace})");

    let app = omnicore_api::build_app(store, controller_infos, Arc::new(token));
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind to {addr}"))?;

    tokio::select! {
        result = axum::serve(listener, app) => { result.context("Server error")?; }
        _ = tokio::signal::ctrl_c() => { println!("Shutting down…"); }
    }

    shutdown.cancel();
    for handle in controller_handles {
        let _ = handle.await;
    }
    Ok(())
}

// ── Get ───────────────────────────────────────────────────────────────────────

pub async fn get(resource_type: String, namespace: String, id: String, remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/resources/{resource_type}/{namespace}/{id}", url.trim_end_matches('/')))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list(
    resource_type: String,
    namespace: String,
    label_selector: Option<String>,
    remote: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let mut req = authed_client(&token).get(format!("{}/resources/{resource_type}/{namespace}", url.trim_end_matches('/')));
    if let Some(selector) = &label_selector {
        req = req.query(&[("label_selector", selector)]);
    }
    let body: serde_json::Value =
        req.send().await.with_context(|| format!("Failed to reach server at {url}"))?.json().await?;
    let items = body.get("items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    print!("{}", output::render_resource_table(&items));
    Ok(())
}

// ── Watch ─────────────────────────────────────────────────────────────────────

pub async fn watch(
    resource_type: String,
    namespace: String,
    label_selector: Option<String>,
    remote: Option<String>,
    token: Option<String>,
) -> Result<()> {
    use futures::StreamExt;

    let token = resolve_token(token)?;
    let url = server_url(remote);
    let mut req = authed_client(&token).get(format!("{}/resources/{resource_type}/{namespace}/watch", url.trim_end_matches('/')));
    if let Some(selector) = &label_selector {
        req = req.query(&[("label_selector", selector)]);
    }
    let resp = req.send().await.with_context(|| format!("Failed to reach server at {url}"))?;
    let mut stream = resp.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            if let Ok(event) = serde_json::from_slice::<serde_json::Value>(&line[..line.len().saturating_sub(1)]) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }
    Ok(())
}

// ── Controllers ───────────────────────────────────────────────────────────────

pub async fn controllers(remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/controllers", url.trim_end_matches('/')))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;
    print!("{}", output::render_controllers_text(&body));
    Ok(())
}

// ── Dependency graph ──────────────────────────────────────────────────────────

pub async fn dependency_graph(output_format: GraphOutput, remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/dependency-graph", url.trim_end_matches('/')))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;

    match output_format {
        GraphOutput::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        GraphOutput::Text => print!("{}", output::render_dependency_graph_text(&body)),
        GraphOutput::Dot => println!("{}", output::render_dependency_graph_dot(&body)),
    }
    Ok(())
}

// ── Token helpers ─────────────────────────────────────────────────────────────

/// Generate a cryptographically random token as a 64-character hex string.
fn generate_token() -> String {
    let a = Uuid::new_v4().to_string().replace('-', "");
    let b = Uuid::new_v4().to_string().replace('-', "");
    format!("{}{}", a, b)
}

/// Resolve the token to use for API calls.
///
/// Priority: explicit value (from --token / OMNICORE_TOKEN) → ~/.omnicore/token file
fn resolve_token(explicit: Option<String>) -> Result<String> {
    if let Some(t) = explicit {
        return Ok(t);
    }
    let path = default_token_path();
    std::fs::read_to_string(&path).map(|s| s.trim().to_string()).with_context(|| {
        format!(
            "No token provided and could not read token file at {}. \
             Use --token, OMNICORE_TOKEN, or run `omnicore serve` first.",
            path.display()
        )
    })
}

/// Write the token to the token file with owner-only permissions.
fn write_token(path: &PathBuf, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, token).with_context(|| format!("Failed to write token to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

fn default_token_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".omnicore").join("token")
}

/// Build a reqwest Client with the Authorization header pre-configured.
fn authed_client(token: &str) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    let bearer = format!("Bearer {}", token);
    headers.insert(
        reqwest::header::AUTHORIZATION,
        reqwest::header::HeaderValue::from_str(&bearer).expect("token contains invalid header characters"),
    );
    reqwest::Client::builder().default_headers(headers).build().expect("failed to build HTTP client")
}

// ── Other helpers ─────────────────────────────────────────────────────────────

fn server_url(remote: Option<String>) -> String {
    remote.unwrap_or_else(|| "http://localhost:8080".into())
}

fn resolve_store_path(store_path: Option<String>) -> PathBuf {
    if let Some(p) = store_path {
        return PathBuf::from(p);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".omnicore").join("state.db")
}
