// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP endpoint: resources, the APK download and the `/game` WebSocket

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ServerConfig};
use crate::fs::{FileSystem, OsFileSystem};
use crate::game::SessionHub;
use crate::resources::{self, Catalogue};
use crate::sidecar::SidecarMatcher;
use crate::{CompanionError, Result};

/// Shared application state
pub struct AppState {
    pub hub: Arc<SessionHub>,
    pub config: AppConfig,
    pub fs: Arc<dyn FileSystem>,
    pub matcher: SidecarMatcher,
}

impl AppState {
    /// State over the real disk. Fails if the resource root exists but is
    /// not a directory.
    pub fn new(config: AppConfig) -> Result<Self> {
        let root = &config.resources.root;
        if root.exists() && !root.is_dir() {
            return Err(CompanionError::ResourceRoot(root.clone()));
        }
        let matcher = SidecarMatcher::from_patterns(&config.cleanup.patterns)?;
        Ok(Self {
            hub: Arc::new(SessionHub::new()),
            config,
            fs: Arc::new(OsFileSystem),
            matcher,
        })
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/resources", get(api_resources))
        .route("/game", get(game_socket))
        .nest_service("/resources", ServeDir::new(state.config.resources.triaged_dir()));

    if let Some(apk) = &state.config.apk.path {
        router = router.route_service("/app.apk", ServeFile::new(apk));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), reject_sidecars))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener; failure names the address
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.address();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(source) => Err(CompanionError::Bind { addr, source }),
    }
}

/// Serve until `shutdown` flips to `true`
pub async fn serve(listener: TcpListener, router: Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Companion server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| CompanionError::Server(format!("Server error: {}", e)))?;

    info!("Companion server stopped");
    Ok(())
}

/// Sidecars are never served, whatever route they are requested through.
/// The path is matched as the file services will see it, percent-decoded.
async fn reject_sidecars(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let path = percent_decode_str(request.uri().path()).decode_utf8_lossy();
    if state.matcher.matches_path(&path) {
        debug!("Refusing sidecar request: {}", request.uri());
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    clients: usize,
    players: usize,
    game: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        clients: state.hub.client_count(),
        players: state.hub.player_count(),
        game: state.hub.has_game(),
    })
}

async fn api_resources(State(state): State<Arc<AppState>>) -> std::result::Result<Json<Catalogue>, StatusCode> {
    let fs = state.fs.clone();
    let root = state.config.resources.root.clone();
    let matcher = state.matcher.clone();

    let scanned = tokio::task::spawn_blocking(move || resources::scan(fs.as_ref(), &root, &matcher))
        .await
        .map_err(|e| {
            error!("Catalogue task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match scanned {
        Ok(catalogue) => {
            debug!("Listed {} resource files", catalogue.file_count());
            Ok(Json(catalogue))
        }
        Err(e) => {
            error!("Cannot list resources: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn game_socket(
    State(state): State<Arc<AppState>>,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => {
            let hub = state.hub.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, hub))
        }
        Err(rejection) => {
            debug!("Rejected /game request: {}", rejection);
            (StatusCode::BAD_REQUEST, "WebSocket upgrade required").into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: Arc<SessionHub>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client = hub.register(tx);

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => hub.handle_message(client, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Connection error for {}: {}", client, e);
                break;
            }
        }
    }

    hub.unregister(client);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    fn fixture() -> (TempDir, AppConfig) {
        let temp = TempDir::new().unwrap();
        let item = temp.path().join("triaged_images/monsters/dunwich");
        std::fs::create_dir_all(&item).unwrap();
        std::fs::write(item.join("a.png"), b"png").unwrap();
        std::fs::write(item.join("a.png:Zone.Identifier"), b"[ZoneTransfer]").unwrap();

        let mut config = AppConfig::default();
        config.resources.root = temp.path().to_path_buf();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        (temp, config)
    }

    fn router(config: AppConfig) -> Router {
        create_router(Arc::new(AppState::new(config).unwrap()))
    }

    async fn get_status(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let (_temp, config) = fixture();
        let (status, body) = get_status(router(config), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["clients"], 0);
    }

    #[tokio::test]
    async fn test_resources_served_without_sidecars() {
        let (_temp, config) = fixture();

        let (status, body) = get_status(router(config.clone()), "/resources/monsters/dunwich/a.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"png");

        let (status, _) =
            get_status(router(config.clone()), "/resources/monsters/dunwich/a.png:Zone.Identifier").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_status(router(config), "/api/resources").await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value["categories"][0]["items"][0]["files"],
            json!(["monsters/dunwich/a.png"])
        );
    }

    #[tokio::test]
    async fn test_encoded_sidecar_requests_are_refused() {
        let (_temp, config) = fixture();

        for uri in [
            "/resources/monsters/dunwich/a.png:Zone.Identifie%72",
            "/resources/monsters/dunwich/a.png%3AZone%2EIdentifier",
            "/resources/monsters/dunwich/a.png%3aZone.Identifier",
            "/resources/monsters%2Fdunwich%2Fa.png:Zone.Identifier",
        ] {
            let (status, body) = get_status(router(config.clone()), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{} was served", uri);
            assert_ne!(body, b"[ZoneTransfer]");
        }

        let (status, body) = get_status(router(config), "/resources/monsters/dunwich/a%2Epng").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"png");
    }

    #[tokio::test]
    async fn test_apk_download() {
        let (temp, mut config) = fixture();
        let (status, _) = get_status(router(config.clone()), "/app.apk").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let apk = temp.path().join("companion.apk");
        std::fs::write(&apk, b"PK").unwrap();
        config.apk.path = Some(apk);
        let (status, body) = get_status(router(config), "/app.apk").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"PK");
    }

    #[tokio::test]
    async fn test_plain_get_on_game_is_bad_request() {
        let (_temp, config) = fixture();
        let (status, _) = get_status(router(config), "/game").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_file_as_resource_root_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("resources");
        std::fs::write(&file, b"").unwrap();
        let mut config = AppConfig::default();
        config.resources.root = file.clone();
        assert!(matches!(AppState::new(config), Err(CompanionError::ResourceRoot(p)) if p == file));
    }

    #[tokio::test]
    async fn test_bind_conflict_names_address() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = first.local_addr().unwrap().port();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
        };

        let err = bind(&config).await.unwrap_err();
        assert!(matches!(&err, CompanionError::Bind { addr, .. } if *addr == config.address()));
        assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
    }

    async fn next_json<S>(socket: &mut S) -> Value
    where
        S: futures_util::Stream<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match socket.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_live_server_game_session() {
        let (_temp, config) = fixture();
        let listener = bind(&config.server).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, router(config), rx));

        let health: Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/game", addr))
            .await
            .unwrap();
        let hello = next_json(&mut socket).await;
        assert_eq!(hello["action"], "hello");
        assert_eq!(hello["game_available"], false);

        let start = json!({
            "action": "start_game",
            "scenario": "Echoes of the Deep",
            "expansions": 0,
            "player_name": "Ann",
            "player_colour": "green",
        });
        socket.send(WsMessage::Text(start.to_string())).await.unwrap();

        let update = next_json(&mut socket).await;
        assert_eq!(update["action"], "update");
        assert_eq!(update["game_data"]["neighbourhoods"][6], "Nightmare Breach");
        assert_eq!(next_json(&mut socket).await["game_available"], true);
        assert_eq!(next_json(&mut socket).await["action"], "log");

        socket.close(None).await.unwrap();
        tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
