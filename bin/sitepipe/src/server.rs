//! Preview server with live reload support

use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    Router,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use color_eyre::eyre::{Result, WrapErr};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tower_http::services::ServeDir;

/// Route of the reload event stream.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Live reload message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Full page reload.
    Reload,
    /// Stylesheets only, reloaded in place.
    CssReload,
}

impl ReloadMessage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::CssReload => "css-reload",
        }
    }
}

/// Receives reload requests after a stage rebuilds.
pub trait Reloader: Send + Sync {
    fn send(&self, message: ReloadMessage);
}

/// Server state containing the reload broadcaster.
#[derive(Debug, Clone)]
pub struct ServerState {
    reload_tx: broadcast::Sender<ReloadMessage>,
}

impl ServerState {
    pub fn new() -> Self {
        let (reload_tx, _) = broadcast::channel(16);
        Self { reload_tx }
    }

    /// Ask every connected browser to reload the page.
    pub fn reload(&self) {
        self.send(ReloadMessage::Reload);
    }

    /// Ask every connected browser to reload its stylesheets.
    pub fn reload_css(&self) {
        self.send(ReloadMessage::CssReload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.reload_tx.subscribe()
    }
}

impl Reloader for ServerState {
    fn send(&self, message: ReloadMessage) {
        // No subscribers just means no browser is open yet.
        let receivers = self.reload_tx.send(message).unwrap_or(0);
        tracing::debug!(message = message.as_str(), receivers, "sent reload");
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the preview server router.
pub fn create_router(output_dir: &Path, state: Arc<ServerState>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_handler))
        .fallback_service(ServeDir::new(output_dir))
        .with_state(state)
}

/// Bind the preview address. A port already in use is fatal.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind preview server to {addr}"))
}

/// Serve `output_dir` on an already bound listener until the process ends.
pub async fn serve(listener: TcpListener, output_dir: &Path, state: Arc<ServerState>) -> Result<()> {
    let app = create_router(output_dir, state);
    axum::serve(listener, app).await.wrap_err("Server error")
}

/// Server-Sent Events handler for live reload.
async fn livereload_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let stream = BroadcastStream::new(state.subscribe()).filter_map(|msg| {
        // Lagged receivers skip the missed messages.
        msg.ok().map(|m| Ok(Event::default().data(m.as_str())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("ping"))
}

/// Client snippet injected into develop pages.
pub const LIVERELOAD_SCRIPT: &str = r#"
<script>
(function() {
    const source = new EventSource('/__livereload');
    source.onmessage = function(event) {
        if (event.data === 'reload') {
            window.location.reload();
        } else if (event.data === 'css-reload') {
            document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {
                const href = link.href.split('?')[0];
                link.href = href + '?v=' + Date.now();
            });
        }
    };
    source.onerror = function() {
        console.log('[livereload] Connection lost, retrying...');
    };
})();
</script>
"#;
