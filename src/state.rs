//! Shared application state, handed to every HTTP handler via axum's
//! `State` extractor.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::identity::Identity;
use crate::mime_types::MimeResolver;

#[derive(Clone)]
pub struct AppState(pub Arc<AppStateInner>);

pub struct AppStateInner {
    pub config: ServerConfig,
    pub identity: Identity,
    pub mime: MimeResolver,
    /// Relative path of the most recently streamed file, surfaced only for
    /// diagnostics; there is no real renderer session tracking.
    pub now_playing: RwLock<Option<PathBuf>>,
    /// Server's resolved LAN IP, used to build absolute URLs in XML bodies
    /// and SSDP messages.
    pub server_ip: String,
}

impl AppState {
    pub fn new(config: ServerConfig, mime_types_path: Option<PathBuf>, server_ip: String) -> Self {
        let identity = Identity::new(&config.media_root);
        let mime = MimeResolver::load(mime_types_path.as_deref());

        Self(Arc::new(AppStateInner {
            config,
            identity,
            mime,
            now_playing: RwLock::new(None),
            server_ip,
        }))
    }
}

impl std::ops::Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
