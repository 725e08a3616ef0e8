//! Extension packages contribute static assets, extra routes and events on
//! the realtime channel.
//!
//! Providers are registered explicitly at startup. Package extensions are
//! listed in configuration; nothing is discovered by scanning for code.

use crate::error::AppError;
use crate::session::events::EventHandlers;
use crate::session::handler::AppState;
use axum::Router;
use std::path::{Path, PathBuf};
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub const STATIC_PREFIX: &str = "/_static";

/// A capability provider mounted into the server at startup.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Adds this extension's routes to `router`.
    fn init(&self, router: Router<AppState>) -> Router<AppState>;

    /// Registers handlers for inbound events on `/ws`.
    fn register_events(&self, _events: &mut EventHandlers) {}
}

/// An installed extension package laid out as `<root>/web/public/...`.
#[derive(Debug, Clone)]
pub struct PackageExtension {
    name: String,
    root: PathBuf,
}

impl PackageExtension {
    /// The extension is named after the package directory.
    pub fn from_dir(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AppError::ExtensionError(format!(
                    "Cannot derive an extension name from {}",
                    root.display()
                ))
            })?
            .to_string();
        Ok(Self { name, root })
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join("web").join("public")
    }

    pub fn mount_path(&self) -> String {
        format!("{}/{}", STATIC_PREFIX, self.name)
    }
}

impl Extension for PackageExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, router: Router<AppState>) -> Router<AppState> {
        let public_dir = self.public_dir();
        if !public_dir.is_dir() {
            warn!(extension = %self.name, path = %public_dir.display(), "Extension has no web/public directory");
        }
        router.nest_service(&self.mount_path(), ServeDir::new(public_dir))
    }
}

#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One package extension per directory. Missing directories and
    /// duplicate names are skipped with a warning.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut registry = Self::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                warn!(path = %dir.display(), "Extension directory not found, skipping");
                continue;
            }
            match PackageExtension::from_dir(dir) {
                Ok(ext) => registry.register(ext),
                Err(e) => warn!(error = %e, "Skipping extension"),
            }
        }
        registry
    }

    pub fn register<E: Extension + 'static>(&mut self, extension: E) {
        if self.names().any(|n| n == extension.name()) {
            warn!(extension = %extension.name(), "Extension already registered, skipping");
            return;
        }
        self.extensions.push(Box::new(extension));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|e| e.name())
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Runs every extension's `init`, in registration order.
    pub fn apply(&self, router: Router<AppState>) -> Router<AppState> {
        self.extensions.iter().fold(router, |router, ext| {
            info!(extension = %ext.name(), "Loading extension");
            ext.init(router)
        })
    }

    /// Collects every extension's event handlers, in registration order.
    pub fn event_handlers(&self) -> EventHandlers {
        let mut events = EventHandlers::new();
        for ext in &self.extensions {
            ext.register_events(&mut events);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::EventHandler;
    use crate::session::schemas::ServerEvent;
    use async_trait::async_trait;
    use axum::routing::get;
    use serde_json::Value;
    use tokio::sync::mpsc;

    struct Pong;

    #[async_trait]
    impl EventHandler for Pong {
        async fn handle(&self, _data: Value, out: mpsc::Sender<ServerEvent>) -> Result<(), AppError> {
            out.send(ServerEvent::extension("pong", Value::Null))
                .await
                .map_err(|e| AppError::ExtensionError(e.to_string()))
        }
    }

    struct PingExtension;

    impl Extension for PingExtension {
        fn name(&self) -> &str {
            "ping"
        }

        fn init(&self, router: Router<AppState>) -> Router<AppState> {
            router.route("/_ext/ping", get(|| async { "pong" }))
        }

        fn register_events(&self, events: &mut EventHandlers) {
            events.on("ping", Pong);
        }
    }

    #[test]
    fn package_name_comes_from_directory() {
        let ext = PackageExtension::from_dir("/usr/lib/node_modules/edp-build").unwrap();
        assert_eq!(ext.name(), "edp-build");
        assert_eq!(ext.mount_path(), "/_static/edp-build");
        assert_eq!(
            ext.public_dir(),
            PathBuf::from("/usr/lib/node_modules/edp-build/web/public")
        );
    }

    #[test]
    fn root_path_has_no_name() {
        assert!(matches!(
            PackageExtension::from_dir("/"),
            Err(AppError::ExtensionError(_))
        ));
    }

    #[test]
    fn from_dirs_skips_missing_and_duplicates() {
        let base = tempfile::tempdir().unwrap();
        let a = base.path().join("edp-a");
        let b = base.path().join("nested").join("edp-a");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();

        let registry = ExtensionRegistry::from_dirs([
            a.clone(),
            base.path().join("edp-missing"),
            b,
        ]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["edp-a"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn custom_providers_register_alongside_packages() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.is_empty());
        registry.register(PingExtension);
        registry.register(PackageExtension::from_dir("/opt/edp-lint").unwrap());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ping", "edp-lint"]);
    }

    #[test]
    fn event_handlers_come_from_registered_extensions() {
        let mut registry = ExtensionRegistry::new();
        registry.register(PackageExtension::from_dir("/opt/edp-lint").unwrap());
        assert!(registry.event_handlers().is_empty());

        registry.register(PingExtension);
        let events = registry.event_handlers();
        assert_eq!(events.len(), 1);
        assert!(events.get("ping").is_some());
    }
}
