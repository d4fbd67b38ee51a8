//! Route table and request dispatch
//!
//! `routes.conf` holds one route per line:
//!
//! ```text
//! # METHOD | path regex | script
//! GET  | /              | scripts/home.sc
//! POST | /login         | scripts/login.sc
//! GET  | /saints/[a-z]+ | scripts/saint.sc
//! ```

use super::{Request, Response};
use crate::config::Config;
use crate::error::{Result, ScriptError};
use crate::executor::ScriptRuntime;
use crate::files::{FileSource, ServiceDir};
use crate::session::SessionStore;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Route {
    pub method: String,
    pub pattern: Regex,
    pub script: String,
}

impl Route {
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.pattern.is_match(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. The pattern must match the whole path.
    pub fn add(&mut self, method: &str, pattern: &str, script: &str) -> Result<()> {
        let anchored = format!("^(?:{})$", pattern);
        let pattern = Regex::new(&anchored).map_err(|e| {
            ScriptError::ConfigError(format!("invalid route pattern '{}': {}", pattern, e))
        })?;
        self.routes.push(Route {
            method: method.to_uppercase(),
            pattern,
            script: script.to_string(),
        });
        Ok(())
    }

    /// Parse a routes file; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Router> {
        let mut router = Router::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            let [method, pattern, script] = parts.as_slice() else {
                return Err(ScriptError::ConfigError(format!(
                    "routes line {}: expected 'METHOD | pattern | script', got '{}'",
                    index + 1,
                    line
                )));
            };
            if method.is_empty() || pattern.is_empty() || script.is_empty() {
                return Err(ScriptError::ConfigError(format!(
                    "routes line {}: empty field in '{}'",
                    index + 1,
                    line
                )));
            }

            router.add(method, pattern, script).map_err(|e| match e {
                ScriptError::ConfigError(message) => {
                    ScriptError::ConfigError(format!("routes line {}: {}", index + 1, message))
                }
                other => other,
            })?;
        }

        Ok(router)
    }

    /// First route matching both method and path
    pub fn find(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Content type for a static file, by extension
pub fn mime_type(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        _ => "text/plain",
    }
}

/// Static files, then routed scripts, then 404
pub struct App {
    router: Router,
    runtime: ScriptRuntime,
    static_prefix: String,
}

impl App {
    pub fn new(router: Router, runtime: ScriptRuntime) -> Self {
        App {
            router,
            runtime,
            static_prefix: "/static/".to_string(),
        }
    }

    pub fn with_static_prefix(mut self, prefix: &str) -> Self {
        self.static_prefix = prefix.to_string();
        self
    }

    /// Build the app for a service directory described by `config`.
    pub fn from_config(config: &Config) -> Result<App> {
        let files = ServiceDir::new(&config.server.root);
        let routes = files.read_file(&config.server.routes).ok_or_else(|| {
            ScriptError::ConfigError(format!(
                "cannot read routes file '{}' under '{}'",
                config.server.routes,
                config.server.root.display()
            ))
        })?;
        let router = Router::parse(&routes)?;
        info!(routes = router.len(), root = %config.server.root.display(), "routes loaded");

        let runtime = ScriptRuntime::new(Arc::new(files), Arc::new(SessionStore::new()))
            .with_lists(config.lists.clone())
            .with_limits(config.limits);

        Ok(App::new(router, runtime).with_static_prefix(&config.server.static_prefix))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    pub fn handle(&self, request: &Request) -> Response {
        if request.path.starts_with(&self.static_prefix) {
            return self.serve_static(&request.path);
        }

        match self.router.find(&request.method, &request.path) {
            Some(route) => {
                debug!(path = %request.path, script = %route.script, "route matched");
                self.runtime.execute(&route.script, request)
            }
            None => {
                debug!(method = %request.method, path = %request.path, "no route");
                Response::not_found()
            }
        }
    }

    fn serve_static(&self, path: &str) -> Response {
        match self.runtime.files().read_bytes(path.trim_start_matches('/')) {
            Some(data) => Response::with_file(mime_type(path), data),
            None => Response::not_found(),
        }
    }
}
