//! Script runtime: load, lex, parse and interpret one script per request

use crate::config::Limits;
use crate::error::{Result, ScriptError};
use crate::files::FileSource;
use crate::http::{Request, Response};
use crate::interpreter::{ExecutionContext, Interpreter};
use crate::parser::parse_source;
use crate::session::SessionStore;
use crate::value::Lists;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything a script needs besides the request itself.
///
/// Shared read-only between request threads; the session store carries
/// its own lock.
pub struct ScriptRuntime {
    files: Arc<dyn FileSource>,
    sessions: Arc<SessionStore>,
    lists: Lists,
    limits: Limits,
}

impl ScriptRuntime {
    pub fn new(files: Arc<dyn FileSource>, sessions: Arc<SessionStore>) -> Self {
        ScriptRuntime {
            files,
            sessions,
            lists: Lists::new(),
            limits: Limits::default(),
        }
    }

    pub fn with_lists(mut self, lists: Lists) -> Self {
        self.lists = lists;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn files(&self) -> &dyn FileSource {
        self.files.as_ref()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run the script at `script_path`. Failures become 500 responses.
    pub fn execute(&self, script_path: &str, request: &Request) -> Response {
        let result = match self.files.read_file(script_path) {
            Some(source) => self.run_source(&source, request),
            None => Err(ScriptError::ScriptNotFound(script_path.to_string())),
        };

        result.unwrap_or_else(|e| {
            if e.is_static() {
                warn!(script = %script_path, error = %e, "script rejected before running");
            } else {
                error!(script = %script_path, error = %e, "script failed");
            }
            Response::server_error(e.to_string())
        })
    }

    /// Run in-memory script source against `request`.
    pub fn run_source(&self, source: &str, request: &Request) -> Result<Response> {
        let program = parse_source(source)?;

        let mut ctx = ExecutionContext::new(request, self.lists.clone());
        let mut interpreter = Interpreter::new(self.files.as_ref(), &self.sessions, self.limits);
        interpreter.run(&program, &mut ctx)?;

        debug!(steps = interpreter.steps(), status = ctx.response.status, "script finished");
        Ok(ctx.response)
    }
}
