//! Tree-walking interpreter for scripts
//!
//! One `Interpreter` runs one parsed script against one `ExecutionContext`.
//! Missing data resolves to empty values and bad arithmetic degrades to
//! `Null`; only arity mismatches and the step budget abort a run.

use crate::ast::*;
use crate::config::Limits;
use crate::error::{Result, ScriptError};
use crate::files::FileSource;
use crate::http::{Request, Response};
use crate::session::SessionStore;
use crate::template::{self, RenderContext, TemplateParser};
use crate::value::{Lists, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// Cookie consulted for `session.KEY` when cookie `KEY` is absent.
pub const SESSION_COOKIE: &str = "sid";

/// Per-request state threaded through evaluation
#[derive(Debug)]
pub struct ExecutionContext<'r> {
    pub request: &'r Request,
    pub response: Response,
    pub variables: HashMap<String, Value>,
    pub form: HashMap<String, String>,
    pub lists: Lists,
}

impl<'r> ExecutionContext<'r> {
    /// Fresh context; the form body is parsed here, once.
    pub fn new(request: &'r Request, lists: Lists) -> Self {
        ExecutionContext {
            request,
            response: Response::new(),
            variables: HashMap::new(),
            form: request.form_fields(),
            lists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Render,
    Redirect,
    SaveSession,
    AddCookie,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "render" => Some(Builtin::Render),
            "redirect" => Some(Builtin::Redirect),
            "save_session" => Some(Builtin::SaveSession),
            "add_cookie" => Some(Builtin::AddCookie),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Builtin::Render | Builtin::Redirect => 1,
            Builtin::SaveSession | Builtin::AddCookie => 2,
        }
    }
}

/// The script interpreter
pub struct Interpreter<'a> {
    files: &'a dyn FileSource,
    sessions: &'a SessionStore,
    limits: Limits,
    steps: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(files: &'a dyn FileSource, sessions: &'a SessionStore, limits: Limits) -> Self {
        Interpreter {
            files,
            sessions,
            limits,
            steps: 0,
        }
    }

    /// Evaluation steps consumed so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run a whole script. Returns the value of the last statement executed.
    pub fn run(&mut self, program: &Block, ctx: &mut ExecutionContext) -> Result<Value> {
        self.execute_block(program, ctx)
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepLimitExceeded {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    fn execute_block(&mut self, block: &Block, ctx: &mut ExecutionContext) -> Result<Value> {
        let mut last = Value::Null;
        for statement in &block.statements {
            if ctx.response.is_redirect() {
                debug!("redirect pending, skipping rest of block");
                break;
            }
            last = self.execute_statement(statement, ctx)?;
        }
        Ok(last)
    }

    fn execute_statement(&mut self, stmt: &Statement, ctx: &mut ExecutionContext) -> Result<Value> {
        self.tick()?;

        match stmt {
            Statement::Assignment { name, value } => {
                let value = self.eval_expression(value, ctx)?;
                debug!(name = %name, value = %value, "assign");
                ctx.variables.insert(name.clone(), value);
                Ok(Value::Null)
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval_expression(condition, ctx)?;
                if condition.is_truthy() {
                    self.execute_block(then_branch, ctx)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch, ctx)
                } else {
                    Ok(Value::Null)
                }
            }

            Statement::Command {
                name,
                arguments,
                line,
            } => self.execute_command(name, arguments, *line, ctx),

            Statement::For { item, list, body } => self.execute_for(item, list, body, ctx),

            Statement::Expression(expr) => self.eval_expression(expr, ctx),
        }
    }

    fn execute_for(
        &mut self,
        item: &str,
        list: &str,
        body: &Block,
        ctx: &mut ExecutionContext,
    ) -> Result<Value> {
        let items: Vec<Value> = match ctx.lists.get(list) {
            Some(rows) => rows.iter().map(Value::from_row).collect(),
            None => match self.resolve_variable(list, ctx) {
                Some(Value::List(items)) => items,
                _ => {
                    warn!(list = %list, "for loop over unknown list");
                    Vec::new()
                }
            },
        };

        let previous = ctx.variables.get(item).cloned();

        let mut outcome = Ok(());
        for value in items {
            if ctx.response.is_redirect() {
                break;
            }
            ctx.variables.insert(item.to_string(), loop_binding(value));
            if let Err(e) = self.execute_block(body, ctx) {
                outcome = Err(e);
                break;
            }
        }

        match previous {
            Some(value) => ctx.variables.insert(item.to_string(), value),
            None => ctx.variables.remove(item),
        };

        outcome.map(|_| Value::Null)
    }

    fn execute_command(
        &mut self,
        name: &str,
        arguments: &[Expression],
        line: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<Value> {
        let Some(builtin) = Builtin::from_name(name) else {
            warn!(command = %name, line, "unknown command ignored");
            return Ok(Value::Null);
        };

        if arguments.len() != builtin.arity() {
            return Err(ScriptError::ArityMismatch {
                command: name.to_string(),
                line,
                expected: builtin.arity(),
                got: arguments.len(),
            });
        }

        let args = arguments
            .iter()
            .map(|arg| self.eval_expression(arg, ctx).map(|v| v.to_string()))
            .collect::<Result<Vec<String>>>()?;

        match (builtin, args.as_slice()) {
            (Builtin::Render, [path]) => self.render(path, ctx),
            (Builtin::Redirect, [url]) => {
                info!(url = %url, "redirect");
                ctx.response.redirect(url);
            }
            (Builtin::SaveSession, [sid, user]) => self.sessions.save(sid, user),
            (Builtin::AddCookie, [cookie, value]) => ctx.response.add_cookie(cookie, value),
            _ => {
                return Err(ScriptError::ArityMismatch {
                    command: name.to_string(),
                    line,
                    expected: builtin.arity(),
                    got: args.len(),
                })
            }
        }

        Ok(Value::Null)
    }

    fn render(&self, path: &str, ctx: &mut ExecutionContext) {
        let Some(source) = self.files.read_file(path) else {
            error!(path = %path, "template not found");
            ctx.response.status = 500;
            ctx.response.body = format!("Template not found: {}", path);
            return;
        };

        let nodes = TemplateParser::new(&source, self.limits.max_template_nodes).parse();
        let context = RenderContext {
            variables: ctx.variables.clone(),
            lists: ctx.lists.clone(),
        };

        ctx.response.status = 200;
        ctx.response.body = template::render(&nodes, &context);
        ctx.response.set_header("Content-Type", "text/html");
        debug!(path = %path, bytes = ctx.response.body.len(), "rendered template");
    }

    pub fn eval_expression(&mut self, expr: &Expression, ctx: &ExecutionContext) -> Result<Value> {
        self.tick()?;

        match expr {
            Expression::Integer(n) => Ok(Value::Int(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Variable(name) => Ok(self.lookup(name, ctx)),

            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let lhs = self.eval_expression(left, ctx)?;
                let rhs = self.eval_expression(right, ctx)?;
                Ok(eval_binary_op(*operator, lhs, rhs))
            }

            Expression::List(elements) => {
                let values = elements
                    .iter()
                    .map(|e| self.eval_expression(e, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(values))
            }

            Expression::Object(fields) => {
                let mut map = BTreeMap::new();
                for (key, value) in fields {
                    map.insert(key.clone(), self.eval_expression(value, ctx)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Resolve a name: `form.`, `session.`, `cookie.`, then script
    /// variables. Anything unresolved is an empty string.
    fn lookup(&self, name: &str, ctx: &ExecutionContext) -> Value {
        if let Some(key) = name.strip_prefix("form.") {
            return Value::String(ctx.form.get(key).cloned().unwrap_or_default());
        }

        if let Some(key) = name.strip_prefix("session.") {
            let user = ctx
                .request
                .cookie(key)
                .or_else(|| ctx.request.cookie(SESSION_COOKIE))
                .map(|sid| self.sessions.get(sid))
                .unwrap_or_default();
            return Value::String(user);
        }

        if let Some(key) = name.strip_prefix("cookie.") {
            return Value::String(ctx.request.cookie(key).unwrap_or_default().to_string());
        }

        self.resolve_variable(name, ctx).unwrap_or_else(|| {
            debug!(name = %name, "unset variable");
            Value::String(String::new())
        })
    }

    // Exact name first, then a field path into an object variable.
    fn resolve_variable(&self, name: &str, ctx: &ExecutionContext) -> Option<Value> {
        if let Some(value) = ctx.variables.get(name) {
            return Some(value.clone());
        }
        let (root, path) = name.split_once('.')?;
        ctx.variables.get(root)?.field_path(path).cloned()
    }
}

/// Loop variables bind to a row's `"value"` field when it has one.
fn loop_binding(value: Value) -> Value {
    match value {
        Value::Object(mut fields) => match fields.remove("value") {
            Some(canonical) => canonical,
            None => Value::Object(fields),
        },
        other => other,
    }
}

fn overflow(op: BinaryOp, a: i64, b: i64) -> Value {
    warn!(operator = %op, left = a, right = b, "integer overflow");
    Value::Null
}

pub fn eval_binary_op(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    match (op, lhs, rhs) {
        // Integer arithmetic
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => {
            a.checked_add(b).map_or_else(|| overflow(op, a, b), Value::Int)
        }
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => {
            a.checked_sub(b).map_or_else(|| overflow(op, a, b), Value::Int)
        }
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => {
            a.checked_mul(b).map_or_else(|| overflow(op, a, b), Value::Int)
        }
        (BinaryOp::Div, Value::Int(a), Value::Int(0)) => {
            error!(dividend = a, "division by zero");
            Value::Int(0)
        }
        (BinaryOp::Div, Value::Int(a), Value::Int(b)) => {
            a.checked_div(b).map_or_else(|| overflow(op, a, b), Value::Int)
        }

        // String concatenation
        (BinaryOp::Add, a, b) => Value::String(format!("{}{}", a, b)),

        // Comparison
        (BinaryOp::Eq, a, b) => Value::Bool(a == b),
        (BinaryOp::Ne, a, b) => Value::Bool(a != b),
        (BinaryOp::Lt, a, b) => Value::Bool(a.less_than(&b)),
        (BinaryOp::Gt, a, b) => Value::Bool(a.greater_than(&b)),

        (op, a, b) => {
            warn!(
                operator = %op,
                left = a.type_name(),
                right = b.type_name(),
                "unsupported operand types"
            );
            Value::Null
        }
    }
}
