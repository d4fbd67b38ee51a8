//! Sitescript
//!
//! A small server-side scripting and templating stack: route handlers are
//! scripts that read form fields, cookies and session state, then render
//! templates, redirect, or set cookies.

pub mod ast;
pub mod config;
pub mod error;
pub mod executor;
pub mod files;
pub mod http;
pub mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod session;
pub mod template;
pub mod value;

pub use config::{Config, Limits};
pub use error::{Result, ScriptError};
pub use executor::ScriptRuntime;
pub use value::Value;
