//! HTTP surface: request model, routing and the listener

pub mod request;
pub mod router;
pub mod server;

pub use request::{parse_cookie_header, parse_form, Request, Response};
pub use router::{mime_type, App, Route, Router};
pub use server::serve;
