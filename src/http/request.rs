//! Request and response model handed between the server, router and scripts

use std::collections::{BTreeMap, HashMap};

/// Inbound request, read-only while a script runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: String,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Build a request from a method and a URL that may carry a query string.
    pub fn new(method: &str, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        Request {
            method: method.to_uppercase(),
            path: path.to_string(),
            query: query.to_string(),
            ..Default::default()
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str, body: &str) -> Self {
        Self::new("POST", url)
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(body)
    }

    /// Add a header; a `Cookie` header also fills the cookie map.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookie_header(value));
        }
        self.headers.insert(name, value.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Form fields from an urlencoded body. Empty unless the method is POST.
    pub fn form_fields(&self) -> HashMap<String, String> {
        if self.method != "POST" {
            return HashMap::new();
        }
        parse_form(&self.body)
    }
}

/// Split a `Cookie:` header value (`a=1; b=2`) into name/value pairs.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Response under construction, mutated in place by a script
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Full `Set-Cookie` values, in the order they were added
    pub cookies: Vec<String>,
    /// Raw payload for static files that are not UTF-8; replaces `body`
    pub bytes: Option<Vec<u8>>,
}

impl Default for Response {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/html".to_string());
        Response {
            status: 200,
            headers,
            body: String::new(),
            cookies: Vec::new(),
            bytes: None,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain response with the given status, content type and body
    pub fn with_content(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        let mut response = Response {
            status,
            body: body.into(),
            ..Default::default()
        };
        response.set_header("Content-Type", content_type);
        response
    }

    /// Static file payload; text stays in `body`, anything else in `bytes`.
    pub fn with_file(content_type: &str, data: Vec<u8>) -> Self {
        match String::from_utf8(data) {
            Ok(text) => Self::with_content(200, content_type, text),
            Err(e) => {
                let mut response = Self::with_content(200, content_type, String::new());
                response.bytes = Some(e.into_bytes());
                response
            }
        }
    }

    /// Bytes to put on the wire
    pub fn payload(&self) -> &[u8] {
        match &self.bytes {
            Some(bytes) => bytes,
            None => self.body.as_bytes(),
        }
    }

    pub fn not_found() -> Self {
        Self::with_content(404, "text/plain", "404 Not Found")
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::with_content(500, "text/plain", message)
    }

    /// `"302 Found"` style status line text
    pub fn status_line(&self) -> String {
        format!("{} {}", self.status, reason_phrase(self.status))
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn redirect(&mut self, url: &str) {
        self.status = 302;
        self.set_header("Location", url);
        self.body.clear();
    }

    pub fn is_redirect(&self) -> bool {
        self.status == 302
    }

    pub fn add_cookie(&mut self, name: &str, value: &str) {
        self.cookies
            .push(format!("{}={}; Path=/; HttpOnly", name, value));
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_splits_query() {
        let request = Request::new("get", "/search?q=rust");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/search");
        assert_eq!(request.query, "q=rust");
    }

    #[test]
    fn test_cookie_header() {
        let cookies = parse_cookie_header("sid=abc123; theme = dark;bad; =x");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["sid"], "abc123");
        assert_eq!(cookies["theme"], "dark");

        let request = Request::get("/").with_header("Cookie", "sid=xyz");
        assert_eq!(request.cookie("sid"), Some("xyz"));
        assert_eq!(request.header("COOKIE"), Some("sid=xyz"));
    }

    #[test]
    fn test_form_fields_decode() {
        let request = Request::post("/login", "user=Eve+Smith&note=a%26b%3Dc&empty=&flag");
        let form = request.form_fields();
        assert_eq!(form["user"], "Eve Smith");
        assert_eq!(form["note"], "a&b=c");
        assert_eq!(form["empty"], "");
        assert_eq!(form["flag"], "");
    }

    #[test]
    fn test_form_fields_only_for_post() {
        let request = Request::get("/login").with_body("user=eve");
        assert!(request.form_fields().is_empty());
    }

    #[test]
    fn test_response_defaults() {
        let response = Response::new();
        assert_eq!(response.status_line(), "200 OK");
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert!(response.cookies.is_empty());
    }

    #[test]
    fn test_redirect_clears_body() {
        let mut response = Response::new();
        response.body = "partial".to_string();
        response.redirect("/home");
        assert!(response.is_redirect());
        assert_eq!(response.status_line(), "302 Found");
        assert_eq!(response.header("Location"), Some("/home"));
        assert_eq!(response.body, "");
    }

    #[test]
    fn test_add_cookie_format() {
        let mut response = Response::new();
        response.add_cookie("sid", "abc");
        assert_eq!(response.cookies, vec!["sid=abc; Path=/; HttpOnly".to_string()]);
    }

    #[test]
    fn test_error_constructors() {
        let response = Response::server_error("boom");
        assert_eq!(response.status_line(), "500 Internal Server Error");
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.body, "boom");
        assert_eq!(Response::not_found().status, 404);
    }

    #[test]
    fn test_file_payloads() {
        let text = Response::with_file("text/css", b"body {}".to_vec());
        assert_eq!(text.body, "body {}");
        assert_eq!(text.bytes, None);

        let png = Response::with_file("image/png", vec![0x89, b'P', b'N', b'G', 0xff]);
        assert_eq!(png.body, "");
        assert_eq!(png.payload(), &[0x89, b'P', b'N', b'G', 0xff]);
    }
}
