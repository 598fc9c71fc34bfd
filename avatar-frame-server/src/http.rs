//! Request and reply types the routes work with, plus body reading

use std::io::{self, Read};

use serde::Serialize;
use thiserror::Error;
use tiny_http::{Header, Method, Response};

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path without the query string
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or_default().to_string();
        Request {
            method,
            path,
            content_type: None,
            body: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// JSON body of every `/upload` reply and of generic errors
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// `16MB`, `512KB` or `1000 bytes`, whichever is exact
fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    match bytes {
        0 => "0 bytes".to_string(),
        b if b % MIB == 0 => format!("{}MB", b / MIB),
        b if b % KIB == 0 => format!("{}KB", b / KIB),
        b => format!("{b} bytes"),
    }
}

impl Reply {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Reply {
            status,
            content_type,
            headers: Vec::new(),
            body,
        }
    }

    pub fn text(status: u16, message: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", message.as_bytes().to_vec())
    }

    fn envelope(status: u16, envelope: &Envelope) -> Self {
        // serializing a struct of strings and bools cannot fail
        let body = serde_json::to_vec(envelope).unwrap_or_default();
        Self::new(status, "application/json", body)
    }

    pub fn success_image(image: &str) -> Self {
        Self::envelope(
            200,
            &Envelope {
                success: true,
                image: Some(image),
                error: None,
            },
        )
    }

    pub fn json_error(status: u16, error: &str) -> Self {
        Self::envelope(
            status,
            &Envelope {
                success: false,
                image: None,
                error: Some(error),
            },
        )
    }

    pub fn too_large(limit: usize) -> Self {
        let message = format!("File is too large (max {})", human_size(limit));
        Self::json_error(413, &message)
    }

    pub fn not_found() -> Self {
        Self::json_error(404, "Not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::json_error(405, "Method not allowed")
    }

    pub fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Self {
        let mut reply = Self::new(200, content_type, body);
        reply.headers.push((
            "Content-Disposition".to_string(),
            format!("attachment; filename=\"{file_name}\""),
        ));
        reply
    }

    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_response(self) -> Response<io::Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(self.status);
        let headers = std::iter::once(("Content-Type".to_string(), self.content_type.to_string()))
            .chain(self.headers);
        for (name, value) in headers {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(header) => response.add_header(header),
                Err(()) => log::warn!("Dropping invalid response header `{name}`"),
            }
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),
    #[error("failed to read request body: {0}")]
    Io(#[from] io::Error),
}

/// Read at most `limit` bytes. A declared length over the limit is refused
/// before reading anything; undeclared bodies are cut off one byte past it.
pub fn read_body(
    reader: &mut dyn Read,
    declared: Option<usize>,
    limit: usize,
) -> Result<Vec<u8>, BodyError> {
    if declared.is_some_and(|len| len > limit) {
        return Err(BodyError::TooLarge(limit));
    }

    let mut body = Vec::with_capacity(declared.unwrap_or(0));
    reader.take(limit as u64 + 1).read_to_end(&mut body)?;
    if body.len() > limit {
        return Err(BodyError::TooLarge(limit));
    }
    Ok(body)
}
