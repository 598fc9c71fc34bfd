use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use avatar_frame::{Error, Framer, Stage};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tiny_http::Method;

use crate::http::{Reply, Request};
use crate::multipart;

/// Everything a request handler can see. Immutable once the server starts.
#[derive(Debug)]
pub struct App {
    framer: Framer,
    static_dir: PathBuf,
    index: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    image_data: Option<String>,
    /// `None` when absent; an explicit `null` stays `Some(Value::Null)`
    #[serde(default, deserialize_with = "present")]
    frame_type: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl App {
    pub fn new(framer: Framer, static_dir: PathBuf, index: PathBuf) -> Self {
        App {
            framer,
            static_dir,
            index,
        }
    }

    pub fn max_body(&self) -> usize {
        self.framer.config().max_upload_bytes
    }

    pub fn handle(&self, req: &Request) -> Reply {
        let path = req.path.as_str();
        match (&req.method, path) {
            (Method::Get, "/") => serve_file(&self.index),
            (Method::Post, "/upload") => self.upload(req),
            (Method::Post, "/generate") => self.generate(req),
            (Method::Get, _) if path.starts_with("/static/") => {
                self.static_file(&path["/static/".len()..])
            }
            (_, "/" | "/upload" | "/generate") => Reply::method_not_allowed(),
            _ => Reply::not_found(),
        }
    }

    fn upload(&self, req: &Request) -> Reply {
        let Some(boundary) = req.content_type.as_deref().and_then(multipart::boundary) else {
            return upload_error(&Error::MissingFile);
        };
        let parts = match multipart::parse(&req.body, &boundary) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("Malformed upload form: {e}");
                return upload_error(&Error::MissingFile);
            }
        };
        let Some(file) = parts.into_iter().find(|part| part.name == "file") else {
            return upload_error(&Error::MissingFile);
        };

        let filename = file.filename.unwrap_or_default();
        match self.framer.prepare_upload(&filename, &file.data) {
            Ok(image) => Reply::success_image(&image),
            Err(e) => upload_error(&e),
        }
    }

    fn generate(&self, req: &Request) -> Reply {
        let image_data = serde_json::from_slice::<GenerateRequest>(&req.body)
            .ok()
            .and_then(|body| body.image_data.map(|data| (data, body.frame_type)));
        let Some((image_data, frame_type)) = image_data else {
            return Reply::text(400, "No image data provided");
        };

        // only an absent frameType means the default frame
        let frame_type = match &frame_type {
            None => None,
            Some(Value::String(name)) => Some(name.as_str()),
            Some(other) => {
                tracing::debug!("Rejecting frameType {other}");
                return Reply::text(400, "Invalid frame type");
            }
        };

        match self.framer.generate(&image_data, frame_type) {
            Ok(generated) => {
                Reply::attachment("image/jpeg", &generated.file_name, generated.data)
            }
            Err(e) => generate_error(&e),
        }
    }

    fn static_file(&self, name: &str) -> Reply {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Reply::not_found();
        }
        serve_file(&self.static_dir.join(name))
    }
}

fn upload_error(e: &Error) -> Reply {
    match e {
        Error::MissingFile => Reply::json_error(400, "No file uploaded"),
        Error::EmptyFilename => Reply::json_error(400, "No file selected"),
        Error::InvalidExtension(_) => Reply::json_error(400, "Invalid file type"),
        e => {
            tracing::error!("Upload error: {e}");
            Reply::json_error(500, "Error processing image")
        }
    }
}

fn generate_error(e: &Error) -> Reply {
    if let Error::UnknownFrameVariant(_) = e {
        return Reply::text(400, "Invalid frame type");
    }

    tracing::error!("Generation error: {e}");
    match e.stage() {
        Stage::Processing => Reply::text(500, "Error processing image"),
        Stage::Compositing => Reply::text(500, "Error creating frame"),
        Stage::Input | Stage::Encoding => Reply::text(500, "Error generating image"),
    }
}

fn serve_file(path: &Path) -> Reply {
    match fs::read(path) {
        Ok(data) => Reply::new(200, content_type_for(path), data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Reply::not_found(),
        Err(e) => {
            tracing::error!("Failed to read {}: {e}", path.display());
            Reply::json_error(500, "Internal server error")
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
