//! Just enough `multipart/form-data` to pull a file out of a browser form

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("missing opening boundary")]
    NoBoundary,
    #[error("part {0} has no header terminator")]
    UnterminatedHeaders(usize),
    #[error("part {0} is not closed by a boundary")]
    UnterminatedPart(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Boundary parameter of a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<String> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params_of(params)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let next_delimiter = format!("\r\n--{boundary}").into_bytes();

    let mut pos = find(body, &delimiter, 0).ok_or(MultipartError::NoBoundary)? + delimiter.len();
    let mut parts = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        pos += if rest.starts_with(b"\r\n") {
            2
        } else if rest.starts_with(b"\n") {
            1
        } else {
            0
        };

        let index = parts.len();
        let header_end =
            find(body, b"\r\n\r\n", pos).ok_or(MultipartError::UnterminatedHeaders(index))?;
        let content_start = header_end + 4;
        let content_end = find(body, &next_delimiter, content_start)
            .ok_or(MultipartError::UnterminatedPart(index))?;

        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let mut part = Part {
            name: String::new(),
            filename: None,
            content_type: None,
            data: body[content_start..content_end].to_vec(),
        };
        for line in headers.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.eq_ignore_ascii_case("content-disposition") {
                let params = value.split_once(';').map_or("", |(_, params)| params);
                for (param, value) in params_of(params) {
                    match param.to_ascii_lowercase().as_str() {
                        "name" => part.name = value,
                        "filename" => part.filename = Some(value),
                        _ => {}
                    }
                }
            } else if key.eq_ignore_ascii_case("content-type") {
                part.content_type = Some(value.trim().to_string());
            }
        }

        log::trace!(
            "multipart part `{}` ({} bytes, filename {:?}, type {:?})",
            part.name,
            part.data.len(),
            part.filename,
            part.content_type
        );
        parts.push(part);
        pos = content_end + next_delimiter.len();
    }

    Ok(parts)
}

/// `key=value; key="quoted; value"` pairs, quotes removed
fn params_of(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut segment = String::new();
    let mut quoted = false;

    for c in params.chars().chain(std::iter::once(';')) {
        match c {
            '"' => {
                quoted = !quoted;
                segment.push(c);
            }
            ';' if !quoted => {
                if let Some((key, value)) = segment.split_once('=') {
                    let value = value.trim();
                    let value = value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(value);
                    pairs.push((key.trim().to_string(), value.to_string()));
                }
                segment.clear();
            }
            _ => segment.push(c),
        }
    }

    pairs
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=----WebKitFormBoundaryabc").as_deref(),
            Some("----WebKitFormBoundaryabc")
        );
        assert_eq!(
            boundary("Multipart/Form-Data; charset=utf-8; boundary=\"a b\"").as_deref(),
            Some("a b")
        );
        assert_eq!(boundary("application/json"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn file_and_field() {
        let data: &[u8] = b"\x89PNG\r\n\x1a\n\r\n--not-quite";
        let body = form(
            "XyZ",
            &[("note", None, b"hello"), ("file", Some("me; myself.png"), data)],
        );

        let parts = parse(&body, "XyZ").unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "note");
        assert_eq!(parts[0].data, b"hello");
        assert_eq!(parts[0].filename, None);
        assert_eq!(parts[1].name, "file");
        assert_eq!(parts[1].filename.as_deref(), Some("me; myself.png"));
        assert_eq!(parts[1].content_type.as_deref(), Some("image/png"));
        assert_eq!(parts[1].data, data);
    }

    #[test]
    fn empty_filename() {
        let body = form("b", &[("file", Some(""), b"")]);
        let parts = parse(&body, "b").unwrap();
        assert_eq!(parts[0].filename.as_deref(), Some(""));
        assert!(parts[0].data.is_empty());
    }

    #[test]
    fn malformed() {
        assert_eq!(parse(b"garbage", "b"), Err(MultipartError::NoBoundary));
        assert_eq!(
            parse(b"--b\r\nContent-Disposition: form-data; name=\"file\"\r\n\r\nabc", "b"),
            Err(MultipartError::UnterminatedPart(0))
        );
        assert_eq!(
            parse(b"--b\r\nContent-Disposition: form-data", "b"),
            Err(MultipartError::UnterminatedHeaders(0))
        );
    }
}
