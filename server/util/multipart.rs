//! Minimal `multipart/form-data` reader for the prediction endpoint.

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    /// Present for file uploads, even when the browser sends an empty name.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// A parsed multipart body.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    /// Parses `body` if `content_type` is multipart with a boundary; any other
    /// content type yields an empty form.
    pub fn parse(content_type: &str, body: &[u8]) -> MultipartForm {
        if !content_type.trim_start().to_ascii_lowercase().starts_with("multipart/form-data") {
            return MultipartForm::default();
        }
        let boundary = match extract_boundary(content_type) {
            Some(b) if !b.is_empty() => b,
            _ => return MultipartForm::default(),
        };
        let delimiter = format!("--{}", boundary);
        let sep = b"\r\n\r\n";

        let mut parts = Vec::new();
        for raw in split_on(body, delimiter.as_bytes()) {
            let Some(sep_pos) = find_subsequence(raw, sep) else { continue };
            let headers = String::from_utf8_lossy(&raw[..sep_pos]);
            let Some(name) = disposition_param(&headers, "name") else { continue };
            let filename = disposition_param(&headers, "filename");
            let data = &raw[sep_pos + sep.len()..];
            let data = data.strip_suffix(b"\r\n").unwrap_or(data);
            parts.push(Part { name, filename, data: data.to_vec() });
        }
        MultipartForm { parts }
    }

    /// Bytes of the first file part named `name`.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name && p.filename.is_some())
            .map(|p| p.data.as_slice())
    }

    /// Value of the first non-file part named `name`.
    pub fn text(&self, name: &str) -> Option<String> {
        self.parts
            .iter()
            .find(|p| p.name == name && p.filename.is_none())
            .map(|p| String::from_utf8_lossy(&p.data).into_owned())
    }
}

/// Reads `key="value"` (or bare `key=value`) from a Content-Disposition
/// header, matching the parameter name exactly so `name` never picks up
/// `filename`.
fn disposition_param(headers: &str, key: &str) -> Option<String> {
    let line = headers
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-disposition:"))?;
    line.split(';').skip(1).find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        if k.trim().eq_ignore_ascii_case(key) {
            Some(v.trim().trim_matches('"').to_owned())
        } else {
            None
        }
    })
}
