//! Binary responses.

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use percent_encoding::percent_decode_str;

/// A downloaded file, such as an invoice PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownload {
    /// Name suggested by `content-disposition`.
    pub filename: Option<String>,
    /// `content-type`, or `application/octet-stream` when absent.
    pub content_type: String,
    /// `content-length`, when the server sent one.
    pub size: Option<u64>,
    /// The raw body.
    pub data: Bytes,
}

impl FileDownload {
    pub(crate) fn from_parts(headers: &HeaderMap, data: Bytes) -> Self {
        let header = |name| headers.get(name).and_then(|value| value.to_str().ok());
        Self {
            filename: header(CONTENT_DISPOSITION).and_then(filename_from_disposition),
            content_type: header(CONTENT_TYPE)
                .filter(|value| !value.is_empty())
                .unwrap_or("application/octet-stream")
                .to_owned(),
            size: header(CONTENT_LENGTH).and_then(|value| value.trim().parse().ok()),
            data,
        }
    }
}

/// Extracts the file name from a `content-disposition` value.
///
/// `filename*` (RFC 5987, `charset'lang'pct-encoded`) wins over `filename`.
#[must_use]
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in split_params(value) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                let decoded = percent_decode_str(unquote(encoded))
                    .decode_utf8_lossy()
                    .into_owned();
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
            "filename" => {
                let name = unquote(raw);
                if !name.is_empty() {
                    plain = Some(name.to_owned());
                }
            }
            _ => {}
        }
    }
    plain
}

/// Splits on `;` outside double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}
