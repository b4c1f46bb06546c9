//! Header parameter parsing.
//!
//! Handles the `type; key=value; key="quoted value"` shape shared by
//! `Content-Type` and `Content-Disposition`.

use std::fmt;

use crate::multipart::MultipartError;

/// Returns true if the media type of `content_type` is `multipart/*`.
pub fn is_multipart(content_type: &str) -> bool {
    let (media_type, _) = split_params(content_type);
    media_type.to_ascii_lowercase().starts_with("multipart/")
}

/// Extract the mandatory `boundary` parameter of a multipart content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let (media_type, params) = split_params(content_type);
    if !media_type.to_ascii_lowercase().starts_with("multipart/") {
        return Err(MultipartError::NotMultipart(media_type));
    }

    params
        .into_iter()
        .find(|(key, _)| key == "boundary")
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// One `Content-Disposition` parameter as it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionParam {
    /// Lowercased parameter name.
    pub name: String,
    /// Unquoted value; `None` for a bare `; token` parameter.
    pub value: Option<String>,
    /// Whether the value was sent as a quoted-string.
    pub quoted: bool,
}

impl DispositionParam {
    /// RFC 8187 extended parameter (`filename*=UTF-8''...`).
    pub fn is_extended(&self) -> bool {
        self.name.ends_with('*')
    }
}

/// Parsed `Content-Disposition` header value.
///
/// Rendered back without whitespace around separators, e.g.
/// `form-data;name="foo";filename="a.txt"`. Extended parameters stay
/// unquoted and bare parameters stay bare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    pub kind: String,
    pub params: Vec<DispositionParam>,
}

impl ContentDisposition {
    pub fn parse(value: &str) -> Self {
        let (kind, params) = split_raw_params(value);
        let params = params
            .into_iter()
            .map(|(name, raw)| {
                let quoted = raw.is_some_and(|r| r.len() >= 2 && r.starts_with('"') && r.ends_with('"'));
                DispositionParam {
                    name,
                    value: raw.map(unquote),
                    quoted,
                }
            })
            .collect();
        Self {
            kind: kind.to_ascii_lowercase(),
            params,
        }
    }

    /// Parameter value by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        for param in &self.params {
            write!(f, ";{}", param.name)?;
            let Some(value) = &param.value else {
                continue;
            };

            if param.is_extended() || (!param.quoted && is_token(value)) {
                write!(f, "={}", value)?;
                continue;
            }

            f.write_str("=\"")?;
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

// RFC 9110 token characters.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Split a header value into its primary token and lowercased `key=value` parameters.
pub(crate) fn split_params(value: &str) -> (String, Vec<(String, String)>) {
    let (primary, params) = split_raw_params(value);
    let params = params
        .into_iter()
        .map(|(key, raw)| (key, raw.map(unquote).unwrap_or_default()))
        .collect();
    (primary, params)
}

// Parameters keep their raw (possibly quoted) value; `None` when no `=` was present.
fn split_raw_params(value: &str) -> (String, Vec<(String, Option<&str>)>) {
    let mut segments = split_unquoted(value, ';').into_iter();
    let primary = segments
        .next()
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let params = segments
        .filter_map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                return None;
            }
            Some(match segment.split_once('=') {
                Some((key, raw)) => (key.trim().to_ascii_lowercase(), Some(raw.trim())),
                None => (segment.to_ascii_lowercase(), None),
            })
        })
        .collect();

    (primary, params)
}

// Separators inside quoted strings do not split.
fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                segments.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

fn unquote(raw: &str) -> String {
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return raw.to_string();
    }

    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
