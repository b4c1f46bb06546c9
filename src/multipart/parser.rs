//! Multipart parsing.
//!
//! # Responsibilities
//! - Locate boundary delimiters in the raw body
//! - Parse per-part header blocks
//! - Recurse into `multipart/*` parts and splice their children in place
//! - Assign content-ids by sibling position

use axum::body::Bytes;

use crate::multipart::params::{boundary_from_content_type, is_multipart, ContentDisposition};
use crate::multipart::{BodyPart, MultipartError};

/// Maximum depth of nested multipart containers.
pub const MAX_NESTING: usize = 8;

const CRLF: &[u8] = b"\r\n";

/// Materialize a multipart body into a flat, ordered part list.
///
/// Parts of a nested `multipart/*` container replace the container at its
/// position (depth-first, left to right). Each part's content-id is its index
/// among the siblings of its own container, starting at 0.
pub fn materialize(body: &Bytes, content_type: &str) -> Result<Vec<BodyPart>, MultipartError> {
    let boundary = boundary_from_content_type(content_type)?;
    let mut parts = Vec::new();
    materialize_into(body, &boundary, 0, &mut parts)?;
    Ok(parts)
}

fn materialize_into(
    body: &Bytes,
    boundary: &str,
    depth: usize,
    out: &mut Vec<BodyPart>,
) -> Result<(), MultipartError> {
    if depth >= MAX_NESTING {
        return Err(MultipartError::TooDeep(MAX_NESTING));
    }

    let delimiter = format!("--{}", boundary).into_bytes();
    if !body.starts_with(&delimiter) {
        return Err(MultipartError::MissingDelimiter);
    }
    let separator = [CRLF, delimiter.as_slice()].concat();

    let mut position = delimiter.len();
    let mut sibling = 0;

    loop {
        let rest = &body[position..];
        if rest.starts_with(b"--") {
            return Ok(());
        }

        // Transport padding is allowed between the delimiter and its CRLF.
        let padding = rest
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        if !rest[padding..].starts_with(CRLF) {
            return Err(MultipartError::MalformedDelimiter(sibling));
        }

        let part_start = position + padding + CRLF.len();
        let part_len = find(&body[part_start..], &separator)
            .ok_or(MultipartError::UnterminatedPart(sibling))?;
        let raw = body.slice(part_start..part_start + part_len);

        let (headers, payload) = split_part(&raw)?;
        let mut part = build_part(headers, payload, sibling);

        match part.content_type.as_deref() {
            Some(ct) if is_multipart(ct) => {
                let nested = boundary_from_content_type(ct)?;
                materialize_into(&part.body, &nested, depth + 1, out)?;
            }
            _ => {
                part.content_id = sibling;
                out.push(part);
            }
        }

        sibling += 1;
        position = part_start + part_len + separator.len();
    }
}

/// Split a raw part into its header lines and payload.
fn split_part(raw: &Bytes) -> Result<(Vec<(String, String)>, Bytes), MultipartError> {
    // A part with no headers starts directly with the blank line.
    if raw.starts_with(CRLF) {
        return Ok((Vec::new(), raw.slice(CRLF.len()..)));
    }

    let header_end = find(raw, b"\r\n\r\n")
        .ok_or_else(|| MultipartError::InvalidHeader("header block is not terminated".to_string()))?;
    let block = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| MultipartError::InvalidHeader("header block is not valid UTF-8".to_string()))?;

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.split("\r\n") {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header.
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => return Err(MultipartError::InvalidHeader(line.to_string())),
            }
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| MultipartError::InvalidHeader(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MultipartError::InvalidHeader(line.to_string()));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok((headers, raw.slice(header_end + 4..)))
}

fn build_part(raw_headers: Vec<(String, String)>, body: Bytes, content_id: usize) -> BodyPart {
    let mut disposition = None;
    let mut content_type = None;
    let mut headers = Vec::with_capacity(raw_headers.len());

    for (name, value) in raw_headers {
        if name.eq_ignore_ascii_case("content-disposition") {
            disposition = Some(ContentDisposition::parse(&value));
        } else if name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value);
        } else if name.eq_ignore_ascii_case("content-id") {
            // Replaced by the assigned id on serialization.
        } else {
            headers.push((name, value));
        }
    }

    BodyPart {
        content_id,
        disposition,
        content_type,
        headers,
        body,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
