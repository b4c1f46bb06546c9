//! Multipart serialization.

use axum::body::Bytes;

use crate::multipart::BodyPart;

/// Re-frame a part list under `boundary`.
///
/// Each part is written as its passthrough headers (original names, original
/// order), then `content-type`, `content-disposition` and the assigned
/// `content-id`, a blank line and the payload. The output is fully
/// determined by the inputs, so every failover attempt sends identical bytes.
pub fn serialize(parts: &[BodyPart], boundary: &str) -> Bytes {
    let capacity = parts
        .iter()
        .map(|p| p.body.len() + boundary.len() + 128)
        .sum::<usize>()
        + boundary.len()
        + 8;
    let mut out = Vec::with_capacity(capacity);

    for part in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");

        for (name, value) in &part.headers {
            push_header(&mut out, name, value);
        }
        if let Some(content_type) = &part.content_type {
            push_header(&mut out, "content-type", content_type);
        }
        if let Some(disposition) = &part.disposition {
            push_header(&mut out, "content-disposition", &disposition.to_string());
        }
        push_header(&mut out, "content-id", &part.content_id.to_string());

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.body);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");

    Bytes::from(out)
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}
