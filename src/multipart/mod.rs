//! Multipart body materialization subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound body + Content-Type header
//!     → params.rs (boundary, Content-Disposition parameters)
//!     → parser.rs (split on delimiters, recurse into multipart/* parts)
//!     → Vec<BodyPart> (flat, depth-first, content-ids assigned)
//!     → writer.rs (re-frame under the original boundary, once per attempt)
//! ```
//!
//! # Design Decisions
//! - Nested multipart parts are spliced into the parent sequence in place
//! - Content-ids count siblings within their enclosing multipart container,
//!   so nested children are numbered from 0 independently of their parent
//! - Payloads are `Bytes` slices of the inbound body (no copies)
//! - Serialization is a pure function of the part list

pub mod params;
pub mod parser;
pub mod writer;

use axum::body::Bytes;
use thiserror::Error;

pub use params::{boundary_from_content_type, is_multipart, ContentDisposition, DispositionParam};
pub use parser::materialize;
pub use writer::serialize;

/// Errors raised when a body claims a multipart content type but cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    /// Content-Type is not `multipart/*`.
    #[error("content type '{0}' is not multipart")]
    NotMultipart(String),

    /// Content-Type has no usable `boundary` parameter.
    #[error("multipart content type has no boundary parameter")]
    MissingBoundary,

    /// Body does not start with the boundary delimiter.
    #[error("body does not begin with the boundary delimiter")]
    MissingDelimiter,

    /// A delimiter line is followed by something other than CRLF or `--`.
    #[error("malformed delimiter line after part {0}")]
    MalformedDelimiter(usize),

    /// A part never reaches the next delimiter.
    #[error("part {0} is not terminated by a boundary delimiter")]
    UnterminatedPart(usize),

    /// A header line inside a part could not be parsed.
    #[error("invalid part header: {0}")]
    InvalidHeader(String),

    /// Nested multipart containers exceed the supported depth.
    #[error("multipart nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// One materialized multipart segment.
///
/// `content_type` and `disposition` are lifted out of the raw header list;
/// `headers` keeps every other header with its original name and order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Sibling position inside the enclosing multipart container.
    pub content_id: usize,
    pub disposition: Option<ContentDisposition>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl BodyPart {
    /// Form field name from the `name` disposition parameter.
    pub fn name(&self) -> Option<&str> {
        self.disposition.as_ref().and_then(|d| d.param("name"))
    }

    /// File name from the `filename` disposition parameter.
    pub fn filename(&self) -> Option<&str> {
        self.disposition.as_ref().and_then(|d| d.param("filename"))
    }

    /// Look up a passthrough header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
