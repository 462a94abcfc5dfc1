//! Decoding of the API gateway event into the raw bytes of the uploaded file.
//!
//! The gateway hands over the request body base64-encoded under `body-json`.
//! Once decoded it is a `multipart/form-data` body, but the original
//! `Content-Type` header (and with it the boundary) is not forwarded, so the
//! boundary is recovered from the delimiter line the body starts with.

use std::convert::Infallible;

use base64::{engine::general_purpose, Engine as _};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The event the hosting runtime delivers for every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    #[serde(rename = "body-json")]
    pub body_json: String,
}

impl UploadEvent {
    /// Wrap a single file the way the gateway would: a one-part multipart
    /// form, base64 encoded.
    pub fn from_file(filename: &str, content_type: &str, data: &[u8]) -> Self {
        let body = multipart_body("tf-upload-boundary", filename, content_type, data);

        UploadEvent {
            body_json: general_purpose::STANDARD.encode(body),
        }
    }
}

/// Single-part `multipart/form-data` body carrying `data` as field `file`.
pub fn multipart_body(boundary: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Base64 decode, ignoring line breaks and other ASCII whitespace.
pub fn decode_body(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    Ok(general_purpose::STANDARD.decode(compact)?)
}

/// Boundary token taken from the first CRLF-terminated line of `body`.
pub fn boundary_of(body: &[u8]) -> Result<String> {
    let end = body
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(Error::MissingBoundary)?;

    let line = std::str::from_utf8(&body[..end]).map_err(|_| Error::MissingBoundary)?;

    line.trim_end()
        .strip_prefix("--")
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(Error::MissingBoundary)
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}

/// Raw content of the first part of a multipart body.
///
/// The remaining parts are read and discarded so that a malformed body is
/// reported even when the damage is past the first part.
pub async fn first_part(body: Vec<u8>, content_type: &str) -> Result<Vec<u8>> {
    let boundary = multer::parse_boundary(content_type)?;
    let body = fill_empty_headers(&body, &boundary);
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let first = match multipart.next_field().await? {
        Some(field) => field.bytes().await?.to_vec(),
        None => return Err(Error::EmptyMultipart),
    };

    let mut parts = 1;
    while let Some(field) = multipart.next_field().await? {
        field.bytes().await?;
        parts += 1;
    }

    debug!("Multipart body has {} part(s), using the first", parts);

    Ok(first)
}

/// Header line given to parts that have none; the multipart parser needs at
/// least one header before the blank line that ends the header block.
const DEFAULT_PART_HEADER: &[u8] = b"Content-Type: text/plain\r\n";

/// Copy of `body` where every delimiter line directly followed by a blank
/// line (a part without headers) gets `DEFAULT_PART_HEADER`.
fn fill_empty_headers(body: &[u8], boundary: &str) -> Vec<u8> {
    let line = format!("--{}\r\n", boundary).into_bytes();
    let mut out = Vec::with_capacity(body.len() + DEFAULT_PART_HEADER.len());
    let mut i = 0;

    while i < body.len() {
        let at_delimiter =
            (i == 0 || body[..i].ends_with(b"\r\n")) && body[i..].starts_with(&line);

        if at_delimiter && body[i + line.len()..].starts_with(b"\r\n") {
            out.extend_from_slice(&line);
            out.extend_from_slice(DEFAULT_PART_HEADER);
            i += line.len();
        } else {
            out.push(body[i]);
            i += 1;
        }
    }

    out
}

/// Bytes of the uploaded file carried by a gateway event body.
pub async fn extract_image(encoded: &str) -> Result<Vec<u8>> {
    let body = decode_body(encoded)?;
    let boundary = boundary_of(&body)?;
    let content_type = content_type(&boundary);

    debug!("Decoded {} byte request body, {}", body.len(), content_type);

    first_part(body, &content_type).await
}
