//! The request value and the wire parser that produces it.
//!
//! Unlike the zero-copy design this module is descended from, every field here is
//! owned: the path is percent-decoded and normalized, header values are copied out of
//! the connection's read buffer, and params/query/context are plain
//! `HashMap<String, String>`s. Owning the data is what makes percent-decoding, dot-
//! segment normalization, and a mutable per-request context map possible at all — the
//! teacher's `&'static [u8]`-via-`unsafe fn into_static` trick only works because its
//! `Url` never needs to hold bytes that don't already live in the reused connection
//! buffer.

use crate::errors::ErrorKind;
use crate::http::path::{normalize, percent_decode};
use crate::http::query;
use crate::http::types::Method;
use crate::limits::ReqLimits;
use std::collections::HashMap;

/// A parsed, immutable-by-convention HTTP request.
///
/// Header lookup ([`Request::header`]) is case-insensitive; [`Request::headers`]
/// preserves the original wire order and casing for anything that needs to inspect it
/// directly (logging, signature verification, ...).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    ctx: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        query: HashMap<String, String>,
    ) -> Self {
        Request { method, path, headers, body, params: HashMap::new(), query, ctx: HashMap::new() }
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The percent-decoded, normalized path (never contains `.`, `..`, or empty
    /// segments).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All header pairs in wire order, original casing preserved.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup. Returns the first matching value if the header
    /// appears more than once.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The request body as raw bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The request body interpreted as UTF-8, if valid.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// A path parameter captured by the router (e.g. `{id}` or the catch-all `*`).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All path parameters captured by the router.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// A query string value. Duplicate keys keep the last value seen on the wire.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// All query string key/value pairs.
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Reads a request-scoped context value set by upstream middleware.
    pub fn ctx(&self, key: &str) -> Option<&str> {
        self.ctx.get(key).map(String::as_str)
    }

    /// Returns a copy of this request with a context value attached, for middleware
    /// to pass data downstream through the handler chain.
    pub fn with_ctx(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.ctx.insert(key.into(), value.into());
        next
    }

    /// Reads a single cookie by name from the `Cookie` header
    /// (`name=value; name=value`, semicolon-space delimited). Returns everything
    /// after the first `=` on the first occurrence found.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let raw = self.header("cookie")?;
        raw.split(';').map(str::trim).find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == name).then_some(v)
        })
    }
}

/// The parsed request-line and header block, produced once the header terminator has
/// been located but before the body (whose length it names) has necessarily arrived.
pub(crate) struct ParsedHead {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_length: usize,
    pub(crate) header_block_len: usize,
}

/// Locates the first `\r\n\r\n` in `buf`. Returns the offset of its first byte.
pub(crate) fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    memchr::memmem::find(buf, b"\r\n\r\n")
}

/// Parses the request-line and header block once its terminator has been found.
/// Implements spec steps 2-9, 11 (everything except extracting the body, since the
/// body may not have fully arrived yet).
pub(crate) fn parse_head(buf: &[u8], limits: &ReqLimits) -> Result<ParsedHead, ErrorKind> {
    let term = find_header_terminator(buf).ok_or(ErrorKind::InvalidUrl)?;
    if term > limits.max_header_size {
        return Err(ErrorKind::HeaderTooLarge);
    }

    let header_block = &buf[..term];
    let mut raw_lines = header_block.split(|&b| b == b'\n').map(strip_trailing_cr);

    let request_line = raw_lines.next().ok_or(ErrorKind::InvalidUrl)?;
    let mut tokens = request_line.split(|&b| b == b' ').filter(|s| !s.is_empty());
    let method_tok = tokens.next().ok_or(ErrorKind::InvalidUrl)?;
    let target_tok = tokens.next().ok_or(ErrorKind::InvalidUrl)?;
    let version_tok = tokens.next().ok_or(ErrorKind::InvalidVersion)?;
    if tokens.next().is_some() {
        return Err(ErrorKind::InvalidUrl);
    }
    if version_tok.is_empty() {
        return Err(ErrorKind::InvalidVersion);
    }

    let method = Method::from_token(method_tok)?;

    let (raw_path, raw_query) = match target_tok.iter().position(|&b| b == b'?') {
        Some(i) => (&target_tok[..i], &target_tok[i + 1..]),
        None => (target_tok, &target_tok[target_tok.len()..]),
    };
    if raw_path.is_empty() {
        return Err(ErrorKind::InvalidUrl);
    }
    let decoded_path = percent_decode(raw_path);
    let path = normalize(&decoded_path).map_err(|()| ErrorKind::PathTraversal)?;
    let query = query::parse(&String::from_utf8_lossy(raw_query));

    let mut headers = Vec::new();
    let mut header_count = 0usize;
    let mut content_length: Option<usize> = None;

    for line in raw_lines {
        if line.is_empty() {
            continue;
        }
        header_count += 1;
        if header_count > limits.max_header_count {
            return Err(ErrorKind::HeaderTooLarge);
        }

        let colon = line.iter().position(|&b| b == b':').ok_or(ErrorKind::InvalidHeader)?;
        let name = String::from_utf8_lossy(&line[..colon]).into_owned();
        let mut value = &line[colon + 1..];
        if value.first() == Some(&b' ') {
            value = &value[1..];
        }
        let value = String::from_utf8_lossy(value).trim().to_string();

        if name.eq_ignore_ascii_case("content-length") {
            if content_length.is_some() {
                return Err(ErrorKind::DuplicateContentLength);
            }
            let parsed: usize = value.trim().parse().map_err(|_| ErrorKind::InvalidContentLength)?;
            content_length = Some(parsed);
        }

        headers.push((name, value));
    }

    let content_length = content_length.unwrap_or(0);
    if content_length > limits.max_body_size {
        return Err(ErrorKind::BodyTooLarge);
    }

    Ok(ParsedHead { method, path, query, headers, content_length, header_block_len: term + 4 })
}

/// Finishes parsing once `buf` contains the full body described by `head`. Implements
/// spec step 10. Returns the request and the total number of bytes consumed from
/// `buf` (header block plus body), so the connection layer can advance past it to the
/// next pipelined request.
pub(crate) fn finish(head: ParsedHead, buf: &[u8]) -> Result<(Request, usize), ErrorKind> {
    let total = head.header_block_len + head.content_length;
    let available = buf.len().saturating_sub(head.header_block_len);
    if available < head.content_length {
        return Err(ErrorKind::BodyMismatch { expected: head.content_length, available });
    }
    let body = buf[head.header_block_len..total].to_vec();
    let request = Request::new(head.method, head.path, head.headers, body, head.query);
    Ok((request, total))
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}
