//! A structured HTTP response builder.
//!
//! Status, headers, and body are kept as plain data (rather than serialized
//! incrementally into a byte buffer, as the zero-copy design this module descends
//! from did) because middleware specified in [`crate::middleware`] — CORS,
//! RequestID, Recoverer — all need to attach headers to a response *after* the
//! handler has already written its body. Serialization to wire bytes happens once,
//! in [`Response::serialize`], called by the connection layer.

use crate::http::types::StatusCode;
use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

/// HTTP response builder for constructing server responses.
///
/// Handlers build one of these and return it; middleware may read and append to it
/// on the way back out. Defaults to `200 OK` with no headers and an empty body.
///
/// # Examples
/// ```
/// use chirust_web::{Request, Response, StatusCode};
///
/// fn handle(_req: &Request) -> Response {
///     let mut resp = Response::new();
///     resp.status(StatusCode::Ok).header("content-type", "text/html").body("<h1>Hello</h1>");
///     resp
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    keep_alive: bool,
}

/// Marker type returned by [`Response::body`]/[`Response::body_with`] so a handler's
/// return-expression visibly indicates it finished building the response, mirroring
/// the builder-completion marker the teacher codebase used for the same purpose.
#[doc(hidden)]
pub struct Handled(());

impl Default for Response {
    fn default() -> Self {
        Response { status: StatusCode::Ok, headers: Vec::new(), body: Vec::new(), keep_alive: true }
    }
}

impl Response {
    /// A fresh `200 OK` response with no headers and an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// The currently set status code.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Appends a header. Does not overwrite an existing header of the same name —
    /// duplicate headers are a supported part of the wire format (e.g. multiple
    /// `Set-Cookie` lines) and are preserved in registration order.
    pub fn header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        let mut name_buf = Vec::new();
        name.write_to(&mut name_buf);
        let mut value_buf = Vec::new();
        value.write_to(&mut value_buf);
        self.headers.push((
            String::from_utf8_lossy(&name_buf).into_owned(),
            String::from_utf8_lossy(&value_buf).into_owned(),
        ));
        self
    }

    /// Case-insensitive header lookup. Returns the first matching value.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// All header pairs in registration order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Sets the body, replacing any previously set body.
    pub fn body<T: WriteBuffer>(&mut self, data: T) -> Handled {
        self.body.clear();
        data.write_to(&mut self.body);
        Handled(())
    }

    /// Builds the body incrementally via a [`BodyWriter`], useful for assembling a
    /// response out of several pieces without an intermediate `String`/`Vec<u8>`.
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> Handled {
        self.body.clear();
        let mut writer = BodyWriter(&mut self.body);
        f(&mut writer);
        Handled(())
    }

    /// The body bytes set so far.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Marks the connection this response answers as non-keep-alive; the connection
    /// layer will append `Connection: close` and close the socket after writing.
    pub fn close(&mut self) -> &mut Self {
        self.keep_alive = false;
        self
    }

    pub(crate) fn wants_close(&self) -> bool {
        !self.keep_alive
    }

    /// Appends a `Set-Cookie` header with attributes in the fixed order the wire
    /// format expects: `Path` (defaulting to `/`), `Domain`, `Max-Age`, `Secure`,
    /// `HttpOnly`, `SameSite` — each omitted when not supplied.
    pub fn set_cookie(&mut self, name: &str, value: &str, attrs: &CookieAttrs) -> &mut Self {
        let mut out = format!("{name}={value}");
        out.push_str("; Path=");
        out.push_str(attrs.path.as_deref().unwrap_or("/"));
        if let Some(domain) = &attrs.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(max_age) = attrs.max_age {
            out.push_str("; Max-Age=");
            out.push_str(&max_age.to_string());
        }
        if attrs.secure {
            out.push_str("; Secure");
        }
        if attrs.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = &attrs.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site);
        }
        self.header("Set-Cookie", out)
    }

    /// Serializes this response to wire bytes: status line, headers (in
    /// registration order, duplicates preserved), a blank line, and the body. A
    /// built-in `Content-Length` is always appended (computed from the final body
    /// length) unless one was already set explicitly. When `discard_body` is set
    /// (HEAD requests), the body bytes themselves are omitted but `Content-Length`
    /// still reflects the size the body would have had.
    pub(crate) fn serialize(&self, discard_body: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(self.status.into_first_line());

        let has_content_length = self.get_header("content-length").is_some();
        let has_content_type = self.get_header("content-type").is_some();

        if !has_content_type {
            out.extend_from_slice(b"Content-Type: text/plain; charset=utf-8\r\n");
        }
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if !has_content_length {
            out.extend_from_slice(b"Content-Length: ");
            out.extend_from_slice(self.body.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        if !discard_body {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

/// `Set-Cookie` attributes for [`Response::set_cookie`]. All fields are optional;
/// `Path` defaults to `/` when unset.
#[derive(Debug, Clone, Default)]
pub struct CookieAttrs {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

/// Incremental body writer handed to [`Response::body_with`].
pub struct BodyWriter<'a>(&'a mut Vec<u8>);

impl BodyWriter<'_> {
    /// Appends content to the response body.
    #[inline]
    pub fn write<T: WriteBuffer>(&mut self, value: T) {
        value.write_to(self.0);
    }
}

impl std::io::Write for BodyWriter<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Trait for writing data directly into a [`Response`]'s header/body buffers.
/// Implemented for common types (strings, bytes, booleans, integers).
///
/// # Note on floating-point
/// Floating-point numbers are not implemented to avoid locale-dependent formatting
/// and precision issues in protocol headers; format to a string with controlled
/// precision first.
pub trait WriteBuffer {
    /// Writes the value's representation directly to the buffer.
    fn write_to(&self, buffer: &mut Vec<u8>);
}

macro_rules! impl_write_buffer {
    (bytes, $conn:expr => $($t:ty),*) => {
        $(impl WriteBuffer for $t {
            #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                let closure = $conn;
                closure(self, buffer);
            }
        })*
    };
    (number($type:ty), $conn:expr => $($t:ty),*) => {
        $(impl WriteBuffer for $t {
            #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                $conn(*self as $type, buffer);
            }
        })*
    };
}

impl<T: WriteBuffer> WriteBuffer for &T {
    #[inline]
    fn write_to(&self, buffer: &mut Vec<u8>) {
        T::write_to(*self, buffer);
    }
}

impl_write_buffer! {
    bytes, |value: &str, buffer: &mut Vec<u8>| {
        buffer.extend_from_slice(value.as_bytes());
    } => &str, String, Box<str>, Cow<'_, str>,
    Arc<str>, Rc<str>
}
impl_write_buffer! {
    bytes, |value: &[u8], buffer: &mut Vec<u8>| {
        buffer.extend_from_slice(value);
    } => &[u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>
}
impl_write_buffer! {
    number(u128), write_u128 => u8, u16, u32, u64, u128, usize
}
impl_write_buffer! {
    number(i128), write_i128 => i8, i16, i32, i64, i128, isize
}
impl WriteBuffer for bool {
    #[inline]
    fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(match self {
            true => b"true",
            false => b"false",
        });
    }
}

#[inline(always)]
fn write_u128(value: u128, buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(value.to_string().as_bytes());
}

#[inline(always)]
fn write_i128(value: i128, buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(value.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_ok() {
        let resp = Response::new();
        assert_eq!(resp.status_code(), StatusCode::Ok);
    }

    #[test]
    fn content_length_is_computed_from_body() {
        let mut resp = Response::new();
        resp.status(StatusCode::Ok).body("hello");
        let bytes = resp.serialize(false);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 5"));
        assert!(text.ends_with("hello"));
    }

    #[test]
    fn head_discards_body_but_keeps_content_length() {
        let mut resp = Response::new();
        resp.status(StatusCode::Ok).body("hello world");
        let bytes = resp.serialize(true);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 11"));
        assert!(!text.contains("hello world"));
    }

    #[test]
    fn duplicate_headers_are_preserved() {
        let mut resp = Response::new();
        resp.header("X-Trace", "a").header("X-Trace", "b");
        let count = resp.headers().iter().filter(|(k, _)| k == "X-Trace").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn set_cookie_defaults_path_to_root() {
        let mut resp = Response::new();
        resp.set_cookie("session", "abc", &CookieAttrs::default());
        assert_eq!(resp.get_header("set-cookie"), Some("session=abc; Path=/"));
    }

    #[test]
    fn set_cookie_orders_attributes() {
        let mut resp = Response::new();
        resp.set_cookie(
            "session",
            "abc",
            &CookieAttrs {
                domain: Some("example.com".into()),
                max_age: Some(3600),
                secure: true,
                http_only: true,
                same_site: Some("Strict".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            resp.get_header("set-cookie"),
            Some("session=abc; Path=/; Domain=example.com; Max-Age=3600; Secure; HttpOnly; SameSite=Strict")
        );
    }
}
