use std::{error, fmt, io};

/// Everything that can go wrong while reading and parsing one request off the wire.
///
/// Handler-level failures are not represented here; those are caught by the
/// `Recoverer` middleware (see [`crate::middleware`]) and turned into a 500 response
/// at the point they occur, never reaching the parser.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    InvalidMethod,
    InvalidUrl,
    PathTraversal,
    InvalidVersion,

    InvalidHeader,
    HeaderTooLarge,
    DuplicateContentLength,
    InvalidContentLength,

    BodyTooLarge,
    BodyMismatch { expected: usize, available: usize },

    RequestTimeout,
    ServiceUnavailable,
    Io(IoError),
}

impl ErrorKind {
    /// Oversize guards fire before a response can even be framed correctly (the
    /// client may still be mid-send); these close the socket without writing
    /// anything back.
    pub(crate) fn is_silent(&self) -> bool {
        matches!(self, ErrorKind::HeaderTooLarge | ErrorKind::BodyTooLarge | ErrorKind::Io(_))
    }
}

/// Expands to `ErrorKind::as_http`, matching each variant to a canned, allocation-free
/// byte response with a pre-measured `Content-Length`. Each arm spells out its own
/// length literal rather than computing it, since `concat!` cannot do arithmetic on
/// its own output.
macro_rules! http_errors {
    ($($variant:pat => $status:literal $reason:literal, $len:literal, $body:literal;)+) => {
        impl ErrorKind {
            /// A complete `HTTP/1.1` response for this error: status line, headers,
            /// blank line, JSON body. Always closes the connection.
            pub(crate) const fn as_http(&self) -> &'static [u8] {
                match self {
                    $($variant => concat!(
                        "HTTP/1.1 ", $status, " ", $reason, "\r\n",
                        "Content-Type: application/json\r\n",
                        "Content-Length: ", $len, "\r\n",
                        "Connection: close\r\n\r\n",
                        $body,
                    ).as_bytes(),)+
                }
            }
        }
    };
}

http_errors! {
    ErrorKind::InvalidMethod =>
        "400" "Bad Request", "41", "{\"error\":\"invalid method\",\"code\":\"PARSE\"}";
    ErrorKind::InvalidUrl =>
        "400" "Bad Request", "41", "{\"error\":\"invalid target\",\"code\":\"PARSE\"}";
    ErrorKind::PathTraversal =>
        "400" "Bad Request", "41", "{\"error\":\"path traversal\",\"code\":\"PARSE\"}";
    ErrorKind::InvalidVersion =>
        "400" "Bad Request", "43", "{\"error\":\"bad request-line\",\"code\":\"PARSE\"}";
    ErrorKind::InvalidHeader =>
        "400" "Bad Request", "43", "{\"error\":\"malformed header\",\"code\":\"PARSE\"}";
    ErrorKind::DuplicateContentLength =>
        "400" "Bad Request", "51", "{\"error\":\"duplicate content-length\",\"code\":\"PARSE\"}";
    ErrorKind::InvalidContentLength =>
        "400" "Bad Request", "45", "{\"error\":\"bad content-length\",\"code\":\"PARSE\"}";
    ErrorKind::BodyMismatch { .. } =>
        "400" "Bad Request", "37", "{\"error\":\"short body\",\"code\":\"PARSE\"}";
    ErrorKind::RequestTimeout =>
        "408" "Request Timeout", "44", "{\"error\":\"request timeout\",\"code\":\"TIMEOUT\"}";
    ErrorKind::ServiceUnavailable =>
        "503" "Service Unavailable", "46", "{\"error\":\"too many connections\",\"code\":\"BUSY\"}";
    ErrorKind::HeaderTooLarge =>
        "400" "Bad Request", "43", "{\"error\":\"header too large\",\"code\":\"PARSE\"}";
    ErrorKind::BodyTooLarge =>
        "413" "Payload Too Large", "41", "{\"error\":\"body too large\",\"code\":\"PARSE\"}";
    ErrorKind::Io(_) =>
        "400" "Bad Request", "37", "{\"error\":\"io failure\",\"code\":\"PARSE\"}";
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidMethod => write!(f, "invalid method"),
            ErrorKind::InvalidUrl => write!(f, "invalid request target"),
            ErrorKind::PathTraversal => write!(f, "path traversal rejected"),
            ErrorKind::InvalidVersion => write!(f, "missing http version"),
            ErrorKind::InvalidHeader => write!(f, "malformed header line"),
            ErrorKind::HeaderTooLarge => write!(f, "header block too large"),
            ErrorKind::DuplicateContentLength => write!(f, "duplicate content-length"),
            ErrorKind::InvalidContentLength => write!(f, "invalid content-length"),
            ErrorKind::BodyTooLarge => write!(f, "body too large"),
            ErrorKind::BodyMismatch { expected, available } => {
                write!(f, "body mismatch: expected {expected}, have {available}")
            }
            ErrorKind::RequestTimeout => write!(f, "no request received before the read deadline"),
            ErrorKind::ServiceUnavailable => write!(f, "connection limit reached"),
            ErrorKind::Io(e) => write!(f, "io error: {}", e.0),
        }
    }
}

impl error::Error for ErrorKind {}

/// Thin wrapper around [`io::Error`] so `ErrorKind` can derive `PartialEq`
/// (`io::Error` itself doesn't implement it).
#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> Self {
        ErrorKind::Io(IoError(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_responses_have_correct_content_length() {
        for kind in [
            ErrorKind::InvalidMethod,
            ErrorKind::InvalidUrl,
            ErrorKind::PathTraversal,
            ErrorKind::InvalidVersion,
            ErrorKind::InvalidHeader,
            ErrorKind::DuplicateContentLength,
            ErrorKind::InvalidContentLength,
            ErrorKind::BodyMismatch { expected: 1, available: 0 },
            ErrorKind::RequestTimeout,
            ErrorKind::ServiceUnavailable,
            ErrorKind::HeaderTooLarge,
            ErrorKind::BodyTooLarge,
        ] {
            let resp = kind.as_http();
            let text = std::str::from_utf8(resp).unwrap();
            let declared: usize = text
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .unwrap()
                .trim()
                .parse()
                .unwrap();
            let body = text.rsplit("\r\n\r\n").next().unwrap();
            assert_eq!(declared, body.len(), "mismatch for {kind}");
        }
    }
}
