//! The per-connection read loop: bounded reads, size-guarded framing, keep-alive,
//! and the translation from a parse/timeout failure to the exact bytes written back
//! (or the silent close) the wire calls for.

use crate::errors::ErrorKind;
use crate::http::request::{finish, find_header_terminator, parse_head, Request};
use crate::http::types::Method;
use crate::limits::{ConnLimits, ReqLimits};
use crate::router::Router;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Runs one accepted connection to completion: repeatedly reads a request, dispatches
/// it through `router`, writes the response, and decides whether to keep reading.
/// Returns once the connection closes (client hangup, timeout, parse failure, write
/// failure, or an explicit `Connection: close`).
pub(crate) async fn run(mut stream: TcpStream, router: Arc<Router>, conn_limits: ConnLimits, req_limits: ReqLimits) {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut is_first_request = true;

    loop {
        let timeout = if is_first_request { conn_limits.read_timeout } else { conn_limits.keep_alive_timeout };

        match read_request(&mut stream, &mut buf, &req_limits, timeout).await {
            ReadOutcome::Closed => break,
            ReadOutcome::TimedOut => {
                if is_first_request && buf.is_empty() {
                    let _ = conn_limits.write_bytes(&mut stream, ErrorKind::RequestTimeout.as_http()).await;
                }
                break;
            }
            ReadOutcome::Error(kind) => {
                if !kind.is_silent() {
                    let _ = conn_limits.write_bytes(&mut stream, kind.as_http()).await;
                }
                break;
            }
            ReadOutcome::Request(request, consumed) => {
                is_first_request = false;
                buf.drain(..consumed);

                let wants_close =
                    request.header("connection").is_some_and(|v| v.eq_ignore_ascii_case("close"));
                let is_head = request.method() == Method::Head;

                let mut response = router.dispatch(request).await;
                if wants_close {
                    response.header("Connection", "close");
                }

                let bytes = response.serialize(is_head);
                if conn_limits.write_bytes(&mut stream, &bytes).await.is_err() {
                    break;
                }

                if wants_close || response.wants_close() {
                    break;
                }
            }
        }
    }

    let _ = stream.shutdown().await;
}

enum ReadOutcome {
    Request(Request, usize),
    Closed,
    TimedOut,
    Error(ErrorKind),
}

/// Reads one request off `stream`, honoring `timeout` for the whole read (header
/// block plus body). `buf` carries over any bytes already buffered from a previous
/// pipelined request.
async fn read_request(
    stream: &mut TcpStream,
    buf: &mut Vec<u8>,
    limits: &ReqLimits,
    timeout: Duration,
) -> ReadOutcome {
    match tokio::time::timeout(timeout, read_one(stream, buf, limits)).await {
        Ok(RawOutcome::Request(req, consumed)) => ReadOutcome::Request(req, consumed),
        Ok(RawOutcome::PeerClosed) => ReadOutcome::Closed,
        Ok(RawOutcome::Error(e)) => ReadOutcome::Error(e),
        Err(_elapsed) => ReadOutcome::TimedOut,
    }
}

enum RawOutcome {
    Request(Request, usize),
    PeerClosed,
    Error(ErrorKind),
}

/// Reads in chunks of up to 4096 bytes until the header terminator appears (bounded
/// by `max_header_size`), then keeps reading until the body Content-Length is
/// satisfied (bounded by `max_body_size`, enforced inside [`parse_head`]).
async fn read_one(stream: &mut TcpStream, buf: &mut Vec<u8>, limits: &ReqLimits) -> RawOutcome {
    let mut chunk = [0u8; 4096];

    loop {
        if find_header_terminator(buf).is_some() {
            let head = match parse_head(buf, limits) {
                Ok(head) => head,
                Err(e) => return RawOutcome::Error(e),
            };

            let total_needed = head.header_block_len + head.content_length;
            while buf.len() < total_needed {
                match stream.read(&mut chunk).await {
                    Ok(0) => {
                        return RawOutcome::Error(ErrorKind::BodyMismatch {
                            expected: head.content_length,
                            available: buf.len().saturating_sub(head.header_block_len),
                        })
                    }
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    Err(e) => return RawOutcome::Error(e.into()),
                }
            }

            return match finish(head, buf) {
                Ok((request, consumed)) => RawOutcome::Request(request, consumed),
                Err(e) => RawOutcome::Error(e),
            };
        }

        if buf.len() > limits.max_header_size {
            return RawOutcome::Error(ErrorKind::HeaderTooLarge);
        }

        match stream.read(&mut chunk).await {
            Ok(0) => {
                return if buf.is_empty() { RawOutcome::PeerClosed } else { RawOutcome::Error(ErrorKind::InvalidUrl) }
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => return RawOutcome::Error(e.into()),
        }
    }
}

impl ConnLimits {
    /// Writes `bytes` to `stream`, bounded by [`ConnLimits::write_timeout`].
    pub(crate) async fn write_bytes(&self, stream: &mut TcpStream, bytes: &[u8]) -> Result<(), io::Error> {
        tokio::select! {
            biased;

            result = stream.write_all(bytes) => result,
            _ = sleep(self.write_timeout) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout"))
            },
        }
    }
}
