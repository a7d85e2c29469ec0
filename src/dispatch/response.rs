//! Framing-aware response parsing.
//!
//! # Responsibilities
//! - Read exactly one HTTP response from a pooled connection
//! - Frame the body by Content-Length or chunked transfer encoding
//! - Preserve header case, order, and repeated keys
//!
//! # Design Decisions
//! - Reading until the peer closes is forbidden: pooled connections are
//!   keep-alive and the peer never closes between requests. A response
//!   with neither framing header has an empty body.
//! - Head and body sizes are bounded; a response over budget is malformed

use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::dispatch::{DispatchError, ExchangeLimits};

/// Longest accepted chunk-size line, including extensions.
const MAX_CHUNK_SIZE_LINE: usize = 1024;

/// One parsed response from a dispatched request. Never mutated after
/// construction; `elapsed` is stamped by the dispatcher.
#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    /// Status code from the status line.
    pub status: u16,
    /// Headers in wire order; repeated keys kept as separate entries.
    pub headers: Vec<(String, String)>,
    /// Body bytes as framed by the response headers.
    pub body: Vec<u8>,
    /// Wall-clock duration of the whole exchange.
    pub elapsed: Duration,
}

impl ExchangeResponse {
    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read and parse exactly one response from `reader`.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    limits: &ExchangeLimits,
) -> Result<ExchangeResponse, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head_used = 0usize;

    let status_line = read_line(reader, limits.max_head_bytes, &mut head_used).await?;
    let status = parse_status_line(&status_line)?;

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let line = read_line(reader, limits.max_head_bytes, &mut head_used).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| DispatchError::Parse(format!("header without colon: {line:?}")))?;
        headers.push((name.to_string(), value.trim().to_string()));
    }

    let body = if is_chunked(&headers) {
        read_chunked_body(reader, limits).await?
    } else if let Some(length) = content_length(&headers)? {
        read_sized_body(reader, length, limits).await?
    } else {
        // No framing header: the body is empty. Draining the socket until
        // EOF would hang forever on a keep-alive connection.
        Vec::new()
    };

    Ok(ExchangeResponse {
        status,
        headers,
        body,
        elapsed: Duration::ZERO,
    })
}

/// Read one CRLF-terminated line, enforcing the cumulative head budget.
async fn read_line<R>(
    reader: &mut R,
    max_head_bytes: usize,
    used: &mut usize,
) -> Result<String, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader
        .read_until(b'\n', &mut line)
        .await
        .map_err(DispatchError::Read)?;
    if n == 0 || !line.ends_with(b"\n") {
        return Err(DispatchError::Parse(
            "unexpected end of stream in response head".into(),
        ));
    }

    *used += line.len();
    if *used > max_head_bytes {
        return Err(DispatchError::Parse("response head exceeds size limit".into()));
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| DispatchError::Parse("non-UTF-8 response head".into()))
}

fn parse_status_line(line: &str) -> Result<u16, DispatchError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(DispatchError::Parse(format!("bad status line: {line:?}")));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| DispatchError::Parse(format!("bad status code in: {line:?}")))
}

fn is_chunked(headers: &[(String, String)]) -> bool {
    headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("transfer-encoding")
            && value.to_ascii_lowercase().contains("chunked")
    })
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>, DispatchError> {
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-length") {
            let length = value
                .trim()
                .parse::<usize>()
                .map_err(|_| DispatchError::Parse(format!("bad Content-Length: {value:?}")))?;
            return Ok(Some(length));
        }
    }
    Ok(None)
}

async fn read_sized_body<R>(
    reader: &mut R,
    length: usize,
    limits: &ExchangeLimits,
) -> Result<Vec<u8>, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    if length > limits.max_body_bytes {
        return Err(DispatchError::Parse("response body exceeds size limit".into()));
    }
    let mut body = vec![0u8; length];
    read_exact_body(reader, &mut body).await?;
    Ok(body)
}

async fn read_chunked_body<R>(
    reader: &mut R,
    limits: &ExchangeLimits,
) -> Result<Vec<u8>, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut line_used = 0usize;
        let size_line = read_line(reader, MAX_CHUNK_SIZE_LINE, &mut line_used).await?;
        let size_field = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| DispatchError::Parse(format!("bad chunk size: {size_line:?}")))?;

        if size == 0 {
            // trailer section, up to the final empty line
            let mut trailer_used = 0usize;
            loop {
                let trailer = read_line(reader, limits.max_head_bytes, &mut trailer_used).await?;
                if trailer.is_empty() {
                    return Ok(body);
                }
            }
        }

        if body.len() + size > limits.max_body_bytes {
            return Err(DispatchError::Parse("response body exceeds size limit".into()));
        }
        let start = body.len();
        body.resize(start + size, 0);
        read_exact_body(reader, &mut body[start..]).await?;

        let mut crlf = [0u8; 2];
        read_exact_body(reader, &mut crlf).await?;
        if &crlf != b"\r\n" {
            return Err(DispatchError::Parse("chunk not terminated by CRLF".into()));
        }
    }
}

async fn read_exact_body<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    reader.read_exact(buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DispatchError::Parse("truncated response body".into())
        } else {
            DispatchError::Read(e)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(raw: &[u8]) -> Result<ExchangeResponse, DispatchError> {
        let mut reader = BufReader::new(raw);
        read_response(&mut reader, &ExchangeLimits::default()).await
    }

    #[tokio::test]
    async fn parses_content_length_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let resp = parse(raw).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.body, b"hello");
    }

    #[tokio::test]
    async fn preserves_repeated_headers_in_order() {
        let raw = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\n\r\n";
        let resp = parse(raw).await.unwrap();
        let cookies: Vec<&str> = resp
            .headers
            .iter()
            .filter(|(n, _)| n == "Set-Cookie")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn decodes_chunked_body_with_extension_and_trailer() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4;ext=1\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Sum: done\r\n\r\n";
        let resp = parse(raw).await.unwrap();
        assert_eq!(resp.body, b"Wikipedia");
    }

    #[tokio::test]
    async fn no_framing_header_means_empty_body() {
        // Bytes after the head must be left unread, not drained to EOF.
        let raw = b"HTTP/1.1 204 No Content\r\n\r\nleftover-for-next-response";
        let resp = parse(raw).await.unwrap();
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn rejects_malformed_status_line() {
        let raw = b"NOT-HTTP junk\r\n\r\n";
        assert!(matches!(parse(raw).await, Err(DispatchError::Parse(_))));
    }

    #[tokio::test]
    async fn rejects_truncated_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort";
        assert!(matches!(parse(raw).await, Err(DispatchError::Parse(_))));
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let mut limits = ExchangeLimits::default();
        limits.max_body_bytes = 4;
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let mut reader = BufReader::new(&raw[..]);
        assert!(matches!(
            read_response(&mut reader, &limits).await,
            Err(DispatchError::Parse(_))
        ));
    }
}
