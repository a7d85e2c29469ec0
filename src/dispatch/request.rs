//! Raw request assembly.
//!
//! # Responsibilities
//! - Hold one immutable synthetic request (method, target, headers, body)
//! - Serialize it to the exact byte stream written to a pooled connection
//!
//! # Design Decisions
//! - Assembly is deterministic and pure: no I/O, no clock, no allocator
//!   tricks; the same request always yields the same bytes
//! - Header names and values are emitted exactly as received, in order

/// A synthetic request to dispatch over a pooled connection. Immutable
/// once constructed.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// HTTP method, e.g. "POST".
    pub method: String,
    /// Value for the `Host` header.
    pub host: String,
    /// Request path; an empty path is emitted as "/".
    pub path: String,
    /// Query string without the leading '?'; empty means none.
    pub query: String,
    /// Caller-supplied headers, case and order preserved.
    pub headers: Vec<(String, String)>,
    /// Body bytes; `Content-Length` is computed from this.
    pub body: Vec<u8>,
}

impl PendingRequest {
    /// Serialize to the raw bytes written to the wire: request line,
    /// `Host`, `Content-Length`, caller headers, blank line, body.
    pub fn build_raw(&self) -> Vec<u8> {
        let path = if self.path.is_empty() { "/" } else { &self.path };

        let mut head = format!("{} {}", self.method, path);
        if !self.query.is_empty() {
            head.push('?');
            head.push_str(&self.query);
        }
        head.push_str(" HTTP/1.1\r\n");
        head.push_str(&format!("Host: {}\r\n", self.host));
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(&self.body);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exact_wire_bytes() {
        let request = PendingRequest {
            method: "POST".into(),
            host: "example.com:8080".into(),
            path: "/api/v1".into(),
            query: "limit=2".into(),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("X-Trace".into(), "abc".into()),
            ],
            body: b"{\"k\":1}".to_vec(),
        };

        let raw = request.build_raw();
        let expected = "POST /api/v1?limit=2 HTTP/1.1\r\n\
                        Host: example.com:8080\r\n\
                        Content-Length: 7\r\n\
                        Content-Type: application/json\r\n\
                        X-Trace: abc\r\n\
                        \r\n\
                        {\"k\":1}";
        assert_eq!(raw, expected.as_bytes());
    }

    #[test]
    fn empty_path_becomes_root_and_query_is_omitted() {
        let request = PendingRequest {
            method: "GET".into(),
            host: "example.com".into(),
            path: String::new(),
            query: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
        };

        let raw = String::from_utf8(request.build_raw()).unwrap();
        assert!(raw.starts_with("GET / HTTP/1.1\r\n"));
        assert!(raw.contains("Content-Length: 0\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn build_is_deterministic() {
        let request = PendingRequest {
            method: "PUT".into(),
            host: "h".into(),
            path: "/p".into(),
            query: "q=1".into(),
            headers: vec![("A".into(), "b".into())],
            body: vec![1, 2, 3],
        };
        assert_eq!(request.build_raw(), request.build_raw());
    }
}
