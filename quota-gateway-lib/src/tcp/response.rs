#![forbid(unsafe_code)]

/// Reply written to a client whose message was refused by the limiter.
///
/// Sent verbatim whatever the client sent; the inbound bytes are never parsed.
pub const TOO_MANY_REQUESTS: &[u8] = b"HTTP/1.1 429 Too Many Requests\n\
Content-Type: text/plain\n\
\n\
Too many requests. Please try again later.\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_byte_exact() {
        let expected = concat!(
            "HTTP/1.1 429 Too Many Requests\n",
            "Content-Type: text/plain\n",
            "\n",
            "Too many requests. Please try again later.\n",
        );
        assert_eq!(TOO_MANY_REQUESTS, expected.as_bytes());
    }
}
