//! Construction of the outgoing diagnostic message
//!
//! The message body sent by `send_message` is deliberately minimal: the
//! headers a receiving MTA expects, in a fixed order, then the caller's
//! body text. Transparency (dot-stuffing) is applied by the client codec
//! at send time, not here.

use std::time::SystemTime;

use uuid::Uuid;

use crate::commands::sanitize;

/// Fallback Message-ID domain when the local hostname is unavailable
const DEFAULT_MESSAGE_ID_DOMAIN: &str = "localhost";

/// Builds the RFC 5322 message and returns it with its generated Message-ID
///
/// Headers appear in the order `Message-ID`, `Date`, `From`, `To`,
/// `Subject`, followed by an empty line and the body. Caller-supplied
/// fields are stripped of CR/LF before being embedded.
pub(crate) fn build_message(from: &str, to: &[String], subject: &str, body: &str) -> (String, String) {
    let message_id = generate_message_id();

    let to_header = to
        .iter()
        .map(|addr| sanitize(addr))
        .collect::<Vec<_>>()
        .join(", ");

    let mut message = String::with_capacity(body.len() + 256);
    message.push_str(&format!("Message-ID: {message_id}\r\n"));
    message.push_str(&format!("Date: {}\r\n", rfc2822_date(SystemTime::now())));
    message.push_str(&format!("From: {}\r\n", sanitize(from)));
    message.push_str(&format!("To: {to_header}\r\n"));
    message.push_str(&format!("Subject: {}\r\n", sanitize(subject)));
    message.push_str("\r\n");
    message.push_str(body);

    (message, message_id)
}

/// `<uuid@hostname>` per RFC 5322 §3.6.4
fn generate_message_id() -> String {
    let hostname = hostname::get()
        .map_err(|_| ())
        .and_then(|s| s.into_string().map_err(|_| ()))
        .unwrap_or_else(|_| DEFAULT_MESSAGE_ID_DOMAIN.to_owned());

    format!("<{}@{}>", Uuid::new_v4(), hostname)
}

/// Formats a `Date` header value
///
/// `httpdate` always appends ` GMT`, which is an obsolete zone form for
/// email, so it is rewritten to the numeric `-0000`.
fn rfc2822_date(time: SystemTime) -> String {
    let mut s = httpdate::fmt_http_date(time);
    if s.ends_with(" GMT") {
        s.truncate(s.len() - "GMT".len());
        s.push_str("-0000");
    }
    s
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_header_order() {
        let (message, message_id) = build_message(
            "probe@example.com",
            &["a@example.org".to_owned(), "b@example.org".to_owned()],
            "connectivity test",
            "hello\r\n",
        );

        let lines: Vec<&str> = message.split("\r\n").collect();
        assert!(lines[0].starts_with("Message-ID: <"));
        assert!(lines[1].starts_with("Date: "));
        assert_eq!(lines[2], "From: probe@example.com");
        assert_eq!(lines[3], "To: a@example.org, b@example.org");
        assert_eq!(lines[4], "Subject: connectivity test");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "hello");

        assert!(message_id.starts_with('<'));
        assert!(message_id.contains('@'));
        assert!(message_id.ends_with('>'));
        assert!(message.contains(&format!("Message-ID: {message_id}\r\n")));
    }

    #[test]
    fn test_date_uses_numeric_zone() {
        let date = rfc2822_date(UNIX_EPOCH + Duration::from_secs(784_111_777));
        assert_eq!(date, "Sun, 06 Nov 1994 08:49:37 -0000");
    }

    #[test]
    fn test_header_injection_stripped() {
        let (message, _) = build_message(
            "probe@example.com",
            &["victim@example.org\r\nBcc: hidden@example.org".to_owned()],
            "subject\r\nX-Injected: 1",
            "body",
        );
        assert!(!message.contains("Bcc:"));
        assert!(!message.contains("X-Injected"));
    }
}
