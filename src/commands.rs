//! SMTP commands

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::{
    authentication::{Credentials, Mechanism},
    error,
    extension::ClientId,
    response::Response,
    Error,
};

/// Drops bare CR and LF bytes from a caller-supplied field
///
/// Commands are CRLF-delimited, so a newline smuggled into a hostname or
/// address would let the field inject extra commands. Offending bytes are
/// removed rather than escaped; building a command never fails.
pub(crate) fn sanitize(field: &str) -> String {
    field.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", sanitize(&self.client_id.to_string()))
    }
}

impl Ehlo {
    /// Creates a EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: String,
    size: Option<u64>,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>", sanitize(&self.sender))?;
        if let Some(size) = self.size {
            write!(f, " SIZE={size}")?;
        }
        f.write_str("\r\n")
    }
}

impl Mail {
    /// Creates a MAIL command; an empty sender is the null reverse-path
    pub fn new(sender: impl Into<String>, size: Option<u64>) -> Mail {
        Mail {
            sender: sender.into(),
            size,
        }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: String,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", sanitize(&self.recipient))
    }
}

impl Rcpt {
    /// Creates an RCPT command
    pub fn new(recipient: impl Into<String>) -> Rcpt {
        Rcpt {
            recipient: recipient.into(),
        }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// NOOP command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Noop;

impl Display for Noop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("NOOP\r\n")
    }
}

/// RSET command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Rset;

impl Display for Rset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("RSET\r\n")
    }
}

/// AUTH command, covering both the initial line and challenge responses
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    mechanism: Mechanism,
    /// Payload before base64 framing, absent on a bare `AUTH <mech>` line
    response: Option<String>,
    /// True when rendering a continuation-line reply instead of `AUTH`
    is_continuation: bool,
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let encoded_response = self.response.as_ref().map(|r| BASE64.encode(r.as_bytes()));

        if self.is_continuation {
            // Response to a 334 challenge: bare base64 payload
            f.write_str(encoded_response.as_deref().unwrap_or(""))?;
        } else {
            match encoded_response {
                Some(response) => write!(f, "AUTH {} {}", self.mechanism, response)?,
                None => write!(f, "AUTH {}", self.mechanism)?,
            }
        }
        f.write_str("\r\n")
    }
}

impl Auth {
    /// Creates the initial AUTH command, inlining the response when the
    /// mechanism supports one
    pub fn new(mechanism: Mechanism, credentials: &Credentials) -> Result<Auth, Error> {
        let response = if mechanism.supports_initial_response() {
            Some(mechanism.response(credentials, None)?)
        } else {
            None
        };
        Ok(Auth {
            mechanism,
            response,
            is_continuation: false,
        })
    }

    /// Creates the reply to a 334 challenge response
    pub fn new_from_response(
        mechanism: Mechanism,
        credentials: &Credentials,
        response: &Response,
    ) -> Result<Auth, Error> {
        if !response.has_code(334) {
            return Err(error::protocol("expecting a challenge"));
        }

        let encoded_challenge = response.first_line().unwrap_or("").trim();
        let decoded_challenge = String::from_utf8(
            BASE64
                .decode(encoded_challenge)
                .map_err(error::protocol)?,
        )
        .map_err(error::protocol)?;
        tracing::debug!("auth decoded challenge: {}", decoded_challenge);

        let response = mechanism.response(credentials, Some(decoded_challenge.as_ref()))?;

        Ok(Auth {
            mechanism,
            response: Some(response),
            is_continuation: true,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_display() {
        let id = ClientId::Domain("localhost".to_owned());
        assert_eq!(format!("{}", Ehlo::new(id)), "EHLO localhost\r\n");
        assert_eq!(
            format!("{}", Mail::new("test@example.com", None)),
            "MAIL FROM:<test@example.com>\r\n"
        );
        assert_eq!(format!("{}", Mail::new("", None)), "MAIL FROM:<>\r\n");
        assert_eq!(
            format!("{}", Mail::new("test@example.com", Some(42))),
            "MAIL FROM:<test@example.com> SIZE=42\r\n"
        );
        assert_eq!(
            format!("{}", Rcpt::new("test@example.com")),
            "RCPT TO:<test@example.com>\r\n"
        );
        assert_eq!(format!("{Starttls}"), "STARTTLS\r\n");
        assert_eq!(format!("{Quit}"), "QUIT\r\n");
        assert_eq!(format!("{Data}"), "DATA\r\n");
        assert_eq!(format!("{Noop}"), "NOOP\r\n");
        assert_eq!(format!("{Rset}"), "RSET\r\n");
    }

    #[test]
    fn test_auth_display() {
        let credentials = Credentials::new("user@example.com".to_owned(), "secret".to_owned());
        assert_eq!(
            format!("{}", Auth::new(Mechanism::Plain, &credentials).unwrap()),
            "AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20Ac2VjcmV0\r\n"
        );
        assert_eq!(
            format!("{}", Auth::new(Mechanism::Login, &credentials).unwrap()),
            "AUTH LOGIN\r\n"
        );
        assert_eq!(
            format!("{}", Auth::new(Mechanism::CramMd5, &credentials).unwrap()),
            "AUTH CRAM-MD5\r\n"
        );
    }

    #[test]
    fn test_auth_challenge_roundtrip() {
        let credentials = Credentials::new("alice".to_owned(), "wonderland".to_owned());

        // "VXNlcm5hbWU6" is base64("Username:")
        let challenge = "334 VXNlcm5hbWU6\r\n".parse::<Response>().unwrap();
        let auth = Auth::new_from_response(Mechanism::Login, &credentials, &challenge).unwrap();
        // base64("alice")
        assert_eq!(format!("{auth}"), "YWxpY2U=\r\n");

        let not_challenge = "250 ok\r\n".parse::<Response>().unwrap();
        assert!(Auth::new_from_response(Mechanism::Login, &credentials, &not_challenge).is_err());
    }

    #[test]
    fn test_sanitize_strips_crlf() {
        assert_eq!(
            format!("{}", Rcpt::new("a@example.com\r\nRCPT TO:<b@example.com>")),
            "RCPT TO:<a@example.comRCPT TO:<b@example.com>>\r\n"
        );
        assert_eq!(
            format!("{}", Ehlo::new(ClientId::Domain("host\r\n".to_owned()))),
            "EHLO host\r\n"
        );
        assert_eq!(sanitize("no newlines"), "no newlines");
    }
}
