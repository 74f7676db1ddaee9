//! Error and result types for the diagnostic SMTP client

use std::{error::Error as StdError, fmt};

use crate::response::Code;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The protocol step that was in progress when an error occurred
///
/// Carried inside [`Error`] so a failure half-way through a session names
/// the exact exchange that broke instead of a generic connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Step {
    /// TCP connect and server greeting
    Connect,
    /// EHLO exchange
    Ehlo,
    /// STARTTLS command and TLS handshake
    StartTls,
    /// AUTH exchange
    Auth,
    /// MAIL FROM command
    MailFrom,
    /// RCPT TO command
    RcptTo,
    /// DATA command and message transfer
    Data,
    /// QUIT command
    Quit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Connect => "connect",
            Step::Ehlo => "EHLO",
            Step::StartTls => "STARTTLS",
            Step::Auth => "AUTH",
            Step::MailFrom => "MAIL FROM",
            Step::RcptTo => "RCPT TO",
            Step::Data => "DATA",
            Step::Quit => "QUIT",
        })
    }
}

/// The errors that may occur while probing an SMTP server
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    step: Option<Step>,
    code: Option<Code>,
    source: Option<BoxError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// The server refused the TCP connection
    ConnectionRefused,
    /// A network operation did not complete within the configured timeout
    Timeout,
    /// The server sent a syntactically invalid reply
    ProtocolViolation,
    /// `STARTTLS` was requested but the server does not advertise it
    StarttlsNotAdvertised,
    /// The TLS handshake did not complete
    HandshakeFailed,
    /// No advertised AUTH mechanism is usable with the given preference
    NoCompatibleMechanism,
    /// The server rejected the credentials
    AuthenticationFailed,
    /// Non-2xx reply to MAIL, RCPT or DATA
    TransactionRejected,
    /// The connection was closed by the peer or is no longer usable
    ConnectionClosed,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                step: None,
                code: None,
                source: source.map(Into::into),
            }),
        }
    }

    pub(crate) fn with_code(mut self, code: Code) -> Error {
        self.inner.code = Some(code);
        self
    }

    pub(crate) fn at(mut self, step: Step) -> Error {
        if self.inner.step.is_none() {
            self.inner.step = Some(step);
        }
        self
    }

    /// Returns true if the connection was refused
    pub fn is_connection_refused(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectionRefused)
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// Returns true if the server sent a malformed reply
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self.inner.kind, Kind::ProtocolViolation)
    }

    /// Returns true if STARTTLS was required but not advertised
    pub fn is_starttls_not_advertised(&self) -> bool {
        matches!(self.inner.kind, Kind::StarttlsNotAdvertised)
    }

    /// Returns true if the TLS handshake failed
    pub fn is_handshake_failed(&self) -> bool {
        matches!(self.inner.kind, Kind::HandshakeFailed)
    }

    /// Returns true if no compatible AUTH mechanism was advertised
    pub fn is_no_compatible_mechanism(&self) -> bool {
        matches!(self.inner.kind, Kind::NoCompatibleMechanism)
    }

    /// Returns true if the server rejected the credentials
    pub fn is_authentication_failed(&self) -> bool {
        matches!(self.inner.kind, Kind::AuthenticationFailed)
    }

    /// Returns true if MAIL, RCPT or DATA was rejected
    pub fn is_transaction_rejected(&self) -> bool {
        matches!(self.inner.kind, Kind::TransactionRejected)
    }

    /// Returns true if the connection was closed by the peer
    pub fn is_connection_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectionClosed)
    }

    /// The SMTP reply code, if the server sent one before the error surfaced
    ///
    /// Allows direct correlation with server-side logs.
    pub fn code(&self) -> Option<Code> {
        self.inner.code
    }

    /// The protocol step that failed, when known
    pub fn step(&self) -> Option<Step> {
        self.inner.step
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_probe::Error");

        builder.field("kind", &self.inner.kind);
        if let Some(step) = self.inner.step {
            builder.field("step", &step);
        }
        if let Some(code) = self.inner.code {
            builder.field("code", &code);
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::ConnectionRefused => f.write_str("connection refused")?,
            Kind::Timeout => f.write_str("operation timed out")?,
            Kind::ProtocolViolation => f.write_str("malformed server response")?,
            Kind::StarttlsNotAdvertised => f.write_str("STARTTLS not advertised by server")?,
            Kind::HandshakeFailed => f.write_str("TLS handshake failed")?,
            Kind::NoCompatibleMechanism => {
                f.write_str("no compatible authentication mechanism")?;
            }
            Kind::AuthenticationFailed => f.write_str("authentication failed")?,
            Kind::TransactionRejected => f.write_str("mail transaction rejected")?,
            Kind::ConnectionClosed => f.write_str("connection closed")?,
        }

        if let Some(step) = self.inner.step {
            write!(f, " during {step}")?;
        }
        if let Some(code) = self.inner.code {
            write!(f, " (reply code {code})")?;
        }
        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn protocol<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::ProtocolViolation, Some(e))
}

pub(crate) fn starttls_not_advertised() -> Error {
    Error::new(Kind::StarttlsNotAdvertised, None::<BoxError>)
}

pub(crate) fn handshake<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::HandshakeFailed, Some(e))
}

pub(crate) fn no_mechanism<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::NoCompatibleMechanism, Some(e))
}

pub(crate) fn auth<E: Into<BoxError>>(e: E, code: Code) -> Error {
    Error::new(Kind::AuthenticationFailed, Some(e)).with_code(code)
}

/// Authentication refused locally, before anything reached the server
pub(crate) fn auth_refused<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::AuthenticationFailed, Some(e))
}

pub(crate) fn rejected<E: Into<BoxError>>(e: E, code: Code) -> Error {
    Error::new(Kind::TransactionRejected, Some(e)).with_code(code)
}

pub(crate) fn closed<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::ConnectionClosed, Some(e))
}

/// Maps an i/o failure onto the taxonomy: refused connects and timeouts
/// keep their own kind, anything else counts as a closed connection since
/// the session cannot continue on it.
pub(crate) fn network(e: std::io::Error) -> Error {
    use std::io::ErrorKind;

    let kind = match e.kind() {
        ErrorKind::ConnectionRefused => Kind::ConnectionRefused,
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Kind::Timeout,
        _ => Kind::ConnectionClosed,
    };
    Error::new(kind, Some(e))
}
