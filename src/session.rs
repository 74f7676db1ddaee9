//! The SMTP session state machine
//!
//! [`SmtpSession`] owns a connection from greeting to QUIT. It tracks the
//! advertised capability view, upgrades the transport in place on STARTTLS,
//! runs SASL exchanges and drives a full mail transaction, tagging every
//! failure with the protocol step it happened at.

use std::{
    fmt::Display,
    io::{BufRead, BufReader, Write},
    net::{Shutdown, ToSocketAddrs},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{
    authentication::{select_mechanism, Credentials, Mechanism},
    client::{escape_crlf, ClientCodec, NetworkStream, TlsParameters, TlsVersion},
    commands::{Auth, Data, Ehlo, Mail, Noop, Quit, Rcpt, Starttls},
    diagnostics::{self, TlsReport, VerificationStatus, Warning, WarningCategory, WarningSeverity},
    error,
    error::{Kind, Step},
    exchange::{self, ExchangeReport},
    extension::{CapabilitySet, ClientId},
    message::build_message,
    response::{parse_response, Code, Response},
    Error,
};

/// Most 334 challenges tolerated in one AUTH exchange
const MAX_AUTH_CHALLENGES: usize = 10;

/// Where a session currently stands in the protocol sequence
///
/// Transitions are monotonic except that `Greeted` is re-entered from
/// `TlsActive` by the post-STARTTLS EHLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and greeted by the server, EHLO not yet exchanged
    Connected,
    /// EHLO exchanged, capability view current
    Greeted,
    /// TLS handshake completed, re-EHLO pending
    TlsActive,
    /// AUTH accepted
    Authenticated,
    /// MAIL accepted, transaction open
    InTransaction,
    /// Connection closed
    Closed,
}

/// Outcome of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// The mechanism that was actually used
    pub mechanism: Mechanism,
    /// The server's final reply code, normally 235
    pub code: Code,
    /// Text of the server's final reply
    pub server_message: String,
}

/// A live SMTP session
#[derive(Debug)]
pub struct SmtpSession {
    stream: BufReader<NetworkStream>,
    client_id: ClientId,
    banner: Response,
    capabilities: CapabilitySet,
    state: SessionState,
    allow_cleartext_auth: bool,
    closed: bool,
    close_cause: Option<Kind>,
}

impl SmtpSession {
    /// Connects to the server, reads the greeting and performs the EHLO
    /// handshake
    ///
    /// The timeout applies to the connect itself and to every subsequent
    /// read and write.
    pub fn connect<A: ToSocketAddrs>(
        server: A,
        timeout: Option<Duration>,
        client_id: &ClientId,
    ) -> Result<SmtpSession, Error> {
        let mut stream =
            NetworkStream::connect(server, timeout).map_err(|e| e.at(Step::Connect))?;
        stream
            .set_read_timeout(timeout)
            .and_then(|()| stream.set_write_timeout(timeout))
            .map_err(|e| error::network(e).at(Step::Connect))?;
        if let Ok(peer) = stream.peer_addr() {
            tracing::debug!("connecting to {}", peer);
        }
        Self::handshake(stream, client_id.clone())
    }

    /// Builds a session over an already connected stream
    pub(crate) fn handshake(
        stream: NetworkStream,
        client_id: ClientId,
    ) -> Result<SmtpSession, Error> {
        let mut stream = BufReader::new(stream);

        let banner = read_response_on(&mut stream).map_err(|e| e.at(Step::Connect))?;
        if !banner.has_code(220) {
            return Err(error::protocol("expected a 220 service ready greeting")
                .with_code(banner.code())
                .at(Step::Connect));
        }

        let mut session = SmtpSession {
            stream,
            client_id,
            banner,
            capabilities: CapabilitySet::default(),
            state: SessionState::Connected,
            allow_cleartext_auth: false,
            closed: false,
            close_cause: None,
        };
        session.ehlo()?;
        Ok(session)
    }

    /// Allows AUTH over an unencrypted connection even when the server
    /// offers STARTTLS
    ///
    /// Off by default: sending credentials in the clear past an available
    /// upgrade is almost always a mistake.
    pub fn set_allow_cleartext_auth(&mut self, allow: bool) {
        self.allow_cleartext_auth = allow;
    }

    /// The greeting the server opened the connection with
    pub fn banner(&self) -> String {
        self.banner.message_joined()
    }

    /// The capability view from the most recent EHLO
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Where the session currently stands
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the transport has been upgraded to TLS
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Whether a STARTTLS upgrade is currently possible
    pub fn can_starttls(&self) -> bool {
        !self.is_encrypted() && self.capabilities.has("STARTTLS")
    }

    /// Sends EHLO and replaces the capability view with the response
    ///
    /// The previous view is discarded wholesale, never merged, so nothing
    /// advertised before a STARTTLS upgrade leaks past it.
    pub fn ehlo(&mut self) -> Result<&CapabilitySet, Error> {
        let response = self
            .command(Ehlo::new(self.client_id.clone()))
            .map_err(|e| e.at(Step::Ehlo))?;
        if !response.is_positive() {
            return Err(error::protocol("EHLO was not accepted")
                .with_code(response.code())
                .at(Step::Ehlo));
        }
        self.capabilities =
            CapabilitySet::from_response(&response).map_err(|e| e.at(Step::Ehlo))?;
        self.state = SessionState::Greeted;
        tracing::debug!("connected to {}", self.capabilities);
        Ok(&self.capabilities)
    }

    /// Upgrades the connection to TLS via STARTTLS and reports on the result
    ///
    /// Nothing is written when the server did not advertise STARTTLS. On
    /// success the session re-issues EHLO and the capability view is
    /// replaced with the encrypted one.
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<TlsReport, Error> {
        if self.is_encrypted() {
            return Err(error::protocol("connection is already encrypted").at(Step::StartTls));
        }
        if !self.capabilities.has("STARTTLS") {
            return Err(error::starttls_not_advertised().at(Step::StartTls));
        }

        let response = self.command(Starttls).map_err(|e| e.at(Step::StartTls))?;
        if !response.has_code(220) {
            return Err(error::protocol("server refused to start TLS")
                .with_code(response.code())
                .at(Step::StartTls));
        }

        self.stream
            .get_mut()
            .upgrade_tls(tls_parameters)
            .map_err(|e| e.at(Step::StartTls))?;
        self.state = SessionState::TlsActive;

        let report = self.tls_report(tls_parameters)?;
        self.ehlo()?;
        Ok(report)
    }

    fn tls_report(&self, tls_parameters: &TlsParameters) -> Result<TlsReport, Error> {
        let stream = self.stream.get_ref();
        let (protocol, suite) = stream
            .tls_negotiation()
            .ok_or_else(|| error::handshake("negotiated parameters unavailable"))
            .map_err(|e| e.at(Step::StartTls))?;
        let version = TlsVersion::from_protocol(protocol).unwrap_or(TlsVersion::Tlsv10);
        let cipher_suite = format!("{:?}", suite.suite());
        let chain = stream.peer_certificates().unwrap_or_default();

        // A strict handshake only completes against a trusted chain. With
        // verification skipped the capturing verifier holds the verdict.
        let outcome = tls_parameters.verify_outcome().filter(|o| o.checked);
        let trusted = if tls_parameters.skip_verify() {
            outcome.map(|o| o.trusted)
        } else {
            Some(true)
        };

        let mut report = diagnostics::analyze(
            version,
            cipher_suite,
            &chain,
            tls_parameters.domain(),
            unix_now(),
            trusted,
        );

        // The webpki name check catches cases the report's own matcher
        // cannot, such as IP-address names
        if let Some(outcome) = outcome {
            if !outcome.hostname_ok && report.verification == VerificationStatus::Valid {
                report.verification = VerificationStatus::HostnameMismatch;
                report.warnings.push(Warning {
                    category: WarningCategory::Hostname,
                    severity: WarningSeverity::Warning,
                    message: format!(
                        "certificate does not cover {}",
                        tls_parameters.domain()
                    ),
                });
            }
        }

        Ok(report)
    }

    /// Authenticates with the server
    ///
    /// Picks the strongest advertised mechanism unless one is requested
    /// explicitly. Refuses to send credentials in the clear while a
    /// STARTTLS upgrade is available, unless
    /// [`set_allow_cleartext_auth`][Self::set_allow_cleartext_auth] was
    /// used.
    pub fn authenticate(
        &mut self,
        credentials: &Credentials,
        requested: Option<Mechanism>,
    ) -> Result<AuthResult, Error> {
        let mechanism = select_mechanism(&self.capabilities, requested)
            .map_err(|e| e.at(Step::Auth))?;

        if self.can_starttls() && !self.allow_cleartext_auth {
            return Err(error::auth_refused(
                "refusing cleartext authentication while STARTTLS is available",
            )
            .at(Step::Auth));
        }

        let initial = Auth::new(mechanism, credentials).map_err(|e| e.at(Step::Auth))?;
        self.write_command(&initial.to_string(), &format!("AUTH {mechanism} *"))
            .map_err(|e| e.at(Step::Auth))?;
        let mut response = self.read_response().map_err(|e| e.at(Step::Auth))?;

        let mut challenges = 0;
        while response.has_code(334) {
            challenges += 1;
            if challenges > MAX_AUTH_CHALLENGES {
                return Err(error::protocol("too many authentication challenges")
                    .at(Step::Auth));
            }
            let reply = Auth::new_from_response(mechanism, credentials, &response)
                .map_err(|e| e.at(Step::Auth))?;
            self.write_command(&reply.to_string(), "*")
                .map_err(|e| e.at(Step::Auth))?;
            response = self.read_response().map_err(|e| e.at(Step::Auth))?;
        }

        if response.has_code(235) {
            tracing::debug!("authenticated via {}", mechanism);
            self.state = SessionState::Authenticated;
            Ok(AuthResult {
                mechanism,
                code: response.code(),
                server_message: response.message_joined(),
            })
        } else {
            Err(error::auth(response.message_joined(), response.code()).at(Step::Auth))
        }
    }

    /// Runs a full mail transaction and returns the final reply code along
    /// with the generated Message-ID
    ///
    /// The message is built from the given envelope fields with
    /// transparency (dot-stuffing) applied on the wire.
    pub fn send_message(
        &mut self,
        from: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(Code, String), Error> {
        if to.is_empty() {
            return Err(error::protocol("at least one recipient is required")
                .at(Step::RcptTo));
        }

        let (message, message_id) = build_message(from, to, subject, body);
        let size = self
            .capabilities
            .has("SIZE")
            .then(|| message.len() as u64);

        let entry_state = self.state;
        let response = self
            .command(Mail::new(from, size))
            .map_err(|e| e.at(Step::MailFrom))?;
        if !response.is_positive() {
            return Err(error::rejected(response.message_joined(), response.code())
                .at(Step::MailFrom));
        }
        self.state = SessionState::InTransaction;

        for recipient in to {
            let response = self
                .command(Rcpt::new(recipient.as_str()))
                .map_err(|e| e.at(Step::RcptTo))?;
            if !response.is_positive() {
                return Err(error::rejected(response.message_joined(), response.code())
                    .at(Step::RcptTo));
            }
        }

        let response = self.command(Data).map_err(|e| e.at(Step::Data))?;
        if !response.has_code(354) {
            return Err(error::rejected(response.message_joined(), response.code())
                .at(Step::Data));
        }

        let mut wire = Vec::with_capacity(message.len() + 8);
        let mut codec = ClientCodec::new();
        codec.encode(message.as_bytes(), &mut wire);
        wire.extend_from_slice(b"\r\n.\r\n");
        self.stream
            .get_mut()
            .write_all(&wire)
            .and_then(|()| self.stream.get_mut().flush())
            .map_err(|e| error::network(e).at(Step::Data))?;
        tracing::debug!("wrote {} message bytes", wire.len());

        let response = self.read_response().map_err(|e| e.at(Step::Data))?;
        if response.is_positive() {
            self.state = entry_state;
            Ok((response.code(), message_id))
        } else {
            Err(error::rejected(response.message_joined(), response.code()).at(Step::Data))
        }
    }

    /// Detects Microsoft Exchange from the greeting and capability view
    pub fn exchange_report(&self) -> ExchangeReport {
        exchange::detect(&self.banner(), &self.capabilities)
    }

    /// Sends NOOP and reports whether the server still answers
    pub fn test_connected(&mut self) -> bool {
        match self.command(Noop) {
            Ok(response) => response.is_positive(),
            Err(_) => false,
        }
    }

    /// Ends the session cleanly with QUIT and closes the connection
    pub fn quit(&mut self) -> Result<Response, Error> {
        let response = self.command(Quit).map_err(|e| e.at(Step::Quit))?;
        self.close();
        Ok(response)
    }

    /// Closes the connection
    ///
    /// Safe to call any number of times; later calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            let _ = self.stream.get_ref().shutdown(Shutdown::Both);
            self.closed = true;
            self.state = SessionState::Closed;
        }
    }

    /// Sends a command and reads the reply
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        let string = command.to_string();
        self.write_command(&string, &escape_crlf(&string))?;
        self.read_response()
    }

    fn write_command(&mut self, command: &str, log_as: &str) -> Result<(), Error> {
        if self.closed {
            return Err(self.closed_error());
        }
        self.stream
            .get_mut()
            .write_all(command.as_bytes())
            .and_then(|()| self.stream.get_mut().flush())
            .map_err(error::network)?;
        tracing::debug!("Wrote: {}", log_as);
        Ok(())
    }

    /// Reads one full, possibly multi-line, reply
    ///
    /// A timeout or peer hangup leaves the session closed; there is no
    /// safe way to resynchronize a reply stream after either.
    pub fn read_response(&mut self) -> Result<Response, Error> {
        if self.closed {
            return Err(self.closed_error());
        }
        let result = read_response_on(&mut self.stream);
        if let Err(ref err) = result {
            if err.is_timeout() {
                self.close_cause = Some(Kind::Timeout);
                self.close();
            } else if err.is_connection_closed() {
                self.close();
            }
        }
        result
    }

    /// The error a closed session keeps returning
    ///
    /// A session closed by a timeout reports the timeout on every later
    /// call, so the original cause stays visible instead of a generic
    /// closed-connection error.
    fn closed_error(&self) -> Error {
        match self.close_cause {
            Some(kind) => Error::new(kind, Some("session was closed by this failure")),
            None => error::closed("session has been closed"),
        }
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort only; never wait for the reply while dropping
            let _ = self.stream.get_mut().write_all(Quit.to_string().as_bytes());
            let _ = self.stream.get_mut().flush();
        }
        self.close();
    }
}

fn read_response_on(stream: &mut BufReader<NetworkStream>) -> Result<Response, Error> {
    let mut buffer = String::with_capacity(100);

    loop {
        let read = stream.read_line(&mut buffer).map_err(error::network)?;
        if read == 0 {
            return Err(error::closed("connection closed before a full reply"));
        }
        tracing::debug!("<< {}", escape_crlf(&buffer));
        match parse_response(&buffer) {
            Ok((_remaining, response)) => return Ok(response),
            Err(nom::Err::Incomplete(_)) => {
                // Multi-line reply, keep reading
            }
            Err(nom::Err::Failure(_)) | Err(nom::Err::Error(_)) => {
                return Err(error::protocol(format!(
                    "unparseable reply: {}",
                    escape_crlf(&buffer)
                )));
            }
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::client::MockStream;

    const GREETING: &[u8] = b"220 mail.example.com ESMTP ready\r\n";

    fn session_over(replies: &[u8]) -> (SmtpSession, MockStream) {
        let mock = MockStream::with_replies(replies);
        let session = SmtpSession::handshake(
            NetworkStream::Mock(mock.clone()),
            ClientId::Domain("localhost".to_owned()),
        )
        .unwrap();
        (session, mock)
    }

    fn plain_ehlo() -> Vec<u8> {
        let mut replies = GREETING.to_vec();
        replies.extend_from_slice(
            b"250-mail.example.com greets you\r\n\
              250-PIPELINING\r\n\
              250-SIZE 35882577\r\n\
              250-AUTH PLAIN LOGIN\r\n\
              250 8BITMIME\r\n",
        );
        replies
    }

    #[test]
    fn test_handshake_reads_banner_and_capabilities() {
        let (session, mock) = session_over(&plain_ehlo());
        assert_eq!(session.banner(), "mail.example.com ESMTP ready");
        assert_eq!(session.capabilities().server_name(), "mail.example.com");
        assert!(session.capabilities().has("pipelining"));
        assert_eq!(session.capabilities().size_limit(), Some(35_882_577));
        assert_eq!(session.state(), SessionState::Greeted);
        assert_eq!(mock.written(), b"EHLO localhost\r\n");
    }

    #[test]
    fn test_handshake_rejects_non_220_greeting() {
        let mock = MockStream::with_replies(b"554 go away\r\n");
        let err = SmtpSession::handshake(
            NetworkStream::Mock(mock.clone()),
            ClientId::Domain("localhost".to_owned()),
        )
        .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(err.step(), Some(Step::Connect));
        // Nothing was sent to a server that refused us
        assert_eq!(mock.written(), b"");
    }

    #[test]
    fn test_upgrade_refused_when_starttls_not_advertised() {
        let (mut session, mock) = session_over(&plain_ehlo());
        mock.written(); // drain the handshake

        let tls = TlsParameters::new("mail.example.com".to_owned()).unwrap();
        let err = session.upgrade_tls(&tls).unwrap_err();
        assert!(err.is_starttls_not_advertised());
        assert_eq!(err.step(), Some(Step::StartTls));
        // STARTTLS must not have been written
        assert_eq!(mock.written(), b"");
    }

    #[test]
    fn test_ehlo_replaces_capabilities() {
        let (mut session, _mock) = session_over(&plain_ehlo());
        assert!(session.capabilities().has("PIPELINING"));

        // A later EHLO advertises a different set; nothing old survives
        let mock = match session.stream.get_ref() {
            NetworkStream::Mock(m) => m.clone(),
            _ => unreachable!(),
        };
        mock.push_replies(
            b"250-mail.example.com greets you\r\n\
              250-AUTH PLAIN LOGIN CRAM-MD5\r\n\
              250 8BITMIME\r\n",
        );
        session.ehlo().unwrap();
        assert!(!session.capabilities().has("PIPELINING"));
        assert!(!session.capabilities().has("SIZE"));
        assert!(session.capabilities().supports_auth(Mechanism::CramMd5));
    }

    #[test]
    fn test_authenticate_plain() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(b"235 2.7.0 Authentication successful\r\n");
        let (mut session, mock) = session_over(&replies);
        mock.written();

        let credentials = Credentials::new("user@example.com".into(), "secret".into());
        let result = session
            .authenticate(&credentials, Some(Mechanism::Plain))
            .unwrap();
        assert_eq!(result.mechanism, Mechanism::Plain);
        assert_eq!(u16::from(result.code), 235);
        assert_eq!(result.server_message, "2.7.0 Authentication successful");
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(
            mock.written(),
            b"AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20Ac2VjcmV0\r\n"
        );
    }

    #[test]
    fn test_authenticate_login_challenges() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(
            b"334 VXNlcm5hbWU6\r\n\
              334 UGFzc3dvcmQ6\r\n\
              235 2.7.0 Authentication successful\r\n",
        );
        let (mut session, mock) = session_over(&replies);
        mock.written();

        let credentials = Credentials::new("alice".into(), "wonderland".into());
        let result = session
            .authenticate(&credentials, Some(Mechanism::Login))
            .unwrap();
        assert_eq!(result.mechanism, Mechanism::Login);
        assert_eq!(
            mock.written(),
            b"AUTH LOGIN\r\nYWxpY2U=\r\nd29uZGVybGFuZA==\r\n"
        );
    }

    #[test]
    fn test_authenticate_failure_carries_code() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(b"535 5.7.8 Authentication credentials invalid\r\n");
        let (mut session, _mock) = session_over(&replies);

        let credentials = Credentials::new("user".into(), "wrong".into());
        let err = session.authenticate(&credentials, None).unwrap_err();
        assert!(err.is_authentication_failed());
        assert_eq!(err.code().map(u16::from), Some(535));
        assert_eq!(err.step(), Some(Step::Auth));
    }

    #[test]
    fn test_cleartext_auth_refused_when_starttls_available() {
        let mut replies = GREETING.to_vec();
        replies.extend_from_slice(
            b"250-mail.example.com greets you\r\n\
              250-STARTTLS\r\n\
              250 AUTH PLAIN LOGIN\r\n",
        );
        let (mut session, mock) = session_over(&replies);
        mock.written();

        let credentials = Credentials::new("user".into(), "secret".into());
        let err = session
            .authenticate(&credentials, Some(Mechanism::Plain))
            .unwrap_err();
        assert!(err.is_authentication_failed());
        // The credentials never went on the wire
        assert_eq!(mock.written(), b"");

        session.set_allow_cleartext_auth(true);
        mock.push_replies(b"235 ok\r\n");
        session
            .authenticate(&credentials, Some(Mechanism::Plain))
            .unwrap();
        assert!(mock.written().starts_with(b"AUTH PLAIN "));
    }

    #[test]
    fn test_send_message_transaction() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(
            b"250 sender ok\r\n\
              250 recipient ok\r\n\
              354 go ahead\r\n\
              250 2.0.0 queued as 12345\r\n",
        );
        let (mut session, mock) = session_over(&replies);
        mock.written();

        let (code, message_id) = session
            .send_message(
                "probe@example.com",
                &["postmaster@example.com".to_owned()],
                "connectivity check",
                "test body\r\n",
            )
            .unwrap();
        assert_eq!(u16::from(code), 250);
        assert!(message_id.starts_with('<') && message_id.ends_with('>'));
        assert_eq!(session.state(), SessionState::Greeted);

        let written = mock.written();
        let written = std::str::from_utf8(&written).unwrap();
        assert!(written.starts_with("MAIL FROM:<probe@example.com> SIZE="));
        assert!(written.contains("RCPT TO:<postmaster@example.com>\r\n"));
        assert!(written.contains("DATA\r\n"));
        assert!(written.contains(&format!("Message-ID: {message_id}\r\n")));
        assert!(written.ends_with("test body\r\n\r\n.\r\n"));
    }

    #[test]
    fn test_send_message_rcpt_rejected() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(
            b"250 sender ok\r\n\
              550 5.1.1 mailbox unavailable\r\n",
        );
        let (mut session, _mock) = session_over(&replies);

        let err = session
            .send_message(
                "probe@example.com",
                &["nobody@example.com".to_owned()],
                "subject",
                "body",
            )
            .unwrap_err();
        assert!(err.is_transaction_rejected());
        assert_eq!(err.step(), Some(Step::RcptTo));
        assert_eq!(err.code().map(u16::from), Some(550));
    }

    #[test]
    fn test_send_message_requires_recipients() {
        let (mut session, mock) = session_over(&plain_ehlo());
        mock.written();
        let err = session
            .send_message("probe@example.com", &[], "subject", "body")
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(mock.written(), b"");
    }

    #[test]
    fn test_quit_and_close_idempotence() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(b"221 2.0.0 bye\r\n");
        let (mut session, _mock) = session_over(&replies);

        let response = session.quit().unwrap();
        assert!(response.has_code(221));
        assert_eq!(session.state(), SessionState::Closed);

        session.close();
        session.close();
        let err = session.command(Noop).unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[test]
    fn test_timeout_closes_session_and_keeps_reporting_timeout() {
        let (mut session, mock) = session_over(&plain_ehlo());
        mock.written();
        mock.timeout_when_drained();

        let err = session.command(Noop).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.state(), SessionState::Closed);

        // Later calls surface the cause, not a generic closed error
        let err = session.command(Noop).unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_connection_closed());
        let err = session.read_response().unwrap_err();
        assert!(err.is_timeout());
        // Only the first NOOP reached the wire
        assert_eq!(mock.written(), b"NOOP\r\n");
    }

    #[test]
    fn test_multiline_reply_assembled_across_reads() {
        let mut replies = GREETING.to_vec();
        replies.extend_from_slice(
            b"250-mail.example.com greets you\r\n\
              250-XEXCH50\r\n\
              250 OK\r\n",
        );
        let (session, _mock) = session_over(&replies);
        let report = session.exchange_report();
        assert!(report.is_exchange);
    }

    #[test]
    fn test_noop_probe() {
        let mut replies = plain_ehlo();
        replies.extend_from_slice(b"250 2.0.0 OK\r\n");
        let (mut session, mock) = session_over(&replies);
        mock.written();

        assert!(session.test_connected());
        assert_eq!(mock.written(), b"NOOP\r\n");
    }
}
