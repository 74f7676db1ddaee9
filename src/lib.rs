//! Diagnostic SMTP client for probing mail servers
//!
//! `smtp-probe` speaks just enough SMTP to find out how a server behaves:
//! it connects, reads the greeting, negotiates capabilities over EHLO,
//! upgrades to TLS via STARTTLS while reporting on the certificate chain
//! and negotiated parameters, authenticates with PLAIN, LOGIN or CRAM-MD5,
//! and can push a test message through a full MAIL/RCPT/DATA transaction.
//! It also recognizes Microsoft Exchange servers from their banner and
//! capability fingerprints.
//!
//! It is a troubleshooting tool, not a mail library: every reply code and
//! failure step is surfaced so a misbehaving server can be pinned down.
//!
//! # Example
//!
//! ```rust,no_run
//! use smtp_probe::{extension::ClientId, SmtpSession, TlsParameters};
//!
//! # fn main() -> Result<(), smtp_probe::Error> {
//! let mut session = SmtpSession::connect(
//!     ("mail.example.com", 587),
//!     Some(std::time::Duration::from_secs(10)),
//!     &ClientId::default(),
//! )?;
//! println!("banner: {}", session.banner());
//!
//! if session.can_starttls() {
//!     let tls = TlsParameters::new("mail.example.com".to_owned())?;
//!     let report = session.upgrade_tls(&tls)?;
//!     println!("certificate: {}", report.verification);
//!     for warning in &report.warnings {
//!         println!("warning: {}", warning.message);
//!     }
//! }
//!
//! session.quit()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod authentication;
pub mod client;
pub mod commands;
pub mod diagnostics;
pub mod error;
pub mod exchange;
pub mod extension;
mod message;
pub mod response;
mod session;

pub use crate::{
    authentication::{Credentials, Mechanism},
    client::{TlsParameters, TlsParametersBuilder, TlsVersion},
    diagnostics::TlsReport,
    error::{Error, Step},
    exchange::ExchangeReport,
    session::{AuthResult, SessionState, SmtpSession},
};
