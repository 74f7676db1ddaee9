//! SASL authentication mechanisms: PLAIN, LOGIN and CRAM-MD5

use std::fmt::{self, Debug, Display, Formatter};

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::{error, extension::CapabilitySet, Error};

/// Mechanism preference, strongest first
///
/// CRAM-MD5 never transmits the password in clear; LOGIN and PLAIN do and
/// are only distinguishable by round-trip count.
pub const PREFERRED_MECHANISMS: &[Mechanism] =
    &[Mechanism::CramMd5, Mechanism::Login, Mechanism::Plain];

/// Contains user credentials
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from username and password
    pub fn new(username: String, password: String) -> Credentials {
        Credentials {
            authentication_identity: username,
            secret: password,
        }
    }
}

impl<S, T> From<(S, T)> for Credentials
where
    S: Into<String>,
    T: Into<String>,
{
    fn from((username, password): (S, T)) -> Self {
        Credentials::new(username.into(), password.into())
    }
}

impl Debug for Credentials {
    // Never print the secret
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish()
    }
}

/// Represents authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Mechanism {
    /// CRAM-MD5 challenge-response mechanism, defined in
    /// [RFC 2195](https://tools.ietf.org/html/rfc2195)
    CramMd5,
    /// LOGIN authentication mechanism
    /// Obsolete but needed for some providers (like office365)
    ///
    /// Defined in [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt).
    Login,
    /// PLAIN authentication mechanism, defined in
    /// [RFC 4616](https://tools.ietf.org/html/rfc4616)
    Plain,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::Login => "LOGIN",
            Mechanism::Plain => "PLAIN",
        })
    }
}

impl Mechanism {
    /// Does the mechanism support an initial response on the AUTH line
    pub fn supports_initial_response(self) -> bool {
        match self {
            Mechanism::Plain => true,
            Mechanism::Login | Mechanism::CramMd5 => false,
        }
    }

    /// Returns the payload to send to the server, before base64 framing,
    /// using the provided credentials and decoded challenge where one is
    /// expected
    ///
    /// Callers must only authenticate over an encrypted connection unless
    /// the operator explicitly forced plaintext; this type does not enforce
    /// that ordering, the session does.
    pub fn response(
        self,
        credentials: &Credentials,
        challenge: Option<&str>,
    ) -> Result<String, Error> {
        match self {
            Mechanism::Plain => match challenge {
                // An empty 334 challenge just asks for the same payload
                Some("") | None => Ok(format!(
                    "\u{0}{}\u{0}{}",
                    credentials.authentication_identity, credentials.secret
                )),
                Some(_) => Err(error::protocol("PLAIN does not expect a challenge")),
            },
            Mechanism::Login => {
                let decoded_challenge =
                    challenge.ok_or_else(|| error::protocol("LOGIN expects a challenge"))?;

                if ["User Name", "Username:", "Username"].contains(&decoded_challenge) {
                    return Ok(credentials.authentication_identity.clone());
                }

                if ["Password", "Password:"].contains(&decoded_challenge) {
                    return Ok(credentials.secret.clone());
                }

                Err(error::protocol("unrecognized LOGIN challenge"))
            }
            Mechanism::CramMd5 => {
                let challenge =
                    challenge.ok_or_else(|| error::protocol("CRAM-MD5 expects a challenge"))?;

                let mut mac = Hmac::<Md5>::new_from_slice(credentials.secret.as_bytes())
                    .map_err(error::protocol)?;
                mac.update(challenge.as_bytes());
                let digest = mac.finalize().into_bytes();

                Ok(format!(
                    "{} {}",
                    credentials.authentication_identity,
                    hex::encode(digest)
                ))
            }
        }
    }
}

/// Picks the mechanism to authenticate with
///
/// An explicitly requested mechanism is used if the server advertises it;
/// otherwise the strongest advertised mechanism wins, in
/// [`PREFERRED_MECHANISMS`] order. Fails with `NoCompatibleMechanism` when
/// nothing usable is advertised or the requested mechanism is absent.
pub fn select_mechanism(
    capabilities: &CapabilitySet,
    requested: Option<Mechanism>,
) -> Result<Mechanism, Error> {
    match requested {
        Some(mechanism) => {
            if capabilities.supports_auth(mechanism) {
                Ok(mechanism)
            } else {
                Err(error::no_mechanism(format!(
                    "server does not advertise {mechanism}"
                )))
            }
        }
        None => PREFERRED_MECHANISMS
            .iter()
            .copied()
            .find(|m| capabilities.supports_auth(*m))
            .ok_or_else(|| error::no_mechanism("server advertises no supported AUTH mechanism")),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::response::Response;

    fn caps(raw: &str) -> CapabilitySet {
        CapabilitySet::from_response(&raw.parse::<Response>().unwrap()).unwrap()
    }

    #[test]
    fn test_plain() {
        let mechanism = Mechanism::Plain;

        let credentials = Credentials::new("user@example.com".to_owned(), "secret".to_owned());

        assert_eq!(
            mechanism.response(&credentials, None).unwrap(),
            "\u{0}user@example.com\u{0}secret"
        );
        // Empty 334 payload asks for the same initial response
        assert_eq!(
            mechanism.response(&credentials, Some("")).unwrap(),
            "\u{0}user@example.com\u{0}secret"
        );
        assert!(mechanism.response(&credentials, Some("test")).is_err());
    }

    #[test]
    fn test_login() {
        let mechanism = Mechanism::Login;

        let credentials = Credentials::new("alice".to_owned(), "wonderland".to_owned());

        assert_eq!(
            mechanism.response(&credentials, Some("Username")).unwrap(),
            "alice"
        );
        assert_eq!(
            mechanism.response(&credentials, Some("Password")).unwrap(),
            "wonderland"
        );
        assert!(mechanism.response(&credentials, None).is_err());
    }

    #[test]
    fn test_cram_md5_rfc2195_vector() {
        let mechanism = Mechanism::CramMd5;

        let credentials = Credentials::new("tim".to_owned(), "tanstaaftanstaaf".to_owned());

        assert_eq!(
            mechanism
                .response(
                    &credentials,
                    Some("<1896.697170952@postoffice.reston.mci.net>")
                )
                .unwrap(),
            "tim b913a602c7eda7a495b4e6e7334d3890"
        );
        assert!(mechanism.response(&credentials, None).is_err());
    }

    #[test]
    fn test_select_requested() {
        let caps = caps("250-me hi\r\n250 AUTH PLAIN LOGIN\r\n");
        assert_eq!(
            select_mechanism(&caps, Some(Mechanism::Plain)).unwrap(),
            Mechanism::Plain
        );
        let err = select_mechanism(&caps, Some(Mechanism::CramMd5)).unwrap_err();
        assert!(err.is_no_compatible_mechanism());
    }

    #[test]
    fn test_select_strongest_advertised() {
        let caps = caps("250-me hi\r\n250 AUTH PLAIN LOGIN CRAM-MD5\r\n");
        assert_eq!(select_mechanism(&caps, None).unwrap(), Mechanism::CramMd5);

        let caps = self::caps("250-me hi\r\n250 AUTH PLAIN LOGIN\r\n");
        assert_eq!(select_mechanism(&caps, None).unwrap(), Mechanism::Login);

        let caps = self::caps("250-me hi\r\n250 AUTH PLAIN\r\n");
        assert_eq!(select_mechanism(&caps, None).unwrap(), Mechanism::Plain);
    }

    #[test]
    fn test_select_none_advertised() {
        let caps = caps("250-me hi\r\n250 STARTTLS\r\n");
        assert!(select_mechanism(&caps, None)
            .unwrap_err()
            .is_no_compatible_mechanism());
    }

    #[test]
    fn test_from_user_pass_for_credentials() {
        assert_eq!(
            Credentials::new("alice".to_owned(), "wonderland".to_owned()),
            Credentials::from(("alice", "wonderland"))
        );
    }
}
