//! TLS client parameters and certificate verification plumbing

use std::{
    fmt::{self, Debug, Display, Formatter},
    sync::{Arc, Mutex},
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
    ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
};

use crate::{error, Error};

/// TLS protocol versions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum TlsVersion {
    /// TLS 1.0
    ///
    /// Long deprecated; reported when observed, never negotiated by this
    /// client.
    Tlsv10,
    /// TLS 1.1
    ///
    /// Long deprecated; reported when observed, never negotiated by this
    /// client.
    Tlsv11,
    /// TLS 1.2
    ///
    /// A good option for most SMTP servers.
    Tlsv12,
    /// TLS 1.3
    ///
    /// The most secure option, although not supported by all SMTP servers.
    Tlsv13,
}

impl Display for TlsVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TlsVersion::Tlsv10 => "TLS 1.0",
            TlsVersion::Tlsv11 => "TLS 1.1",
            TlsVersion::Tlsv12 => "TLS 1.2",
            TlsVersion::Tlsv13 => "TLS 1.3",
        })
    }
}

impl TlsVersion {
    pub(crate) fn from_protocol(version: rustls::ProtocolVersion) -> Option<TlsVersion> {
        match version {
            rustls::ProtocolVersion::TLSv1_0 => Some(TlsVersion::Tlsv10),
            rustls::ProtocolVersion::TLSv1_1 => Some(TlsVersion::Tlsv11),
            rustls::ProtocolVersion::TLSv1_2 => Some(TlsVersion::Tlsv12),
            rustls::ProtocolVersion::TLSv1_3 => Some(TlsVersion::Tlsv13),
            _ => None,
        }
    }
}

/// What the capturing verifier observed during the handshake
///
/// Only populated when verification is skipped: the checks still run so the
/// diagnostics can report what a strict client would have concluded, but
/// their outcome no longer aborts the handshake.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct VerifyOutcome {
    /// The chain validated against the trust roots
    pub(crate) trusted: bool,
    /// The leaf matched the requested server name
    pub(crate) hostname_ok: bool,
    /// The checks ran at all
    pub(crate) checked: bool,
}

/// Parameters to use for secure clients
#[derive(Clone)]
pub struct TlsParameters {
    connector: Arc<ClientConfig>,
    /// The domain name which is expected in the TLS certificate from the server
    domain: String,
    skip_verify: bool,
    outcome: Option<Arc<Mutex<VerifyOutcome>>>,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .field("skip_verify", &self.skip_verify)
            .finish()
    }
}

impl TlsParameters {
    /// Creates a new `TlsParameters` with default settings
    pub fn new(domain: String) -> Result<Self, Error> {
        TlsParametersBuilder::new(domain).build()
    }

    /// Creates a new `TlsParameters` builder
    pub fn builder(domain: String) -> TlsParametersBuilder {
        TlsParametersBuilder::new(domain)
    }

    /// The domain name expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn connector(&self) -> Arc<ClientConfig> {
        self.connector.clone()
    }

    pub(crate) fn skip_verify(&self) -> bool {
        self.skip_verify
    }

    pub(crate) fn verify_outcome(&self) -> Option<VerifyOutcome> {
        self.outcome
            .as_ref()
            .map(|outcome| *outcome.lock().unwrap())
    }
}

/// Builder for `TlsParameters`
#[derive(Debug, Clone)]
pub struct TlsParametersBuilder {
    domain: String,
    min_tls_version: TlsVersion,
    skip_verify: bool,
}

impl TlsParametersBuilder {
    /// Creates a new builder for `TlsParameters`
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            min_tls_version: TlsVersion::Tlsv12,
            skip_verify: false,
        }
    }

    /// Controls which minimum TLS version is allowed
    ///
    /// Defaults to [`Tlsv12`][TlsVersion::Tlsv12]. rustls cannot negotiate
    /// below TLS 1.2, so requesting 1.0 or 1.1 fails at build time.
    pub fn set_min_tls_version(mut self, min_tls_version: TlsVersion) -> Self {
        self.min_tls_version = min_tls_version;
        self
    }

    /// Controls whether certificate verification can fail the handshake
    ///
    /// When enabled the handshake accepts any certificate, but the
    /// trust-root and hostname checks still run and their verdict is
    /// recorded for the diagnostics. Intended for inspecting servers with
    /// broken certificates; never leave this on in anything that sends
    /// credentials you care about.
    pub fn dangerous_skip_verification(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }

    /// Creates a new `TlsParameters` using rustls with the provided configuration
    pub fn build(self) -> Result<TlsParameters, Error> {
        let just_version3 = &[&rustls::version::TLS13];
        let supported_versions = match self.min_tls_version {
            TlsVersion::Tlsv10 | TlsVersion::Tlsv11 => {
                return Err(error::handshake(format!(
                    "min tls version {} not supported by rustls",
                    self.min_tls_version
                )))
            }
            TlsVersion::Tlsv12 => rustls::ALL_VERSIONS,
            TlsVersion::Tlsv13 => just_version3,
        };

        let tls = ClientConfig::builder_with_protocol_versions(supported_versions);
        let provider = rustls::crypto::CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()));
        let signature_algorithms = provider.signature_verification_algorithms;

        let mut root_cert_store = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        if native.certs.is_empty() {
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            tracing::debug!("no platform certs available, using webpki roots");
        } else {
            let (added, ignored) = root_cert_store.add_parsable_certificates(native.certs);
            tracing::debug!(
                "loaded platform certs with {added} valid and {ignored} ignored (invalid) certs"
            );
        }

        let (tls, outcome) = if self.skip_verify {
            let outcome = Arc::new(Mutex::new(VerifyOutcome::default()));
            let verifier = CapturingVerifier {
                roots: root_cert_store,
                signature_algorithms,
                outcome: outcome.clone(),
            };
            (
                tls.dangerous()
                    .with_custom_certificate_verifier(Arc::new(verifier))
                    .with_no_client_auth(),
                Some(outcome),
            )
        } else {
            (
                tls.with_root_certificates(root_cert_store)
                    .with_no_client_auth(),
                None,
            )
        };

        Ok(TlsParameters {
            connector: Arc::new(tls),
            domain: self.domain,
            skip_verify: self.skip_verify,
            outcome,
        })
    }
}

/// Runs the standard verification checks without enforcing them
///
/// Installed only when verification is skipped. Records whether the chain
/// is anchored in the trust roots and whether the leaf matches the server
/// name, then accepts the certificate either way.
#[derive(Debug)]
struct CapturingVerifier {
    roots: RootCertStore,
    signature_algorithms: WebPkiSupportedAlgorithms,
    outcome: Arc<Mutex<VerifyOutcome>>,
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        let trusted = rustls::client::verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.signature_algorithms.all,
        )
        .is_ok();
        let hostname_ok = rustls::client::verify_server_name(&cert, server_name).is_ok();

        *self.outcome.lock().unwrap() = VerifyOutcome {
            trusted,
            hostname_ok,
            checked: true,
        };

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_min_version_below_12_rejected() {
        for version in [TlsVersion::Tlsv10, TlsVersion::Tlsv11] {
            let err = TlsParameters::builder("smtp.example.com".to_owned())
                .set_min_tls_version(version)
                .build()
                .unwrap_err();
            assert!(err.is_handshake_failed());
        }
    }

    #[test]
    fn test_build_default_and_skipped() {
        let strict = TlsParameters::new("smtp.example.com".to_owned()).unwrap();
        assert!(!strict.skip_verify());
        assert!(strict.verify_outcome().is_none());
        assert_eq!(strict.domain(), "smtp.example.com");

        let relaxed = TlsParameters::builder("smtp.example.com".to_owned())
            .dangerous_skip_verification(true)
            .build()
            .unwrap();
        assert!(relaxed.skip_verify());
        // Outcome exists but nothing has been checked before a handshake
        assert!(!relaxed.verify_outcome().unwrap().checked);
    }

    #[test]
    fn test_version_display_and_order() {
        assert_eq!(TlsVersion::Tlsv12.to_string(), "TLS 1.2");
        assert!(TlsVersion::Tlsv10 < TlsVersion::Tlsv12);
        assert!(TlsVersion::Tlsv13 > TlsVersion::Tlsv12);
    }
}
