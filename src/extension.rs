//! ESMTP capability advertisement parsing

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::{authentication::Mechanism, error, response::Response, Error};

/// Client identifier, the parameter to `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum ClientId {
    /// A fully-qualified domain name
    Domain(String),
    /// An IPv4 address
    Ipv4(Ipv4Addr),
    /// An IPv6 address
    Ipv6(Ipv6Addr),
}

const LOCALHOST_CLIENT: ClientId = ClientId::Ipv4(Ipv4Addr::new(127, 0, 0, 1));

impl Default for ClientId {
    fn default() -> Self {
        // https://tools.ietf.org/html/rfc5321#section-4.1.4
        //
        // The EHLO parameter should be the client's primary host name, or an
        // address literal when no meaningful name is available.
        hostname::get()
            .ok()
            .and_then(|s| s.into_string().map(Self::Domain).ok())
            .unwrap_or(LOCALHOST_CLIENT)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(value) => f.write_str(value),
            Self::Ipv4(value) => write!(f, "[{value}]"),
            Self::Ipv6(value) => write!(f, "[IPv6:{value}]"),
        }
    }
}

/// One advertised ESMTP keyword with its parameters
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Capability {
    /// Keyword as sent by the server, e.g. `STARTTLS` or `SIZE`
    name: String,
    /// Parameters following the keyword, e.g. `["PLAIN", "LOGIN"]` for `AUTH`
    params: Vec<String>,
}

impl Capability {
    /// Keyword as advertised
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters following the keyword
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

/// The set of capabilities one EHLO round advertised
///
/// Built fresh from every EHLO response and replaced wholesale by the
/// session, never merged: capabilities seen on the plaintext connection
/// must not survive into the post-STARTTLS view, since anything advertised
/// before the upgrade could have been injected by an on-path attacker.
///
/// Unknown keywords are retained uninterpreted, lookups are
/// case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// Server name from the EHLO greeting line
    server_name: String,
    /// Capabilities in the order they were declared
    capabilities: Vec<Capability>,
    /// Uppercased keyword to index into `capabilities`
    index: HashMap<String, usize>,
}

impl Display for CapabilitySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.capabilities.is_empty() {
            return write!(f, "{} with no capabilities", self.server_name);
        }
        write!(f, "{} with", self.server_name)?;
        for (i, capability) in self.capabilities.iter().enumerate() {
            write!(f, "{}{capability}", if i == 0 { " " } else { ", " })?;
        }
        Ok(())
    }
}

impl CapabilitySet {
    /// Parses an EHLO response into a `CapabilitySet`
    ///
    /// The first line carries the server name and free-form greeting text,
    /// every following line is `KEYWORD [param ...]`. Unknown keywords never
    /// make parsing fail.
    pub fn from_response(response: &Response) -> Result<CapabilitySet, Error> {
        let server_name = match response.first_word() {
            Some(name) => name.to_owned(),
            None => return Err(error::protocol("could not read server name from EHLO")),
        };

        let mut capabilities = Vec::new();
        let mut index = HashMap::new();

        for line in response.message().skip(1) {
            let mut words = line.split_whitespace();
            let Some(name) = words.next() else {
                continue;
            };
            let capability = Capability {
                name: name.to_owned(),
                params: words.map(str::to_owned).collect(),
            };
            // First declaration wins on duplicate keywords
            if !index.contains_key(&name.to_ascii_uppercase()) {
                index.insert(name.to_ascii_uppercase(), capabilities.len());
                capabilities.push(capability);
            }
        }

        Ok(CapabilitySet {
            server_name,
            capabilities,
            index,
        })
    }

    /// The name the server gave in its EHLO greeting line
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Checks whether a keyword was advertised, case-insensitively
    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_uppercase())
    }

    /// The parameters of an advertised keyword, if present
    pub fn params(&self, name: &str) -> Option<&[String]> {
        self.index
            .get(&name.to_ascii_uppercase())
            .map(|&i| self.capabilities[i].params())
    }

    /// Checks whether an AUTH mechanism was advertised, case-insensitively
    pub fn supports_auth(&self, mechanism: Mechanism) -> bool {
        let wanted = mechanism.to_string();
        self.params("AUTH")
            .map(|params| params.iter().any(|p| p.eq_ignore_ascii_case(&wanted)))
            .unwrap_or(false)
    }

    /// The advertised `SIZE` limit, when present with a parseable value
    pub fn size_limit(&self) -> Option<u64> {
        self.params("SIZE")
            .and_then(|params| params.first())
            .and_then(|v| v.parse().ok())
    }

    /// All capabilities in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}
