//! Microsoft Exchange detection heuristics
//!
//! Purely advisory: the report annotates diagnostic output and never gates
//! protocol behavior.

use crate::extension::CapabilitySet;

/// Banner fragments used by Exchange and its IIS-era predecessors
const BANNER_MARKERS: &[&str] = &[
    "Microsoft ESMTP MAIL Service",
    "Microsoft SMTP Server",
    "Microsoft Exchange Internet Mail Service",
];

/// Capabilities only Exchange advertises
const EXCHANGE_CAPABILITIES: &[&str] = &["X-ANONYMOUSTLS", "XEXCH50", "X-EXPS", "XRDST", "XSHADOW"];

/// What the heuristics concluded about the server
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    /// True when banner or capabilities identify Exchange
    pub is_exchange: bool,
    /// Product version mapped from the build number, when recognizable
    pub version: Option<String>,
    /// Human-readable observations for the operator
    pub notes: Vec<String>,
}

/// Inspects the greeting banner and EHLO capabilities for Exchange markers
pub fn detect(banner: &str, capabilities: &CapabilitySet) -> ExchangeReport {
    let banner_hit = BANNER_MARKERS.iter().any(|m| banner.contains(m));
    let capability_hits: Vec<&str> = EXCHANGE_CAPABILITIES
        .iter()
        .copied()
        .filter(|c| capabilities.has(c))
        .collect();

    let is_exchange = banner_hit || !capability_hits.is_empty();
    if !is_exchange {
        return ExchangeReport::default();
    }

    let mut notes = Vec::new();
    if banner_hit {
        notes.push("banner identifies a Microsoft SMTP service".to_owned());
    }
    for capability in &capability_hits {
        notes.push(format!("Exchange-specific capability {capability} advertised"));
    }

    let version = banner_build_number(banner).and_then(map_build);
    match &version {
        Some(version) => notes.push(format!("build number maps to {version}")),
        None if banner_hit => {
            notes.push("no build number in banner; version unknown".to_owned());
        }
        None => {}
    }

    notes.push(
        "Exchange typically restricts relay for unauthenticated connections".to_owned(),
    );

    ExchangeReport {
        is_exchange,
        version,
        notes,
    }
}

/// Extracts `major.minor` from a `Version: x.y.z` banner fragment
fn banner_build_number(banner: &str) -> Option<(u32, u32)> {
    let rest = banner.split("Version:").nth(1)?.trim_start();
    let mut digits = rest
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty());
    let major = digits.next()?.parse().ok()?;
    let minor = digits.next()?.parse().ok()?;
    Some((major, minor))
}

/// Exchange build numbers to marketed product versions
fn map_build((major, minor): (u32, u32)) -> Option<String> {
    let version = match (major, minor) {
        (6, 0) => "Exchange 2000",
        (6, 5) => "Exchange 2003",
        (8, _) => "Exchange 2007",
        (14, _) => "Exchange 2010",
        (15, 0) => "Exchange 2013",
        (15, 1) => "Exchange 2016",
        (15, 2) => "Exchange 2019",
        _ => return None,
    };
    Some(version.to_owned())
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
    fn test_banner_detection() {
        let report = detect(
            "mail.contoso.com Microsoft ESMTP MAIL Service ready at Mon, 1 Jan 2024 00:00:00 +0000",
            &caps("250 mail.contoso.com hello\r\n"),
        );
        assert!(report.is_exchange);
        assert_eq!(report.version, None);
        assert!(report
            .notes
            .iter()
            .any(|n| n.contains("restricts relay")));
    }

    #[test]
    fn test_capability_detection() {
        let report = detect(
            "mail.contoso.com ready",
            &caps("250-me hi\r\n250-X-ANONYMOUSTLS\r\n250 XEXCH50\r\n"),
        );
        assert!(report.is_exchange);
        assert!(report
            .notes
            .iter()
            .any(|n| n.contains("X-ANONYMOUSTLS")));
    }

    #[test]
    fn test_build_mapping() {
        let report = detect(
            "mail.contoso.com Microsoft ESMTP MAIL Service, Version: 15.2.986.5 ready",
            &caps("250 me hi\r\n"),
        );
        assert_eq!(report.version.as_deref(), Some("Exchange 2019"));

        assert_eq!(map_build((15, 1)).as_deref(), Some("Exchange 2016"));
        assert_eq!(map_build((15, 0)).as_deref(), Some("Exchange 2013"));
        assert_eq!(map_build((14, 3)).as_deref(), Some("Exchange 2010"));
        assert_eq!(map_build((8, 3)).as_deref(), Some("Exchange 2007"));
        assert_eq!(map_build((6, 5)).as_deref(), Some("Exchange 2003"));
        assert_eq!(map_build((99, 0)), None);
    }

    #[test]
    fn test_not_exchange() {
        let report = detect(
            "smtp.example.org ESMTP Postfix",
            &caps("250-me hi\r\n250 STARTTLS\r\n"),
        );
        assert!(!report.is_exchange);
        assert!(report.notes.is_empty());
    }
}
