//! Diversion header parsing

use super::{parse_port, trim_angle_brackets, SIP_ADDRESS_RE};
use crate::common::types::{DiversionLookup, ParsedAddress};
use tracing::{debug, warn};

/// Parse a Diversion value such as `<sip:+15551000@gw.example.com>;reason=unconditional`.
///
/// Uses the same grammar as [`parse_uri`](super::parse_uri) with two differences
/// that callers rely on:
///
/// - a failed match is [`DiversionLookup::NotFound`], not an all-absent record
/// - the host is kept as captured, so a `>` that precedes parameters stays in it
pub fn parse_diversion(raw: &str) -> DiversionLookup {
    let value = trim_angle_brackets(raw);

    let Some(caps) = SIP_ADDRESS_RE.captures(value) else {
        warn!("Unable to parse Diversion header: {}", value);
        return DiversionLookup::NotFound;
    };

    let parsed = ParsedAddress {
        user: caps.name("user").map(|m| m.as_str().to_string()),
        host: caps.name("host").map(|m| m.as_str().to_string()),
        port: caps.name("port").and_then(|m| parse_port(m.as_str())),
        parameters: Some(
            caps.name("params")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        ),
    };

    debug!("Parsed Diversion header: {:?}", parsed);
    DiversionLookup::Found(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::parse_uri;

    #[test]
    fn test_parse_diversion() {
        let lookup = parse_diversion("<sip:+15551000@gw.example.com>;reason=unconditional;counter=1");
        let addr = lookup.found().expect("diversion should parse");
        assert_eq!(addr.user.as_deref(), Some("+15551000"));
        assert_eq!(addr.host.as_deref(), Some("gw.example.com>"));
        assert_eq!(addr.parameters.as_deref(), Some("reason=unconditional;counter=1"));
    }

    #[test]
    fn test_host_asymmetry_with_uri_parser() {
        let raw = "<sip:4155551000@divert.example.net>;reason=user-busy";
        let via_uri = parse_uri(raw);
        let via_diversion = parse_diversion(raw);

        assert_eq!(via_uri.host.as_deref(), Some("divert.example.net"));
        assert_eq!(
            via_diversion.found().and_then(|a| a.host.as_deref()),
            Some("divert.example.net>")
        );
    }

    #[test]
    fn test_plain_diversion_with_port() {
        let lookup = parse_diversion("sip:alice@10.0.0.9:5060");
        let addr = lookup.found().unwrap();
        assert_eq!(addr.host.as_deref(), Some("10.0.0.9"));
        assert_eq!(addr.port, Some(5060));
        assert_eq!(addr.parameters.as_deref(), Some(""));
    }

    #[test]
    fn test_malformed_is_not_found() {
        assert_eq!(parse_diversion("tel:+15551000;reason=deflection"), DiversionLookup::NotFound);
        assert_eq!(parse_diversion(""), DiversionLookup::NotFound);
        // Distinct from a successfully parsed record
        assert_ne!(
            parse_diversion("garbage"),
            DiversionLookup::Found(ParsedAddress::unparsed())
        );
    }
}
