//! From / To / Contact address parsing

use super::{parse_port, trim_angle_brackets, SIP_ADDRESS_RE};
use crate::common::types::ParsedAddress;
use tracing::{debug, warn};

/// Parse an address header value such as `"Alice" <sip:alice@example.com:5060>;tag=1`.
///
/// Never fails. Values without a `sip:user@host` part yield
/// [`ParsedAddress::unparsed`]. Trailing `>` characters are removed from the host.
pub fn parse_uri(raw: &str) -> ParsedAddress {
    let value = trim_angle_brackets(raw);

    let Some(caps) = SIP_ADDRESS_RE.captures(value) else {
        warn!("Unable to parse SIP URI from header: {}", value);
        return ParsedAddress::unparsed();
    };

    let parsed = ParsedAddress {
        user: caps.name("user").map(|m| m.as_str().to_string()),
        host: caps
            .name("host")
            .map(|m| m.as_str().trim_matches('>').to_string()),
        port: caps.name("port").and_then(|m| parse_port(m.as_str())),
        parameters: Some(
            caps.name("params")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        ),
    };

    debug!("Parsed SIP URI: {:?}", parsed);
    parsed
}
