//! Via header parsing with branch extraction

use super::{parse_port, trim_angle_brackets};
use crate::common::types::ParsedVia;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Magic cookie every RFC 3261 branch starts with
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// `<transport>/<protocol> host[:port][;params]`, searched anywhere in the value
static VIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<transport>[A-Za-z0-9\-]+)/(?P<protocol>[A-Za-z]+)\s+(?P<sent_by>[^;]+)(?:;(?P<params>.*))?")
        .expect("Via pattern is valid")
});

/// Parse a Via value such as `SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bKabc;rport`.
///
/// The sent-by token is split on `:`; the first segment is the host and the
/// second the port. Bracketed IPv6 literals are not recognised and come back
/// mangled (`[2001` style hosts). An empty host is kept as `""`.
///
/// The `branch` parameter is lifted out of the parameter list when its value
/// starts with [`BRANCH_MAGIC_COOKIE`]; every other parameter is kept verbatim.
pub fn parse_via(raw: &str) -> ParsedVia {
    let value = trim_angle_brackets(raw);

    let Some(caps) = VIA_RE.captures(value) else {
        warn!("Unable to parse Via header: {}", value);
        return ParsedVia::unparsed();
    };

    let sent_by = caps.name("sent_by").map(|m| m.as_str().trim()).unwrap_or_default();
    let mut segments = sent_by.split(':');
    let host = segments.next().unwrap_or_default();
    let port = segments.next().and_then(parse_port);

    if host.is_empty() {
        debug!("Via header has an empty sent-by host: {}", value);
    }

    let (branch, parameters) = split_branch(caps.name("params").map(|m| m.as_str()).unwrap_or(""));

    let parsed = ParsedVia {
        host: Some(host.to_string()),
        port,
        branch,
        parameters: Some(parameters),
    };

    debug!("Parsed Via header: {:?}", parsed);
    parsed
}

/// Separate a magic-cookie branch from the rest of a `;`-delimited parameter tail
fn split_branch(params: &str) -> (Option<String>, String) {
    if params.is_empty() {
        return (None, String::new());
    }

    let mut branch = None;
    let mut rest = Vec::new();

    for param in params.split(';') {
        if branch.is_none() {
            if let Some(value) = branch_value(param) {
                if value.starts_with(BRANCH_MAGIC_COOKIE) {
                    branch = Some(value.to_string());
                    continue;
                }
            }
        }
        rest.push(param);
    }

    (branch, rest.join(";"))
}

fn branch_value(param: &str) -> Option<&str> {
    let (name, value) = param.split_once('=')?;
    if name.trim().eq_ignore_ascii_case("branch") {
        Some(value.trim())
    } else {
        None
    }
}
