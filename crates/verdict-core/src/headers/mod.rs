//! Pragmatic SIP header extractors
//!
//! These are single-line regular-expression matchers, not RFC 3261 grammars.
//! None of them fail: values that do not match come back as absent fields
//! (or [`DiversionLookup::NotFound`](crate::DiversionLookup)).

pub mod diversion;
pub mod uri;
pub mod via;

pub use diversion::parse_diversion;
pub use uri::parse_uri;
pub use via::parse_via;

use once_cell::sync::Lazy;
use regex::Regex;

/// Header names read from the inbound request (lookups are case-insensitive)
pub mod names {
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
    pub const CALL_ID: &str = "call-id";
    pub const CSEQ: &str = "cseq";
    pub const CONTACT: &str = "contact";
    pub const DIVERSION: &str = "diversion";
    pub const P_ASSERTED_IDENTITY: &str = "p-asserted-identity";
    pub const P_CHARGE_INFO: &str = "p-charge-info";
    pub const MAX_FORWARDS: &str = "max-forwards";
    pub const VIA: &str = "via";
}

/// `sip:user@host[:port][;params]`, searched anywhere in the value.
/// Shared by the URI and Diversion parsers.
pub(crate) static SIP_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"sip:(?P<user>[^@]+)@(?P<host>[^:;]+)(?::(?P<port>[0-9]+))?(?:;(?P<params>.*))?")
        .expect("SIP address pattern is valid")
});

/// Strip any run of `<` / `>` from both ends
pub(crate) fn trim_angle_brackets(raw: &str) -> &str {
    raw.trim_matches(|c| c == '<' || c == '>')
}

/// Parse a captured port; values that do not fit a `u16` are treated as absent
pub(crate) fn parse_port(digits: &str) -> Option<u16> {
    digits.trim().parse::<u16>().ok()
}
