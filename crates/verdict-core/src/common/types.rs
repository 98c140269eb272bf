//! Common types used throughout the verdict-core library

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Fields pulled out of a `sip:user@host[:port][;params]` address.
///
/// A record with neither `user` nor `host` means the value could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedAddress {
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Raw parameter tail after the first `;`, never decomposed.
    /// Empty when the address had no parameters, `None` when parsing failed.
    pub parameters: Option<String>,
}

impl ParsedAddress {
    /// The all-absent record returned for unparseable values
    pub fn unparsed() -> Self {
        Self::default()
    }

    /// Whether the source value matched the address grammar
    pub fn is_parsed(&self) -> bool {
        self.user.is_some() || self.host.is_some()
    }
}

/// Fields pulled out of a `Transport/Protocol host[:port][;params]` Via value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedVia {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Transaction branch, only when it carries the `z9hG4bK` magic cookie
    pub branch: Option<String>,
    /// Remaining parameters, verbatim and `;`-joined, without the branch
    pub parameters: Option<String>,
}

impl ParsedVia {
    pub fn unparsed() -> Self {
        Self::default()
    }

    pub fn is_parsed(&self) -> bool {
        self.host.is_some()
    }
}

/// Result of parsing a Diversion header.
///
/// Unlike [`ParsedAddress::unparsed`], a failed Diversion parse is a distinct
/// `NotFound` marker. Callers branch on the variant, not on field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiversionLookup {
    Found(ParsedAddress),
    NotFound,
}

impl DiversionLookup {
    pub fn found(&self) -> Option<&ParsedAddress> {
        match self {
            DiversionLookup::Found(addr) => Some(addr),
            DiversionLookup::NotFound => None,
        }
    }
}

// `NotFound` is written as JSON null, `Found` as the plain address object.
impl Serialize for DiversionLookup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DiversionLookup::Found(addr) => addr.serialize(serializer),
            DiversionLookup::NotFound => serializer.serialize_none(),
        }
    }
}

/// Everything extracted from one inbound request.
///
/// Built once by [`crate::extract::extract`] and handed, unchanged, to the
/// audit sink and the verdict source. Field names are the keys used on the
/// wire and in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallHeaderRecord {
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "RURI")]
    pub request_uri: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "From Parsed")]
    pub from_parsed: ParsedAddress,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "To Parsed")]
    pub to_parsed: ParsedAddress,
    #[serde(rename = "Call-ID")]
    pub call_id: Option<String>,
    #[serde(rename = "CSeq")]
    pub cseq: Option<String>,
    #[serde(rename = "Contact")]
    pub contact: Option<String>,
    #[serde(rename = "Contact Parsed")]
    pub contact_parsed: Option<ParsedAddress>,
    #[serde(rename = "Diversion")]
    pub diversion: Option<String>,
    #[serde(rename = "Diversion Parsed")]
    pub diversion_parsed: Option<DiversionLookup>,
    #[serde(rename = "P-Asserted-Identity")]
    pub p_asserted_identity: Option<String>,
    #[serde(rename = "P-Charge-Info")]
    pub p_charge_info: Option<String>,
    #[serde(rename = "Max-Forwards")]
    pub max_forwards: Option<String>,
    #[serde(rename = "Via")]
    pub via: Option<String>,
    #[serde(rename = "Via Parsed")]
    pub via_parsed: Option<ParsedVia>,
    #[serde(rename = "Captured At")]
    pub captured_at: DateTime<Utc>,
}

impl CallHeaderRecord {
    /// User part of the From address, if it parsed
    pub fn from_user(&self) -> Option<&str> {
        self.from_parsed.user.as_deref()
    }
}

/// Binary routing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Decision {
    /// Proceed / redirect
    Allow,
    /// Forbidden
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Decision plus how long it took to obtain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub elapsed: Duration,
}

impl Verdict {
    pub fn allow(elapsed: Duration) -> Self {
        Self { decision: Decision::Allow, elapsed }
    }

    pub fn reject(elapsed: Duration) -> Self {
        Self { decision: Decision::Reject, elapsed }
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }
}
