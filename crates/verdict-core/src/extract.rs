//! Header extraction
//!
//! Turns an inbound request, as exposed by the host proxy, into a
//! [`CallHeaderRecord`]. Pure computation: no I/O, no suspension.

use crate::common::errors::{Result, VerdictError};
use crate::common::types::CallHeaderRecord;
use crate::headers::{names, parse_diversion, parse_uri, parse_via};
use chrono::Utc;
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::debug;

/// The view of a SIP request the host runtime hands to the filter
pub trait SipRequestView {
    /// Request method, e.g. `INVITE`
    fn method(&self) -> &str;

    /// Request-URI
    fn ruri(&self) -> &str;

    /// Value of a header by name; lookups are case-insensitive
    fn header(&self, name: &str) -> Option<&str>;
}

/// Owned request used by hosts that copy header values out of their own
/// message representation, and by tests.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    method: String,
    ruri: String,
    headers: Vec<(String, String)>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, ruri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ruri: ruri.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header. The first occurrence of a name wins on lookup.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl SipRequestView for InboundRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn ruri(&self) -> &str {
        &self.ruri
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A record together with the time spent building it
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: CallHeaderRecord,
    pub parse_time: Duration,
}

/// Extract and parse the headers of one request.
///
/// `From` and `To` are mandatory: without them the request is rejected with
/// [`VerdictError::MissingMandatoryHeader`] and the host applies its default.
/// Every other header is optional and simply ends up absent in the record.
pub fn extract<R: SipRequestView + ?Sized>(request: &R) -> Result<Extraction> {
    let captured_at = Utc::now();
    let started = Instant::now();

    let method = request.method().to_string();
    let request_uri = request.ruri().to_string();

    let from = request
        .header(names::FROM)
        .ok_or(VerdictError::MissingMandatoryHeader("From"))?
        .to_string();
    let to = request
        .header(names::TO)
        .ok_or(VerdictError::MissingMandatoryHeader("To"))?
        .to_string();

    let from_parsed = parse_uri(&from);
    let to_parsed = parse_uri(&to);

    let optional = |name: &str| request.header(name).map(str::to_string);

    let call_id = optional(names::CALL_ID);
    let cseq = optional(names::CSEQ);
    let contact = optional(names::CONTACT);
    let diversion = optional(names::DIVERSION);
    let p_asserted_identity = optional(names::P_ASSERTED_IDENTITY);
    let p_charge_info = optional(names::P_CHARGE_INFO);
    let max_forwards = optional(names::MAX_FORWARDS);
    let via = optional(names::VIA);

    let contact_parsed = contact.as_deref().map(parse_uri);
    let diversion_parsed = diversion.as_deref().map(parse_diversion);
    let via_parsed = via.as_deref().map(parse_via);

    let record = CallHeaderRecord {
        method,
        request_uri,
        from,
        from_parsed,
        to,
        to_parsed,
        call_id,
        cseq,
        contact,
        contact_parsed,
        diversion,
        diversion_parsed,
        p_asserted_identity,
        p_charge_info,
        max_forwards,
        via,
        via_parsed,
        captured_at,
    };

    log_record(&record);

    Ok(Extraction {
        record,
        parse_time: started.elapsed(),
    })
}

fn log_field<T: Debug>(field: &'static str, value: &T) {
    debug!(field, value = ?value, "extracted header field");
}

fn log_record(record: &CallHeaderRecord) {
    log_field("Method", &record.method);
    log_field("RURI", &record.request_uri);
    log_field("From", &record.from);
    log_field("From Parsed", &record.from_parsed);
    log_field("To", &record.to);
    log_field("To Parsed", &record.to_parsed);
    log_field("Call-ID", &record.call_id);
    log_field("CSeq", &record.cseq);
    log_field("Contact", &record.contact);
    log_field("Contact Parsed", &record.contact_parsed);
    log_field("Diversion", &record.diversion);
    log_field("Diversion Parsed", &record.diversion_parsed);
    log_field("P-Asserted-Identity", &record.p_asserted_identity);
    log_field("P-Charge-Info", &record.p_charge_info);
    log_field("Max-Forwards", &record.max_forwards);
    log_field("Via", &record.via);
    log_field("Via Parsed", &record.via_parsed);
}
