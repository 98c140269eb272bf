//! Mapping between policy replies, decisions and host return codes

use crate::common::types::{Decision, Verdict};

/// The only reply payload that allows a call
pub const ALLOW_REPLY: &[u8] = b"1";

/// Return code the host interprets as "proceed / redirect"
pub const RESPONSE_ALLOW: i32 = 1;

/// Return code the host interprets as "forbidden"
pub const RESPONSE_REJECT: i32 = 0;

/// Map a policy-service reply to a decision.
///
/// Exactly `"1"` allows. Anything else, including whitespace variants, empty
/// payloads and non-UTF-8 bytes, rejects.
pub fn decision_from_reply(reply: &[u8]) -> Decision {
    if reply == ALLOW_REPLY {
        Decision::Allow
    } else {
        Decision::Reject
    }
}

/// Host return code for a verdict
pub fn to_response_code(verdict: &Verdict) -> i32 {
    match verdict.decision {
        Decision::Allow => RESPONSE_ALLOW,
        Decision::Reject => RESPONSE_REJECT,
    }
}
