//! Static allow-list verdicts, no external round trip

use super::VerdictSource;
use crate::common::types::{CallHeaderRecord, Decision, Verdict};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;
use tracing::info;

/// Allows a call when the From user part is one of the configured identities
#[derive(Debug, Clone, Default)]
pub struct AllowListSource {
    identities: HashSet<String>,
}

impl AllowListSource {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_allowed(&self, user: Option<&str>) -> bool {
        user.map_or(false, |u| self.identities.contains(u))
    }
}

#[async_trait]
impl VerdictSource for AllowListSource {
    async fn decide(&self, record: &CallHeaderRecord) -> Verdict {
        let started = Instant::now();
        let user = record.from_user();

        let decision = if self.is_allowed(user) {
            info!("Match found for {}, allowing", user.unwrap_or_default());
            Decision::Allow
        } else {
            info!("No match found for {:?}, rejecting", user);
            Decision::Reject
        };

        Verdict {
            decision,
            elapsed: started.elapsed(),
        }
    }

    fn name(&self) -> &'static str {
        "allow-list"
    }
}
