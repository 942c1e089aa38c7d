//! Per-client memory of the last `sessions.archived` result, so a follow-up
//! `sessions.restore` can name a record by its 1-based index.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use tk_domain::error::{Error, Result};
use tk_sessions::ArchivedTranscript;

struct Listing {
    id: String,
    created: Instant,
    records: Vec<ArchivedTranscript>,
}

pub struct ListingCache {
    ttl: Duration,
    by_client: Mutex<HashMap<String, Listing>>,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            by_client: Mutex::new(HashMap::new()),
        }
    }

    /// Remember `records` as `client`'s latest listing, replacing any older
    /// one.  Returns the new listing id.
    pub fn store(&self, client: &str, records: Vec<ArchivedTranscript>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut by_client = self.by_client.lock();
        let now = Instant::now();
        by_client.retain(|_, l| now.duration_since(l.created) < self.ttl);
        by_client.insert(
            client.to_owned(),
            Listing {
                id: id.clone(),
                created: now,
                records,
            },
        );
        id
    }

    /// Record `index` (1-based) of `client`'s latest listing.
    ///
    /// When `listing_id` is given it must name that latest listing.
    pub fn lookup(
        &self,
        client: &str,
        listing_id: Option<&str>,
        index: usize,
    ) -> Result<ArchivedTranscript> {
        let by_client = self.by_client.lock();
        let listing = by_client
            .get(client)
            .filter(|l| l.created.elapsed() < self.ttl)
            .ok_or_else(|| {
                Error::InvalidRequest(
                    "no current archived listing; call sessions.archived first".into(),
                )
            })?;

        if let Some(wanted) = listing_id {
            if wanted != listing.id {
                return Err(Error::InvalidRequest(format!(
                    "listing {wanted} is no longer current; call sessions.archived again"
                )));
            }
        }

        index
            .checked_sub(1)
            .and_then(|i| listing.records.get(i))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidRequest(format!(
                    "index {index} is out of range (listing has {} entries)",
                    listing.records.len()
                ))
            })
    }

    /// Drop expired listings.
    pub fn prune_expired(&self) -> usize {
        let mut by_client = self.by_client.lock();
        let before = by_client.len();
        by_client.retain(|_, l| l.created.elapsed() < self.ttl);
        before - by_client.len()
    }

    pub fn len(&self) -> usize {
        self.by_client.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
