use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use ridepool_core::{CoreResult, Directory};
use ridepool_shared::{Match, MatchStatus};
use tracing::{debug, info};
use uuid::Uuid;

const MIN_SWEEP_MS: i64 = 30_000;
const MAX_SWEEP_MS: i64 = 300_000;

/// Governs match status changes and keeps offer/request statuses in step.
///
/// Transitions: pending -> notified -> {connected, accepted}; any non-terminal
/// status -> declined | cancelled | expired. Every change is followed by a
/// recomputation of both owning records from their active-match sums.
#[derive(Clone)]
pub struct MatchLifecycle {
    directory: Arc<dyn Directory>,
    ttl: Duration,
}

impl MatchLifecycle {
    pub fn new(directory: Arc<dyn Directory>, ttl: Duration) -> Self {
        Self { directory, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sweep cadence: half the TTL, clamped to [30s, 300s]
    pub fn sweep_interval(&self) -> StdDuration {
        let half = self.ttl.num_milliseconds() / 2;
        let ms = half.clamp(MIN_SWEEP_MS, MAX_SWEEP_MS);
        StdDuration::from_millis(ms as u64)
    }

    /// Matches created before this instant are stale at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_stale(&self, m: &Match, now: DateTime<Utc>) -> bool {
        MatchStatus::EXPIRABLE.contains(&m.status) && now - m.created_at > self.ttl
    }

    /// Expire stale pending/notified matches and refresh their owners
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let cutoff = self.cutoff(now);
        debug!(%cutoff, "Running match expiration");

        let sweep = self.directory.bulk_expire_stale_matches(cutoff).await?;
        if sweep.expired == 0 {
            return Ok(0);
        }

        for offer_id in &sweep.offer_ids {
            self.directory.recompute_offer_status(*offer_id).await?;
        }
        for request_id in &sweep.request_ids {
            self.directory.recompute_request_status(*request_id).await?;
        }

        info!(
            count = sweep.expired,
            offers = sweep.offer_ids.len(),
            requests = sweep.request_ids.len(),
            "Expired matches"
        );
        Ok(sweep.expired)
    }

    pub async fn mark_notified(&self, match_id: Uuid) -> CoreResult<Match> {
        self.transition(match_id, MatchStatus::Notified).await
    }

    pub async fn mark_connected(&self, match_id: Uuid) -> CoreResult<Match> {
        self.transition(match_id, MatchStatus::Connected).await
    }

    pub async fn accept(&self, match_id: Uuid) -> CoreResult<Match> {
        self.transition(match_id, MatchStatus::Accepted).await
    }

    pub async fn decline(&self, match_id: Uuid) -> CoreResult<Match> {
        self.transition(match_id, MatchStatus::Declined).await
    }

    /// Apply one transition and recompute both owners
    pub async fn transition(&self, match_id: Uuid, to: MatchStatus) -> CoreResult<Match> {
        let updated = self.directory.transition_match(match_id, to).await?;
        info!(match_id = %match_id, status = ?updated.status, "Match status changed");

        self.directory.recompute_offer_status(updated.offer_id).await?;
        self.directory.recompute_request_status(updated.request_id).await?;
        Ok(updated)
    }

    /// Cancel an offer, its live matches, and refresh the affected requests
    pub async fn cancel_offer(&self, offer_id: Uuid) -> CoreResult<usize> {
        let cancellation = self.directory.cancel_offer(offer_id).await?;

        info!(
            offer_id = %offer_id,
            cancelled_matches = cancellation.cancelled_matches,
            affected_requests = cancellation.counterparts.len(),
            "Offer cancelled"
        );
        for request_id in &cancellation.counterparts {
            self.directory.recompute_request_status(*request_id).await?;
        }
        Ok(cancellation.cancelled_matches)
    }

    /// Cancel a request, its live matches, and refresh the affected offers
    pub async fn cancel_request(&self, request_id: Uuid) -> CoreResult<usize> {
        let cancellation = self.directory.cancel_request(request_id).await?;

        info!(
            request_id = %request_id,
            cancelled_matches = cancellation.cancelled_matches,
            affected_offers = cancellation.counterparts.len(),
            "Request cancelled"
        );
        for offer_id in &cancellation.counterparts {
            self.directory.recompute_offer_status(*offer_id).await?;
        }
        Ok(cancellation.cancelled_matches)
    }
}
