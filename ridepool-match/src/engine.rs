use std::sync::Arc;

use ridepool_core::{CoreResult, Directory, Notifier, OfferCandidate, RequestCandidate};
use ridepool_shared::pii::mask_phone;
use ridepool_shared::{Allocation, Match, MatchStatus, Offer, RideRequest};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocator::{allocate, AllocationPolicy};

/// Runs the allocator over candidate lists and persists the matches it finds.
///
/// Each call must be made exactly once per newly created offer or request.
/// Calling again over candidates that were not re-fetched can allocate the
/// same seats twice; the directory's status filtering is what keeps settled
/// capacity out of later candidate lists.
#[derive(Clone)]
pub struct MatchEngine {
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
}

impl MatchEngine {
    pub fn new(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            directory,
            notifier,
        }
    }

    /// Seat requests from a new offer, oldest request first.
    ///
    /// One running pool is shared across candidates. A together request that
    /// fits ends the pass; partial grants keep going until the pool is empty.
    pub async fn match_against_requests(
        &self,
        offer: &Offer,
        candidates: Vec<RequestCandidate>,
    ) -> CoreResult<Vec<Match>> {
        let mut pool = offer.capacity();
        let mut created = Vec::new();

        debug!(
            offer_id = %offer.id,
            ?pool,
            candidates = candidates.len(),
            direction = ?offer.direction,
            departure_time = %offer.departure_time,
            "Matching new offer against requests"
        );

        for candidate in candidates {
            if pool.is_empty() {
                debug!(offer_id = %offer.id, "No seats left in offer");
                break;
            }

            let request = &candidate.request;
            let policy = AllocationPolicy::for_request(request);
            debug!(
                offer_id = %offer.id,
                request_id = %request.id,
                need = ?candidate.remaining,
                ?pool,
                together = policy.must_travel_together,
                "Checking request against offer"
            );

            let result = allocate(&pool, &candidate.remaining, policy);
            if result.allocation.is_empty() {
                continue;
            }

            let created_match = self.persist(offer.id, request.id, result.allocation).await?;
            info!(
                match_id = %created_match.id,
                offer_id = %offer.id,
                request_id = %request.id,
                seats = result.allocation.seats(),
                together = policy.must_travel_together,
                "Created match for request"
            );

            pool = result.pool;
            self.notify_rider(request).await;
            created.push(created_match);

            if policy.must_travel_together {
                break;
            }
        }

        info!(
            offer_id = %offer.id,
            total_matches = created.len(),
            seats_left = pool.total(),
            "Completed matching offer with requests"
        );
        Ok(created)
    }

    /// Seat a new request from candidate offers.
    ///
    /// Offers arrive ordered by departure then creation time. With a preferred
    /// time they are re-ranked by distance from it; the sort is stable, so the
    /// incoming order breaks ties.
    pub async fn match_against_offers(
        &self,
        request: &RideRequest,
        mut candidates: Vec<OfferCandidate>,
    ) -> CoreResult<Vec<Match>> {
        let policy = AllocationPolicy::for_request(request);
        let mut need = request.need();
        let mut created = Vec::new();

        debug!(
            request_id = %request.id,
            ?need,
            candidates = candidates.len(),
            direction = ?request.direction,
            earliest = %request.earliest_time,
            latest = %request.latest_time,
            together = policy.must_travel_together,
            "Matching new request against offers"
        );

        if request.preferred_time.is_some() {
            candidates.sort_by_key(|c| request.distance_from_preferred(c.offer.departure_time));
        }

        for candidate in candidates {
            if need.is_empty() {
                debug!(request_id = %request.id, "Request fully satisfied, stopping offer search");
                break;
            }

            let offer = &candidate.offer;
            debug!(
                request_id = %request.id,
                offer_id = %offer.id,
                ?need,
                seats = ?candidate.remaining,
                departure_time = %offer.departure_time,
                "Checking offer against request"
            );

            let result = allocate(&candidate.remaining, &need, policy);
            if result.allocation.is_empty() {
                continue;
            }

            let created_match = self.persist(offer.id, request.id, result.allocation).await?;
            info!(
                match_id = %created_match.id,
                request_id = %request.id,
                offer_id = %offer.id,
                seats = result.allocation.seats(),
                together = policy.must_travel_together,
                "Created match for request"
            );

            need = result.remaining;
            self.notify_driver(offer).await;
            created.push(created_match);

            if policy.must_travel_together {
                break;
            }
        }

        info!(
            request_id = %request.id,
            total_matches = created.len(),
            remaining = ?need,
            "Completed matching request with offers"
        );
        Ok(created)
    }

    async fn persist(&self, offer_id: Uuid, request_id: Uuid, allocation: Allocation) -> CoreResult<Match> {
        let created = self
            .directory
            .create_match(offer_id, request_id, allocation, MatchStatus::Pending)
            .await?;

        self.directory.recompute_offer_status(offer_id).await?;
        self.directory.recompute_request_status(request_id).await?;
        Ok(created)
    }

    async fn notify_rider(&self, request: &RideRequest) {
        let phone = match self.directory.find_user(request.rider_id).await {
            Ok(Some(user)) => user.phone,
            Ok(None) => {
                warn!(request_id = %request.id, "Rider not found, skipping notification");
                return;
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Rider lookup failed, skipping notification");
                return;
            }
        };

        debug!(request_id = %request.id, phone = %mask_phone(&phone), "Notifying rider of match");
        if let Err(e) = self.notifier.notify_rider(&phone).await {
            warn!(request_id = %request.id, phone = %mask_phone(&phone), error = %e, "Failed to notify rider");
        }
    }

    async fn notify_driver(&self, offer: &Offer) {
        let phone = match self.directory.find_user(offer.driver_id).await {
            Ok(Some(user)) => user.phone,
            Ok(None) => {
                warn!(offer_id = %offer.id, "Driver not found, skipping notification");
                return;
            }
            Err(e) => {
                warn!(offer_id = %offer.id, error = %e, "Driver lookup failed, skipping notification");
                return;
            }
        };

        debug!(offer_id = %offer.id, phone = %mask_phone(&phone), "Notifying driver of match");
        if let Err(e) = self.notifier.notify_driver(&phone).await {
            warn!(offer_id = %offer.id, phone = %mask_phone(&phone), error = %e, "Failed to notify driver");
        }
    }
}
