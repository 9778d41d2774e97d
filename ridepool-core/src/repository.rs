use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_shared::{
    Allocation, Match, MatchStatus, NeedSet, Offer, OfferStatus, RequestStatus, RideRequest,
    SeatPool, User,
};
use uuid::Uuid;

use crate::CoreResult;

/// An open request together with the need its active matches leave uncovered
#[derive(Debug, Clone)]
pub struct RequestCandidate {
    pub request: RideRequest,
    pub remaining: NeedSet,
}

/// An active offer together with the seats its active matches leave free
#[derive(Debug, Clone)]
pub struct OfferCandidate {
    pub offer: Offer,
    pub remaining: SeatPool,
}

/// Result of cancelling an offer or request
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    pub cancelled_matches: usize,
    /// Records on the other side of the cancelled matches, deduplicated
    pub counterparts: Vec<Uuid>,
}

/// Result of a bulk expiry pass
#[derive(Debug, Clone, Default)]
pub struct ExpirySweep {
    pub expired: usize,
    pub offer_ids: Vec<Uuid>,
    pub request_ids: Vec<Uuid>,
}

/// Persistence and query of users, offers, requests and matches.
///
/// Every mutating call is atomic per record: status changes are applied as
/// compare-and-set against the current status, so concurrent callers cannot
/// both win the same transition.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Insert or update a user keyed by phone
    async fn upsert_user(&self, user: User) -> CoreResult<User>;

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn find_user_by_phone(&self, phone: &str) -> CoreResult<Option<User>>;

    async fn insert_offer(&self, offer: Offer) -> CoreResult<Offer>;

    async fn insert_request(&self, request: RideRequest) -> CoreResult<RideRequest>;

    async fn get_offer(&self, id: Uuid) -> CoreResult<Option<Offer>>;

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<RideRequest>>;

    async fn get_match(&self, id: Uuid) -> CoreResult<Option<Match>>;

    /// Open or partial requests in the offer's direction whose window contains
    /// its departure, oldest first
    async fn find_compatible_requests(&self, offer: &Offer) -> CoreResult<Vec<RequestCandidate>>;

    /// Active or partial offers in the request's direction departing within its
    /// window, by departure time then creation time
    async fn find_compatible_offers(&self, request: &RideRequest) -> CoreResult<Vec<OfferCandidate>>;

    async fn create_match(
        &self,
        offer_id: Uuid,
        request_id: Uuid,
        allocation: Allocation,
        status: MatchStatus,
    ) -> CoreResult<Match>;

    /// Move a match to `to` if the lifecycle allows it from its current status
    async fn transition_match(&self, id: Uuid, to: MatchStatus) -> CoreResult<Match>;

    /// Re-derive and persist the offer status from its active matches
    async fn recompute_offer_status(&self, offer_id: Uuid) -> CoreResult<OfferStatus>;

    /// Re-derive and persist the request status from its active matches
    async fn recompute_request_status(&self, request_id: Uuid) -> CoreResult<RequestStatus>;

    /// Mark the offer cancelled and cancel its non-terminal matches
    async fn cancel_offer(&self, offer_id: Uuid) -> CoreResult<Cancellation>;

    /// Mark the request cancelled and cancel its non-terminal matches
    async fn cancel_request(&self, request_id: Uuid) -> CoreResult<Cancellation>;

    /// Expire pending and notified matches created before `cutoff`
    async fn bulk_expire_stale_matches(&self, cutoff: DateTime<Utc>) -> CoreResult<ExpirySweep>;

    /// Active offers of a driver departing after `now`, soonest first
    async fn active_offers_for_driver(&self, driver_id: Uuid, now: DateTime<Utc>) -> CoreResult<Vec<Offer>>;

    /// Open or partial requests of a rider whose window ends after `now`
    async fn active_requests_for_rider(&self, rider_id: Uuid, now: DateTime<Utc>) -> CoreResult<Vec<RideRequest>>;

    /// Pending, notified or connected matches on the rider's live requests
    async fn pending_matches_for_rider(&self, rider_id: Uuid) -> CoreResult<Vec<Match>>;

    /// Pending, notified or connected matches on the driver's live offers
    async fn pending_matches_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Match>>;

    async fn last_offer_by_driver(&self, driver_id: Uuid) -> CoreResult<Option<Offer>>;

    async fn last_request_by_rider(&self, rider_id: Uuid) -> CoreResult<Option<RideRequest>>;
}
