use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::{
    Cancellation, CoreError, CoreResult, Directory, ExpirySweep, OfferCandidate, RequestCandidate,
};
use ridepool_shared::{
    Allocation, Match, MatchStatus, NeedSet, Offer, OfferStatus, RequestStatus, RideRequest,
    SeatPool, User,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory held in process memory.
///
/// Records are kept in insertion order so equal timestamps still sort
/// first-come first-served. Every call takes the table lock once, which makes
/// each read-check-write atomic. Status recomputation scans the matches of the
/// record, O(matches) per call.
#[derive(Default)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    offers: Vec<Offer>,
    requests: Vec<RideRequest>,
    matches: Vec<Match>,
}

impl Tables {
    fn offer(&self, id: Uuid) -> Option<&Offer> {
        self.offers.iter().find(|o| o.id == id)
    }

    fn offer_mut(&mut self, id: Uuid) -> Option<&mut Offer> {
        self.offers.iter_mut().find(|o| o.id == id)
    }

    fn request(&self, id: Uuid) -> Option<&RideRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    fn request_mut(&mut self, id: Uuid) -> Option<&mut RideRequest> {
        self.requests.iter_mut().find(|r| r.id == id)
    }

    /// Sum of allocations over matches that still hold capacity
    fn active_allocation<F>(&self, belongs: F) -> Allocation
    where
        F: Fn(&Match) -> bool,
    {
        let mut total = Allocation::default();
        for m in self.matches.iter().filter(|m| m.status.holds_capacity() && belongs(*m)) {
            total += &m.allocation;
        }
        total
    }

    fn remaining_seats(&self, offer: &Offer) -> SeatPool {
        let allocated = self.active_allocation(|m| m.offer_id == offer.id);
        offer.capacity().saturating_take(&allocated)
    }

    fn remaining_need(&self, request: &RideRequest) -> NeedSet {
        let allocated = self.active_allocation(|m| m.request_id == request.id);
        request.need().saturating_sub(&allocated.seated())
    }

    fn live_match_ids<F>(&self, belongs: F) -> Vec<Uuid>
    where
        F: Fn(&Match) -> bool,
    {
        self.matches
            .iter()
            .filter(|m| !m.status.is_terminal() && belongs(*m))
            .map(|m| m.id)
            .collect()
    }

    /// Cancel the given matches, returning the deduplicated counterpart ids
    fn cancel_matches<F>(&mut self, ids: &[Uuid], counterpart: F) -> Vec<Uuid>
    where
        F: Fn(&Match) -> Uuid,
    {
        let mut counterparts = Vec::new();
        for m in self.matches.iter_mut().filter(|m| ids.contains(&m.id)) {
            m.update_status(MatchStatus::Cancelled);
            let other = counterpart(m);
            if !counterparts.contains(&other) {
                counterparts.push(other);
            }
        }
        counterparts
    }
}

fn push_unique(ids: &mut Vec<Uuid>, id: Uuid) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn upsert_user(&self, user: User) -> CoreResult<User> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.users.iter_mut().find(|u| u.phone == user.phone) {
            if user.name.is_some() {
                existing.name = user.name;
            }
            if user.declared_gender.is_some() {
                existing.declared_gender = user.declared_gender;
            }
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        debug!(user_id = %user.id, "Creating user");
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> CoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn insert_offer(&self, offer: Offer) -> CoreResult<Offer> {
        let mut tables = self.tables.write().await;
        if tables.offer(offer.id).is_some() {
            return Err(CoreError::Validation(format!("Offer {} already exists", offer.id)));
        }
        tables.offers.push(offer.clone());
        Ok(offer)
    }

    async fn insert_request(&self, request: RideRequest) -> CoreResult<RideRequest> {
        let mut tables = self.tables.write().await;
        if tables.request(request.id).is_some() {
            return Err(CoreError::Validation(format!("Request {} already exists", request.id)));
        }
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn get_offer(&self, id: Uuid) -> CoreResult<Option<Offer>> {
        Ok(self.tables.read().await.offer(id).cloned())
    }

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<RideRequest>> {
        Ok(self.tables.read().await.request(id).cloned())
    }

    async fn get_match(&self, id: Uuid) -> CoreResult<Option<Match>> {
        let tables = self.tables.read().await;
        Ok(tables.matches.iter().find(|m| m.id == id).cloned())
    }

    async fn find_compatible_requests(&self, offer: &Offer) -> CoreResult<Vec<RequestCandidate>> {
        let tables = self.tables.read().await;

        let mut candidates: Vec<RequestCandidate> = tables
            .requests
            .iter()
            .filter(|r| {
                r.status.accepts_matches()
                    && r.direction == offer.direction
                    && r.window_contains(offer.departure_time)
            })
            .map(|r| RequestCandidate {
                request: r.clone(),
                remaining: tables.remaining_need(r),
            })
            .filter(|c| !c.remaining.is_empty())
            .collect();

        candidates.sort_by_key(|c| c.request.created_at);
        Ok(candidates)
    }

    async fn find_compatible_offers(&self, request: &RideRequest) -> CoreResult<Vec<OfferCandidate>> {
        let tables = self.tables.read().await;

        let mut candidates: Vec<OfferCandidate> = tables
            .offers
            .iter()
            .filter(|o| {
                o.status.accepts_matches()
                    && o.direction == request.direction
                    && request.window_contains(o.departure_time)
            })
            .map(|o| OfferCandidate {
                offer: o.clone(),
                remaining: tables.remaining_seats(o),
            })
            .filter(|c| !c.remaining.is_empty())
            .collect();

        candidates.sort_by_key(|c| (c.offer.departure_time, c.offer.created_at));
        Ok(candidates)
    }

    async fn create_match(
        &self,
        offer_id: Uuid,
        request_id: Uuid,
        allocation: Allocation,
        status: MatchStatus,
    ) -> CoreResult<Match> {
        let mut tables = self.tables.write().await;

        let offer = tables
            .offer(offer_id)
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer_id)))?;
        let request = tables
            .request(request_id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request_id)))?;

        if !offer.status.accepts_matches() || !request.status.accepts_matches() {
            return Err(CoreError::Validation(format!(
                "offer {} or request {} no longer accepts matches",
                offer_id, request_id
            )));
        }

        let seats = tables.remaining_seats(offer);
        if seats.checked_take(&allocation).is_none() {
            warn!(offer_id = %offer_id, ?seats, ?allocation, "Rejected match over offer capacity");
            return Err(CoreError::CapacityExceeded(format!("offer {}", offer_id)));
        }

        let need = tables.remaining_need(request);
        if !allocation.seated().fits_within(&need) {
            warn!(request_id = %request_id, ?need, ?allocation, "Rejected match over request need");
            return Err(CoreError::CapacityExceeded(format!("request {}", request_id)));
        }

        let created = Match::new(offer_id, request_id, allocation, status);
        tables.matches.push(created.clone());
        Ok(created)
    }

    async fn transition_match(&self, id: Uuid, to: MatchStatus) -> CoreResult<Match> {
        let mut tables = self.tables.write().await;

        let m = tables
            .matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("match {}", id)))?;

        if !m.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition { from: m.status, to });
        }

        m.update_status(to);
        Ok(m.clone())
    }

    async fn recompute_offer_status(&self, offer_id: Uuid) -> CoreResult<OfferStatus> {
        let mut tables = self.tables.write().await;

        let allocated = tables.active_allocation(|m| m.offer_id == offer_id).seats();
        let offer = tables
            .offer_mut(offer_id)
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer_id)))?;

        if offer.status == OfferStatus::Cancelled {
            return Ok(offer.status);
        }

        let total = offer.capacity().total();
        let status = OfferStatus::from_allocation(total, allocated);
        debug!(offer_id = %offer_id, total, allocated, ?status, "Calculated offer status");

        if offer.status != status {
            info!(offer_id = %offer_id, from = ?offer.status, to = ?status, "Updated offer status");
            offer.update_status(status);
        }
        Ok(status)
    }

    async fn recompute_request_status(&self, request_id: Uuid) -> CoreResult<RequestStatus> {
        let mut tables = self.tables.write().await;

        let seated = tables.active_allocation(|m| m.request_id == request_id).seats();
        let request = tables
            .request_mut(request_id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request_id)))?;

        if request.status == RequestStatus::Cancelled {
            return Ok(request.status);
        }

        let total = request.total_passengers();
        let status = RequestStatus::from_allocation(total, seated);
        debug!(request_id = %request_id, total, seated, ?status, "Calculated request status");

        if request.status != status {
            info!(request_id = %request_id, from = ?request.status, to = ?status, "Updated request status");
            request.update_status(status);
        }
        Ok(status)
    }

    async fn cancel_offer(&self, offer_id: Uuid) -> CoreResult<Cancellation> {
        let mut tables = self.tables.write().await;

        let offer = tables
            .offer_mut(offer_id)
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer_id)))?;
        offer.update_status(OfferStatus::Cancelled);

        let ids = tables.live_match_ids(|m| m.offer_id == offer_id);
        let counterparts = tables.cancel_matches(&ids, |m| m.request_id);

        Ok(Cancellation {
            cancelled_matches: ids.len(),
            counterparts,
        })
    }

    async fn cancel_request(&self, request_id: Uuid) -> CoreResult<Cancellation> {
        let mut tables = self.tables.write().await;

        let request = tables
            .request_mut(request_id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request_id)))?;
        request.update_status(RequestStatus::Cancelled);

        let ids = tables.live_match_ids(|m| m.request_id == request_id);
        let counterparts = tables.cancel_matches(&ids, |m| m.offer_id);

        Ok(Cancellation {
            cancelled_matches: ids.len(),
            counterparts,
        })
    }

    async fn bulk_expire_stale_matches(&self, cutoff: DateTime<Utc>) -> CoreResult<ExpirySweep> {
        let mut tables = self.tables.write().await;
        let mut sweep = ExpirySweep::default();

        for m in tables
            .matches
            .iter_mut()
            .filter(|m| MatchStatus::EXPIRABLE.contains(&m.status) && m.created_at < cutoff)
        {
            m.update_status(MatchStatus::Expired);
            sweep.expired += 1;
            push_unique(&mut sweep.offer_ids, m.offer_id);
            push_unique(&mut sweep.request_ids, m.request_id);
        }

        Ok(sweep)
    }

    async fn active_offers_for_driver(&self, driver_id: Uuid, now: DateTime<Utc>) -> CoreResult<Vec<Offer>> {
        let tables = self.tables.read().await;

        let mut offers: Vec<Offer> = tables
            .offers
            .iter()
            .filter(|o| o.driver_id == driver_id && o.status.accepts_matches() && o.departure_time >= now)
            .cloned()
            .collect();

        offers.sort_by_key(|o| o.departure_time);
        Ok(offers)
    }

    async fn active_requests_for_rider(&self, rider_id: Uuid, now: DateTime<Utc>) -> CoreResult<Vec<RideRequest>> {
        let tables = self.tables.read().await;

        let mut requests: Vec<RideRequest> = tables
            .requests
            .iter()
            .filter(|r| r.rider_id == rider_id && r.status.accepts_matches() && r.latest_time >= now)
            .cloned()
            .collect();

        requests.sort_by_key(|r| r.latest_time);
        Ok(requests)
    }

    async fn pending_matches_for_rider(&self, rider_id: Uuid) -> CoreResult<Vec<Match>> {
        let tables = self.tables.read().await;

        let request_ids: Vec<Uuid> = tables
            .requests
            .iter()
            .filter(|r| r.rider_id == rider_id && r.status != RequestStatus::Cancelled)
            .map(|r| r.id)
            .collect();

        Ok(pending_matches(&tables.matches, |m| request_ids.contains(&m.request_id)))
    }

    async fn pending_matches_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Match>> {
        let tables = self.tables.read().await;

        let offer_ids: Vec<Uuid> = tables
            .offers
            .iter()
            .filter(|o| o.driver_id == driver_id && o.status != OfferStatus::Cancelled)
            .map(|o| o.id)
            .collect();

        Ok(pending_matches(&tables.matches, |m| offer_ids.contains(&m.offer_id)))
    }

    async fn last_offer_by_driver(&self, driver_id: Uuid) -> CoreResult<Option<Offer>> {
        let tables = self.tables.read().await;
        Ok(tables.offers.iter().rev().find(|o| o.driver_id == driver_id).cloned())
    }

    async fn last_request_by_rider(&self, rider_id: Uuid) -> CoreResult<Option<RideRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.iter().rev().find(|r| r.rider_id == rider_id).cloned())
    }
}

/// Pending, notified or connected matches, oldest first
fn pending_matches<F>(matches: &[Match], belongs: F) -> Vec<Match>
where
    F: Fn(&Match) -> bool,
{
    let mut list: Vec<Match> = matches
        .iter()
        .filter(|m| {
            matches!(
                m.status,
                MatchStatus::Pending | MatchStatus::Notified | MatchStatus::Connected
            ) && belongs(*m)
        })
        .cloned()
        .collect();

    list.sort_by_key(|m| m.created_at);
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ridepool_shared::{Direction, Passengers};

    struct Seeded {
        offer: Offer,
        request: RideRequest,
    }

    async fn seed(directory: &InMemoryDirectory, seats: SeatPool, passengers: Passengers) -> Seeded {
        let departure = Utc::now() + Duration::hours(4);
        let offer = Offer::new(Uuid::new_v4(), Direction::To, departure, seats).unwrap();
        let request = RideRequest::new(
            Uuid::new_v4(),
            Direction::To,
            departure - Duration::minutes(30),
            departure + Duration::minutes(30),
            passengers,
            false,
        )
        .unwrap();

        Seeded {
            offer: directory.insert_offer(offer).await.unwrap(),
            request: directory.insert_request(request).await.unwrap(),
        }
    }

    fn male_seats(count: u32) -> Allocation {
        Allocation {
            male: count,
            single_males: count,
            ..Allocation::default()
        }
    }

    #[tokio::test]
    async fn test_create_match_rejects_over_capacity() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            male: 3,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(2, 0, 0), passengers).await;

        directory
            .create_match(s.offer.id, s.request.id, male_seats(2), MatchStatus::Pending)
            .await
            .unwrap();

        let err = directory
            .create_match(s.offer.id, s.request.id, male_seats(1), MatchStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded(_)));
    }

    #[tokio::test]
    async fn test_create_match_rejects_over_need() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            male: 1,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(3, 0, 0), passengers).await;

        let err = directory
            .create_match(s.offer.id, s.request.id, male_seats(2), MatchStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded(_)));
    }

    #[tokio::test]
    async fn test_candidates_exclude_settled_records() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            male: 1,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(1, 0, 1), passengers).await;

        assert_eq!(directory.find_compatible_requests(&s.offer).await.unwrap().len(), 1);

        directory
            .create_match(s.offer.id, s.request.id, male_seats(1), MatchStatus::Pending)
            .await
            .unwrap();
        directory.recompute_request_status(s.request.id).await.unwrap();

        assert!(directory.find_compatible_requests(&s.offer).await.unwrap().is_empty());

        let other = RideRequest::new(
            Uuid::new_v4(),
            Direction::To,
            s.request.earliest_time,
            s.request.latest_time,
            passengers,
            true,
        )
        .unwrap();
        let offers = directory.find_compatible_offers(&other).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].remaining, SeatPool::new(0, 0, 1));
    }

    #[tokio::test]
    async fn test_direction_and_window_filter() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            female: 1,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(0, 1, 0), passengers).await;

        let mut reverse = s.offer.clone();
        reverse.direction = Direction::From;
        assert!(directory.find_compatible_requests(&reverse).await.unwrap().is_empty());

        let mut late = s.offer.clone();
        late.departure_time = s.request.latest_time + Duration::minutes(1);
        assert!(directory.find_compatible_requests(&late).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_user_merges_by_phone() {
        let directory = InMemoryDirectory::new();
        let first = directory.upsert_user(User::new("0501234567".into())).await.unwrap();
        let second = directory
            .upsert_user(User::new("0501234567".into()).with_name("Dana"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Dana"));
        assert!(directory.find_user_by_phone("0509999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_expire_reports_owners_once() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            male: 2,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(2, 0, 0), passengers).await;

        for _ in 0..2 {
            directory
                .create_match(s.offer.id, s.request.id, male_seats(1), MatchStatus::Pending)
                .await
                .unwrap();
        }

        let sweep = directory
            .bulk_expire_stale_matches(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(sweep.expired, 2);
        assert_eq!(sweep.offer_ids, vec![s.offer.id]);
        assert_eq!(sweep.request_ids, vec![s.request.id]);
    }

    #[tokio::test]
    async fn test_cancelled_status_survives_recompute() {
        let directory = InMemoryDirectory::new();
        let passengers = Passengers {
            male: 1,
            ..Passengers::default()
        };
        let s = seed(&directory, SeatPool::new(1, 0, 0), passengers).await;

        directory.cancel_offer(s.offer.id).await.unwrap();
        assert_eq!(
            directory.recompute_offer_status(s.offer.id).await.unwrap(),
            OfferStatus::Cancelled
        );
    }
}
