use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ridepool_core::{CoreError, Directory, Notifier};
use ridepool_match::{MatchEngine, MatchLifecycle};
use ridepool_shared::pii::{mask_phone, validate_phone};
use ridepool_shared::{
    Direction, Gender, Match, ModelError, Offer, Passengers, RideRequest, SeatPool, User,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// A driver's ride as entered by the caller
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub phone: String,
    pub direction: Direction,
    pub departure_time: DateTime<Utc>,
    pub seats: SeatPool,
    pub notes: Option<String>,
}

/// A rider's need as entered by the caller
#[derive(Debug, Clone)]
pub struct NewRideRequest {
    pub phone: String,
    pub direction: Direction,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
    pub preferred_time: Option<DateTime<Utc>>,
    pub passengers: Passengers,
    pub must_travel_together: bool,
    pub notes: Option<String>,
}

/// A stored offer or request, with its status after matching, and the matches it produced
#[derive(Debug, Clone)]
pub struct Posted<T> {
    pub record: T,
    pub matches: Vec<Match>,
}

/// Entry point for callers: posting, cancelling, responding and listing.
///
/// Every mutating call runs under one in-process gate, so two matching runs
/// never see the same candidate snapshot and a cancellation never lands in the
/// middle of a run. Reads skip the gate.
#[derive(Clone)]
pub struct RideService {
    directory: Arc<dyn Directory>,
    engine: MatchEngine,
    lifecycle: MatchLifecycle,
    gate: Arc<Mutex<()>>,
}

impl RideService {
    pub fn new(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>, match_ttl: Duration) -> Self {
        Self {
            engine: MatchEngine::new(directory.clone(), notifier),
            lifecycle: MatchLifecycle::new(directory.clone(), match_ttl),
            directory,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn lifecycle(&self) -> &MatchLifecycle {
        &self.lifecycle
    }

    /// Create or update a caller's profile
    pub async fn register_user(
        &self,
        phone: &str,
        name: Option<String>,
        gender: Option<Gender>,
    ) -> ServiceResult<User> {
        let phone = validate_phone(phone)?;
        let mut user = User::new(phone);
        user.name = name;
        user.declared_gender = gender;

        let user = self.directory.upsert_user(user).await?;
        info!(user_id = %user.id, phone = %mask_phone(&user.phone), "Registered user");
        Ok(user)
    }

    /// Look up a caller, creating a bare entry on first contact
    async fn ensure_user(&self, phone: &str) -> ServiceResult<User> {
        let phone = validate_phone(phone)?;

        match self.directory.find_user_by_phone(&phone).await? {
            Some(user) if !user.is_allowed => {
                warn!(user_id = %user.id, "Blocked caller tried to post");
                Err(ServiceError::CallerNotAllowed(mask_phone(&phone)))
            }
            Some(user) => Ok(user),
            None => Ok(self.directory.upsert_user(User::new(phone)).await?),
        }
    }

    async fn known_user(&self, phone: &str) -> ServiceResult<Option<User>> {
        let phone = validate_phone(phone)?;
        Ok(self.directory.find_user_by_phone(&phone).await?)
    }

    pub async fn post_offer(&self, new: NewOffer, now: DateTime<Utc>) -> ServiceResult<Posted<Offer>> {
        let _guard = self.gate.lock().await;
        self.post_offer_locked(new, now).await
    }

    async fn post_offer_locked(&self, new: NewOffer, now: DateTime<Utc>) -> ServiceResult<Posted<Offer>> {
        if new.departure_time < now {
            return Err(ModelError::InThePast("departure_time".into()).into());
        }

        let driver = self.ensure_user(&new.phone).await?;
        let offer = Offer::new(driver.id, new.direction, new.departure_time, new.seats)?
            .with_notes(new.notes);
        let offer = self.directory.insert_offer(offer).await?;
        info!(
            offer_id = %offer.id,
            driver_id = %driver.id,
            seats = offer.capacity().total(),
            direction = ?offer.direction,
            "Offer posted"
        );

        let candidates = self.directory.find_compatible_requests(&offer).await?;
        let matches = self.engine.match_against_requests(&offer, candidates).await?;

        let record = self
            .directory
            .get_offer(offer.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer.id)))?;
        Ok(Posted { record, matches })
    }

    pub async fn post_request(&self, new: NewRideRequest, now: DateTime<Utc>) -> ServiceResult<Posted<RideRequest>> {
        let _guard = self.gate.lock().await;
        self.post_request_locked(new, now).await
    }

    async fn post_request_locked(
        &self,
        new: NewRideRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<Posted<RideRequest>> {
        if new.latest_time < now {
            return Err(ModelError::InThePast("latest_time".into()).into());
        }

        let rider = self.ensure_user(&new.phone).await?;
        let mut request = RideRequest::new(
            rider.id,
            new.direction,
            new.earliest_time,
            new.latest_time,
            new.passengers,
            new.must_travel_together,
        )?
        .with_notes(new.notes);
        if let Some(preferred) = new.preferred_time {
            request = request.with_preferred_time(preferred)?;
        }

        let request = self.directory.insert_request(request).await?;
        info!(
            request_id = %request.id,
            rider_id = %rider.id,
            passengers = request.total_passengers(),
            together = request.must_travel_together,
            direction = ?request.direction,
            "Request posted"
        );

        let candidates = self.directory.find_compatible_offers(&request).await?;
        let matches = self.engine.match_against_offers(&request, candidates).await?;

        let record = self
            .directory
            .get_request(request.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request.id)))?;
        Ok(Posted { record, matches })
    }

    /// Cancel one of the caller's offers; returns the number of matches cancelled
    pub async fn cancel_offer(&self, phone: &str, offer_id: Uuid) -> ServiceResult<usize> {
        let _guard = self.gate.lock().await;

        let offer = self
            .directory
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer_id)))?;
        let caller = self.known_user(phone).await?;
        if caller.map(|u| u.id) != Some(offer.driver_id) {
            return Err(ServiceError::NotOwner(format!("offer {}", offer_id)));
        }

        Ok(self.lifecycle.cancel_offer(offer_id).await?)
    }

    /// Cancel one of the caller's requests; returns the number of matches cancelled
    pub async fn cancel_request(&self, phone: &str, request_id: Uuid) -> ServiceResult<usize> {
        let _guard = self.gate.lock().await;

        let request = self
            .directory
            .get_request(request_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request_id)))?;
        let caller = self.known_user(phone).await?;
        if caller.map(|u| u.id) != Some(request.rider_id) {
            return Err(ServiceError::NotOwner(format!("request {}", request_id)));
        }

        Ok(self.lifecycle.cancel_request(request_id).await?)
    }

    pub async fn mark_notified(&self, match_id: Uuid) -> ServiceResult<Match> {
        let _guard = self.gate.lock().await;
        Ok(self.lifecycle.mark_notified(match_id).await?)
    }

    pub async fn mark_connected(&self, match_id: Uuid) -> ServiceResult<Match> {
        let _guard = self.gate.lock().await;
        Ok(self.lifecycle.mark_connected(match_id).await?)
    }

    pub async fn accept(&self, match_id: Uuid) -> ServiceResult<Match> {
        let _guard = self.gate.lock().await;
        Ok(self.lifecycle.accept(match_id).await?)
    }

    pub async fn decline(&self, match_id: Uuid) -> ServiceResult<Match> {
        let _guard = self.gate.lock().await;
        Ok(self.lifecycle.decline(match_id).await?)
    }

    /// Repost the caller's most recent offer at a new departure time
    pub async fn duplicate_last_offer(
        &self,
        phone: &str,
        departure_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Posted<Offer>> {
        let _guard = self.gate.lock().await;

        let last = match self.known_user(phone).await? {
            Some(user) => self.directory.last_offer_by_driver(user.id).await?,
            None => None,
        };
        let last = last.ok_or_else(|| ServiceError::NothingToDuplicate(mask_phone(phone)))?;

        let new = NewOffer {
            phone: phone.to_string(),
            direction: last.direction,
            departure_time,
            seats: last.seats,
            notes: last.notes,
        };
        self.post_offer_locked(new, now).await
    }

    /// Repost the caller's most recent request with a new window.
    ///
    /// The old preferred time is dropped, it rarely fits the new window.
    pub async fn duplicate_last_request(
        &self,
        phone: &str,
        earliest_time: DateTime<Utc>,
        latest_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Posted<RideRequest>> {
        let _guard = self.gate.lock().await;

        let last = match self.known_user(phone).await? {
            Some(user) => self.directory.last_request_by_rider(user.id).await?,
            None => None,
        };
        let last = last.ok_or_else(|| ServiceError::NothingToDuplicate(mask_phone(phone)))?;

        let new = NewRideRequest {
            phone: phone.to_string(),
            direction: last.direction,
            earliest_time,
            latest_time,
            preferred_time: None,
            passengers: last.passengers(),
            must_travel_together: last.must_travel_together,
            notes: last.notes,
        };
        self.post_request_locked(new, now).await
    }

    pub async fn active_offers(&self, phone: &str, now: DateTime<Utc>) -> ServiceResult<Vec<Offer>> {
        match self.known_user(phone).await? {
            Some(user) => Ok(self.directory.active_offers_for_driver(user.id, now).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn active_requests(&self, phone: &str, now: DateTime<Utc>) -> ServiceResult<Vec<RideRequest>> {
        match self.known_user(phone).await? {
            Some(user) => Ok(self.directory.active_requests_for_rider(user.id, now).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Matches awaiting an answer on the caller's requests
    pub async fn pending_matches_as_rider(&self, phone: &str) -> ServiceResult<Vec<Match>> {
        match self.known_user(phone).await? {
            Some(user) => Ok(self.directory.pending_matches_for_rider(user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Matches awaiting an answer on the caller's offers
    pub async fn pending_matches_as_driver(&self, phone: &str) -> ServiceResult<Vec<Match>> {
        match self.known_user(phone).await? {
            Some(user) => Ok(self.directory.pending_matches_for_driver(user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn expire_stale(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let _guard = self.gate.lock().await;
        Ok(self.lifecycle.expire_stale(now).await?)
    }
}
