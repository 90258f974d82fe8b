use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::scoring::badges::Badge;
use crate::scoring::batch::ProgressBoard;
use crate::scoring::domain::{
    Atmosphere, BadgeId, Hotel, HotelId, HotelScores, PoolCriteria, SunExposure,
};
use crate::scoring::engine::{Criterion, ScoringWeight};
use crate::scoring::repository::{
    BadgeRepository, HotelRepository, RepositoryError, ScoreWrite, WeightRepository,
};
use crate::scoring::{RecalculationRunner, ScoringService};

/// Family resort used across scoring tests; 9.0 on every axis with uniform weights.
pub(super) fn resort_criteria() -> PoolCriteria {
    PoolCriteria {
        sunbed_to_guest_ratio: Some(1.0),
        sun_exposure: Some(SunExposure::AllDay),
        number_of_pools: 2,
        has_infinity_pool: true,
        atmosphere: Some(Atmosphere::Family),
        cleanliness_score: Some(5),
        maintenance_score: Some(5),
        has_kids_pool: true,
        has_kids_activities: true,
        ..PoolCriteria::default()
    }
}

/// Sparse party venue; sub-scores sum to 11.0 with uniform weights.
pub(super) fn party_criteria(pool_bar: bool) -> PoolCriteria {
    PoolCriteria {
        sunbed_to_guest_ratio: Some(0.1),
        sun_exposure: Some(SunExposure::Limited),
        number_of_pools: 0,
        atmosphere: Some(Atmosphere::Party),
        cleanliness_score: Some(1),
        maintenance_score: Some(1),
        has_pool_bar: pool_bar,
        ..PoolCriteria::default()
    }
}

pub(super) fn uniform_weights() -> Vec<ScoringWeight> {
    Criterion::ALL
        .into_iter()
        .map(|criterion| ScoringWeight::uniform(criterion, 1.0))
        .collect()
}

pub(super) fn scoring_config(progress_interval: usize) -> ScoringConfig {
    ScoringConfig {
        progress_interval,
        ..ScoringConfig::default()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryHotels {
    pub(super) hotels: Arc<Mutex<BTreeMap<HotelId, Hotel>>>,
    pub(super) criteria: Arc<Mutex<BTreeMap<HotelId, PoolCriteria>>>,
    pub(super) failing_updates: Arc<Mutex<HashSet<HotelId>>>,
    pub(super) score_writes: Arc<Mutex<Vec<HotelId>>>,
    pub(super) gate: Arc<Mutex<Option<WriteGate>>>,
}

/// Parks the first score write for one hotel until the test releases it.
pub(super) struct WriteGate {
    hotel_id: HotelId,
    reached: Sender<()>,
    resume: Receiver<()>,
}

/// Test side of a [`WriteGate`].
pub(super) struct GateHandle {
    reached: Receiver<()>,
    resume: Sender<()>,
}

impl GateHandle {
    /// Block until the gated write is parked.
    pub(super) fn wait_until_parked(&self) {
        self.reached
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("gated write reached");
    }

    pub(super) fn release(&self) {
        self.resume.send(()).expect("gated write still parked");
    }
}

impl MemoryHotels {
    pub(super) fn with_hotel(self, id: &str, criteria: Option<PoolCriteria>) -> Self {
        let hotel = Hotel::new(id, format!("Hotel {id}"));
        let hotel_id = hotel.id.clone();
        self.hotels
            .lock()
            .expect("hotel mutex poisoned")
            .insert(hotel_id.clone(), hotel);
        if let Some(criteria) = criteria {
            self.criteria
                .lock()
                .expect("criteria mutex poisoned")
                .insert(hotel_id, criteria);
        }
        self
    }

    pub(super) fn fail_updates_for(self, id: &str) -> Self {
        self.failing_updates
            .lock()
            .expect("failure mutex poisoned")
            .insert(HotelId(id.to_string()));
        self
    }

    /// Park the next score write for `id` before it touches the store.
    pub(super) fn pause_write_for(&self, id: &str) -> GateHandle {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        *self.gate.lock().expect("gate mutex poisoned") = Some(WriteGate {
            hotel_id: HotelId(id.to_string()),
            reached: reached_tx,
            resume: resume_rx,
        });
        GateHandle {
            reached: reached_rx,
            resume: resume_tx,
        }
    }

    fn pass_gate(&self, id: &HotelId) {
        let parked = {
            let mut gate = self.gate.lock().expect("gate mutex poisoned");
            if gate.as_ref().is_some_and(|gate| &gate.hotel_id == id) {
                gate.take()
            } else {
                None
            }
        };
        if let Some(gate) = parked {
            let _ = gate.reached.send(());
            let _ = gate.resume.recv();
        }
    }

    pub(super) fn hotel(&self, id: &str) -> Hotel {
        self.hotels
            .lock()
            .expect("hotel mutex poisoned")
            .get(&HotelId(id.to_string()))
            .cloned()
            .expect("hotel present")
    }

    pub(super) fn score_writes(&self) -> Vec<HotelId> {
        self.score_writes
            .lock()
            .expect("write log mutex poisoned")
            .clone()
    }
}

impl HotelRepository for MemoryHotels {
    fn hotel_ids(
        &self,
        only: Option<&BTreeSet<HotelId>>,
    ) -> Result<Vec<HotelId>, RepositoryError> {
        let guard = self.hotels.lock().expect("hotel mutex poisoned");
        Ok(guard
            .keys()
            .filter(|id| only.map(|only| only.contains(*id)).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn fetch(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError> {
        let guard = self.hotels.lock().expect("hotel mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert(&self, hotel: Hotel) -> Result<Hotel, RepositoryError> {
        let mut guard = self.hotels.lock().expect("hotel mutex poisoned");
        if guard.contains_key(&hotel.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(hotel.id.clone(), hotel.clone());
        Ok(hotel)
    }

    fn pool_criteria(&self, id: &HotelId) -> Result<Option<PoolCriteria>, RepositoryError> {
        let guard = self.criteria.lock().expect("criteria mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn upsert_pool_criteria(
        &self,
        id: &HotelId,
        criteria: PoolCriteria,
    ) -> Result<(), RepositoryError> {
        self.criteria
            .lock()
            .expect("criteria mutex poisoned")
            .insert(id.clone(), criteria);
        Ok(())
    }

    fn update_scores(
        &self,
        id: &HotelId,
        scores: HotelScores,
        basis: &PoolCriteria,
        computed_at: DateTime<Utc>,
    ) -> Result<ScoreWrite, RepositoryError> {
        self.pass_gate(id);
        if self
            .failing_updates
            .lock()
            .expect("failure mutex poisoned")
            .contains(id)
        {
            return Err(RepositoryError::Unavailable("deadlock detected".to_string()));
        }

        let criteria = self.criteria.lock().expect("criteria mutex poisoned");
        if criteria.get(id) != Some(basis) {
            return Ok(ScoreWrite::Stale);
        }
        let mut guard = self.hotels.lock().expect("hotel mutex poisoned");
        let hotel = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        hotel.apply_scores(scores, computed_at);
        self.score_writes
            .lock()
            .expect("write log mutex poisoned")
            .push(id.clone());
        Ok(ScoreWrite::Applied)
    }

    fn sync_badges(&self, id: &HotelId, badges: BTreeSet<BadgeId>) -> Result<(), RepositoryError> {
        let mut guard = self.hotels.lock().expect("hotel mutex poisoned");
        let hotel = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        hotel.badges = badges;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryWeights {
    pub(super) rows: Arc<Mutex<BTreeMap<Criterion, ScoringWeight>>>,
}

impl MemoryWeights {
    pub(super) fn with_rows(rows: Vec<ScoringWeight>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.rows.lock().expect("weight mutex poisoned");
            for row in rows {
                guard.insert(row.criterion, row);
            }
        }
        store
    }
}

impl WeightRepository for MemoryWeights {
    fn weights(&self) -> Result<Vec<ScoringWeight>, RepositoryError> {
        let guard = self.rows.lock().expect("weight mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn upsert_weight(&self, weight: ScoringWeight) -> Result<(), RepositoryError> {
        self.rows
            .lock()
            .expect("weight mutex poisoned")
            .insert(weight.criterion, weight);
        Ok(())
    }
}

pub(super) struct OfflineWeights;

impl WeightRepository for OfflineWeights {
    fn weights(&self) -> Result<Vec<ScoringWeight>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_weight(&self, _weight: ScoringWeight) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryBadges {
    pub(super) badges: Arc<Mutex<Vec<Badge>>>,
}

impl MemoryBadges {
    pub(super) fn with_badges(badges: Vec<Badge>) -> Self {
        Self {
            badges: Arc::new(Mutex::new(badges)),
        }
    }
}

impl BadgeRepository for MemoryBadges {
    fn badges(&self) -> Result<Vec<Badge>, RepositoryError> {
        Ok(self.badges.lock().expect("badge mutex poisoned").clone())
    }
}

pub(super) fn runner(
    hotels: MemoryHotels,
    weights: MemoryWeights,
    progress_interval: usize,
) -> RecalculationRunner<MemoryHotels, MemoryWeights> {
    RecalculationRunner::new(
        Arc::new(hotels),
        Arc::new(weights),
        ProgressBoard::new(),
        progress_interval,
    )
}

pub(super) fn build_service(
    hotels: MemoryHotels,
    config: &ScoringConfig,
) -> ScoringService<MemoryHotels, MemoryWeights, MemoryBadges> {
    ScoringService::new(
        Arc::new(hotels),
        Arc::new(MemoryWeights::with_rows(uniform_weights())),
        Arc::new(MemoryBadges::default()),
        config,
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
