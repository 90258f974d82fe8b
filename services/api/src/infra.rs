use metrics_exporter_prometheus::PrometheusHandle;
use pool_scoring::config::ScoringConfig;
use pool_scoring::scoring::{
    Atmosphere, Badge, BadgeField, BadgeId, BadgeRepository, BadgeRule, Criterion, Hotel,
    HotelId, HotelRepository, HotelScores, PoolCriteria, RepositoryError, RuleOperator,
    ScoreWrite, ScoringWeight, SunExposure, WeightError, WeightRepository, WeightSeedImporter,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreState {
    hotels: BTreeMap<HotelId, Hotel>,
    criteria: BTreeMap<HotelId, PoolCriteria>,
    weights: BTreeMap<Criterion, ScoringWeight>,
    badges: Vec<Badge>,
}

/// Process-local store backing every repository seam.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub(crate) fn with_weights(weights: Vec<ScoringWeight>) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.weights = weights
                .into_iter()
                .map(|row| (row.criterion, row))
                .collect();
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub(crate) fn define_badges(&self, badges: Vec<Badge>) -> Result<(), RepositoryError> {
        self.lock()?.badges = badges;
        Ok(())
    }

    /// Insert sample hotels along with their pool criteria.
    pub(crate) fn seed_hotels(
        &self,
        hotels: Vec<(Hotel, PoolCriteria)>,
    ) -> Result<usize, RepositoryError> {
        let mut seeded = 0;
        for (hotel, criteria) in hotels {
            let hotel = self.insert(hotel)?;
            self.upsert_pool_criteria(&hotel.id, criteria)?;
            seeded += 1;
        }
        Ok(seeded)
    }

    pub(crate) fn hotels(&self) -> Result<Vec<Hotel>, RepositoryError> {
        Ok(self.lock()?.hotels.values().cloned().collect())
    }
}

impl HotelRepository for InMemoryStore {
    fn hotel_ids(&self, only: Option<&BTreeSet<HotelId>>) -> Result<Vec<HotelId>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .hotels
            .keys()
            .filter(|id| only.map_or(true, |only| only.contains(*id)))
            .cloned()
            .collect())
    }

    fn fetch(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError> {
        Ok(self.lock()?.hotels.get(id).cloned())
    }

    fn insert(&self, hotel: Hotel) -> Result<Hotel, RepositoryError> {
        let mut state = self.lock()?;
        if state.hotels.contains_key(&hotel.id) {
            return Err(RepositoryError::Conflict);
        }
        state.hotels.insert(hotel.id.clone(), hotel.clone());
        Ok(hotel)
    }

    fn pool_criteria(&self, id: &HotelId) -> Result<Option<PoolCriteria>, RepositoryError> {
        Ok(self.lock()?.criteria.get(id).cloned())
    }

    fn upsert_pool_criteria(
        &self,
        id: &HotelId,
        criteria: PoolCriteria,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.hotels.contains_key(id) {
            return Err(RepositoryError::NotFound);
        }
        state.criteria.insert(id.clone(), criteria);
        Ok(())
    }

    fn update_scores(
        &self,
        id: &HotelId,
        scores: HotelScores,
        basis: &PoolCriteria,
        computed_at: DateTime<Utc>,
    ) -> Result<ScoreWrite, RepositoryError> {
        let mut state = self.lock()?;
        if state.criteria.get(id) != Some(basis) {
            return Ok(ScoreWrite::Stale);
        }
        let hotel = state.hotels.get_mut(id).ok_or(RepositoryError::NotFound)?;
        hotel.apply_scores(scores, computed_at);
        Ok(ScoreWrite::Applied)
    }

    fn sync_badges(&self, id: &HotelId, badges: BTreeSet<BadgeId>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let hotel = state.hotels.get_mut(id).ok_or(RepositoryError::NotFound)?;
        hotel.badges = badges;
        Ok(())
    }
}

impl WeightRepository for InMemoryStore {
    fn weights(&self) -> Result<Vec<ScoringWeight>, RepositoryError> {
        Ok(self.lock()?.weights.values().cloned().collect())
    }

    fn upsert_weight(&self, weight: ScoringWeight) -> Result<(), RepositoryError> {
        self.lock()?.weights.insert(weight.criterion, weight);
        Ok(())
    }
}

impl BadgeRepository for InMemoryStore {
    fn badges(&self) -> Result<Vec<Badge>, RepositoryError> {
        Ok(self.lock()?.badges.clone())
    }
}

/// Weight rows from the configured CSV seed, or the built-in defaults.
pub(crate) fn load_weights(config: &ScoringConfig) -> Result<Vec<ScoringWeight>, WeightError> {
    match &config.weights_path {
        Some(path) => {
            let rows = WeightSeedImporter::from_path(path)?;
            info!(path = %path.display(), rows = rows.len(), "loaded scoring weight seed");
            Ok(rows)
        }
        None => Ok(ScoringWeight::seed()),
    }
}

fn badge(slug: &str, name: &str, rules: Vec<BadgeRule>) -> Badge {
    Badge {
        id: BadgeId(slug.to_string()),
        slug: slug.to_string(),
        name: name.to_string(),
        is_active: true,
        rules,
    }
}

pub(crate) fn default_badges() -> Vec<Badge> {
    vec![
        badge(
            "sun-trap",
            "Sun Trap",
            vec![
                BadgeRule::new(BadgeField::SunExposure, RuleOperator::Eq, "all_day"),
                BadgeRule::new(BadgeField::SunbedToGuestRatio, RuleOperator::Gte, 0.75),
            ],
        ),
        badge(
            "family-splash",
            "Family Splash",
            vec![
                BadgeRule::new(BadgeField::FamilyScore, RuleOperator::Gte, 8.0),
                BadgeRule::new(BadgeField::HasKidsPool, RuleOperator::Eq, true),
            ],
        ),
        badge(
            "quiet-retreat",
            "Quiet Retreat",
            vec![BadgeRule::new(BadgeField::QuietScore, RuleOperator::Gte, 8.0)],
        ),
        badge(
            "pool-party",
            "Pool Party",
            vec![
                BadgeRule::new(
                    BadgeField::Atmosphere,
                    RuleOperator::In,
                    serde_json::json!(["party", "lively"]),
                ),
                BadgeRule::new(BadgeField::HasPoolBar, RuleOperator::Eq, true),
            ],
        ),
    ]
}

fn hotel(id: &str, name: &str, city: &str) -> Hotel {
    let mut hotel = Hotel::new(id, name);
    hotel.city = Some(city.to_string());
    hotel
}

pub(crate) fn sample_hotels() -> Vec<(Hotel, PoolCriteria)> {
    vec![
        (
            hotel("costa-azul", "Costa Azul Resort", "Alicante"),
            PoolCriteria {
                sunbed_to_guest_ratio: Some(1.0),
                sun_exposure: Some(SunExposure::AllDay),
                number_of_pools: 2,
                has_infinity_pool: true,
                has_kids_pool: true,
                has_kids_activities: true,
                has_lifeguard: true,
                atmosphere: Some(Atmosphere::Family),
                cleanliness_score: Some(5),
                maintenance_score: Some(5),
                ..PoolCriteria::default()
            },
        ),
        (
            hotel("casa-silencio", "Casa Silencio", "Palma"),
            PoolCriteria {
                sunbed_to_guest_ratio: Some(0.8),
                sun_exposure: Some(SunExposure::Afternoon),
                number_of_pools: 1,
                has_heated_pool: true,
                has_shade_areas: true,
                is_adults_only: true,
                atmosphere: Some(Atmosphere::Quiet),
                cleanliness_score: Some(5),
                maintenance_score: Some(4),
                ..PoolCriteria::default()
            },
        ),
        (
            hotel("sky-deck", "Sky Deck Hotel", "Ibiza"),
            PoolCriteria {
                sunbed_to_guest_ratio: Some(0.4),
                sun_exposure: Some(SunExposure::AllDay),
                number_of_pools: 1,
                has_rooftop_pool: true,
                has_pool_bar: true,
                has_swim_up_bar: true,
                atmosphere: Some(Atmosphere::Party),
                cleanliness_score: Some(4),
                maintenance_score: Some(3),
                ..PoolCriteria::default()
            },
        ),
        (
            hotel("harbour-inn", "Harbour Inn", "Valencia"),
            PoolCriteria {
                number_of_pools: 1,
                sun_exposure: Some(SunExposure::Limited),
                ..PoolCriteria::default()
            },
        ),
    ]
}
