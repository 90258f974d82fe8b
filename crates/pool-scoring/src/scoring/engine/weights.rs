use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scoring::domain::ScoreAxis;
use crate::scoring::repository::{RepositoryError, WeightRepository};

/// Weight applied when a criterion has no active row.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// The six scored facets of a pool offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    SunbedRatio,
    SunExposure,
    PoolVariety,
    Atmosphere,
    Cleanliness,
    FamilyFeatures,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::SunbedRatio,
        Criterion::SunExposure,
        Criterion::PoolVariety,
        Criterion::Atmosphere,
        Criterion::Cleanliness,
        Criterion::FamilyFeatures,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Criterion::SunbedRatio => "sunbed_ratio",
            Criterion::SunExposure => "sun_exposure",
            Criterion::PoolVariety => "pool_variety",
            Criterion::Atmosphere => "atmosphere",
            Criterion::Cleanliness => "cleanliness",
            Criterion::FamilyFeatures => "family_features",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|criterion| criterion.key() == normalized)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Admin-editable configuration row for one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeight {
    pub criterion: Criterion,
    pub weight: f64,
    pub family_weight: f64,
    pub quiet_weight: f64,
    pub party_weight: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl ScoringWeight {
    pub fn uniform(criterion: Criterion, value: f64) -> Self {
        Self {
            criterion,
            weight: value,
            family_weight: value,
            quiet_weight: value,
            party_weight: value,
            is_active: true,
        }
    }

    pub fn coefficient(&self, axis: ScoreAxis) -> f64 {
        match axis {
            ScoreAxis::Overall => self.weight,
            ScoreAxis::Family => self.family_weight,
            ScoreAxis::Quiet => self.quiet_weight,
            ScoreAxis::Party => self.party_weight,
        }
    }

    /// Coefficients must be finite and non-negative.
    pub fn validate(&self) -> Result<(), WeightError> {
        for axis in ScoreAxis::ALL {
            let value = self.coefficient(axis);
            if !value.is_finite() {
                return Err(WeightError::NonFinite {
                    criterion: self.criterion,
                    axis,
                });
            }
            if value < 0.0 {
                return Err(WeightError::Negative {
                    criterion: self.criterion,
                    axis,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Rows installed on a fresh deployment.
    pub fn seed() -> Vec<ScoringWeight> {
        let row = |criterion, weight, family_weight, quiet_weight, party_weight| ScoringWeight {
            criterion,
            weight,
            family_weight,
            quiet_weight,
            party_weight,
            is_active: true,
        };

        vec![
            row(Criterion::SunbedRatio, 1.5, 1.0, 1.2, 0.8),
            row(Criterion::SunExposure, 1.2, 1.0, 1.0, 1.2),
            row(Criterion::PoolVariety, 1.0, 1.2, 0.6, 1.0),
            row(Criterion::Atmosphere, 1.0, 1.0, 1.5, 1.5),
            row(Criterion::Cleanliness, 1.3, 1.3, 1.2, 0.8),
            row(Criterion::FamilyFeatures, 0.8, 2.0, 0.3, 0.2),
        ]
    }
}

/// Rejected weight rows and seed files.
#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("{criterion} {axis:?} weight must be non-negative (found {value})")]
    Negative {
        criterion: Criterion,
        axis: ScoreAxis,
        value: f64,
    },
    #[error("{criterion} {axis:?} weight must be a finite number")]
    NonFinite { criterion: Criterion, axis: ScoreAxis },
    #[error("unknown scoring criterion '{0}'")]
    UnknownCriterion(String),
    #[error("failed to read weight seed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid weight seed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Snapshot of the active weight rows. Loaded once per run so every hotel in
/// a batch is scored against the same coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    rows: BTreeMap<Criterion, ScoringWeight>,
}

impl WeightTable {
    pub fn load<W>(repository: &W) -> Result<Self, RepositoryError>
    where
        W: WeightRepository + ?Sized,
    {
        Ok(Self::from_rows(repository.weights()?))
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = ScoringWeight>,
    {
        let rows = rows
            .into_iter()
            .filter(|row| row.is_active)
            .map(|row| (row.criterion, row))
            .collect();
        Self { rows }
    }

    pub fn weight_for(&self, criterion: Criterion, axis: ScoreAxis) -> f64 {
        self.rows
            .get(&criterion)
            .map(|row| row.coefficient(axis))
            .unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn rows(&self) -> impl Iterator<Item = &ScoringWeight> {
        self.rows.values()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct WeightSeedRecord {
    criterion: String,
    weight: f64,
    family_weight: f64,
    quiet_weight: f64,
    party_weight: f64,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Parses `criterion,weight,family_weight,quiet_weight,party_weight,is_active`
/// seed files.
pub struct WeightSeedImporter;

impl WeightSeedImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ScoringWeight>, WeightError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ScoringWeight>, WeightError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<WeightSeedRecord>() {
            let record = record?;
            let criterion = Criterion::from_key(&record.criterion)
                .ok_or_else(|| WeightError::UnknownCriterion(record.criterion.clone()))?;
            let row = ScoringWeight {
                criterion,
                weight: record.weight,
                family_weight: record.family_weight,
                quiet_weight: record.quiet_weight,
                party_weight: record.party_weight,
                is_active: record.is_active,
            };
            row.validate()?;
            rows.push(row);
        }

        Ok(rows)
    }
}
