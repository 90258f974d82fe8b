//! Badge definitions and the rule predicates matched against hotels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{BadgeId, Hotel, PoolCriteria};

const NUMERIC_TOLERANCE: f64 = 1e-9;

/// Admin-defined badge. A badge applies when every rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: BadgeId,
    pub slug: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub rules: Vec<BadgeRule>,
}

fn default_active() -> bool {
    true
}

impl Badge {
    /// Inactive badges and badges without rules never match.
    pub fn matches(&self, hotel: &Hotel, criteria: Option<&PoolCriteria>) -> bool {
        self.is_active
            && !self.rules.is_empty()
            && self.rules.iter().all(|rule| rule.matches(hotel, criteria))
    }
}

/// One `field operator value` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeRule {
    pub field: BadgeField,
    pub operator: RuleOperator,
    pub value: Value,
}

impl BadgeRule {
    pub fn new(field: BadgeField, operator: RuleOperator, value: impl Into<Value>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, hotel: &Hotel, criteria: Option<&PoolCriteria>) -> bool {
        let Some(actual) = self.field.resolve(hotel, criteria) else {
            return false;
        };

        match self.operator {
            RuleOperator::Eq => actual.equals(&self.value),
            RuleOperator::Ne => !actual.equals(&self.value),
            RuleOperator::Gt => actual.compare(&self.value, |a, b| a > b + NUMERIC_TOLERANCE),
            RuleOperator::Gte => actual.compare(&self.value, |a, b| a + NUMERIC_TOLERANCE >= b),
            RuleOperator::Lt => actual.compare(&self.value, |a, b| a + NUMERIC_TOLERANCE < b),
            RuleOperator::Lte => actual.compare(&self.value, |a, b| a <= b + NUMERIC_TOLERANCE),
            RuleOperator::In => match &self.value {
                Value::Array(options) => options.iter().any(|option| actual.equals(option)),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "=", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "in")]
    In,
}

/// Hotel and pool criteria attributes a rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeField {
    OverallScore,
    FamilyScore,
    QuietScore,
    PartyScore,
    SunbedToGuestRatio,
    SunExposure,
    SunHours,
    NumberOfPools,
    HasInfinityPool,
    HasRooftopPool,
    HasHeatedPool,
    HasKidsPool,
    HasLazyRiver,
    HasPoolBar,
    HasSwimUpBar,
    HasLifeguard,
    HasKidsActivities,
    HasPoolToys,
    HasChangingFacilities,
    HasTowelService,
    HasCabanas,
    HasShadeAreas,
    HasWaterSlides,
    IsAdultsOnly,
    Atmosphere,
    CleanlinessScore,
    MaintenanceScore,
}

/// Resolved attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(&'static str),
}

impl FieldValue {
    fn equals(&self, expected: &Value) -> bool {
        match (self, expected) {
            (FieldValue::Number(actual), _) => numeric(expected)
                .map(|expected| (actual - expected).abs() <= NUMERIC_TOLERANCE)
                .unwrap_or(false),
            (FieldValue::Flag(actual), Value::Bool(expected)) => actual == expected,
            (FieldValue::Flag(actual), Value::Number(number)) => {
                number.as_f64().map(|n| (n != 0.0) == *actual).unwrap_or(false)
            }
            (FieldValue::Text(actual), Value::String(expected)) => {
                actual.eq_ignore_ascii_case(expected.trim())
            }
            _ => false,
        }
    }

    fn compare(&self, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
        match (self, numeric(expected)) {
            (FieldValue::Number(actual), Some(expected)) => cmp(*actual, expected),
            _ => false,
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl BadgeField {
    /// `None` when the attribute is unknown for this hotel.
    pub fn resolve(&self, hotel: &Hotel, criteria: Option<&PoolCriteria>) -> Option<FieldValue> {
        let number = |value: Option<f64>| value.map(FieldValue::Number);

        match self {
            BadgeField::OverallScore => return number(hotel.overall_score),
            BadgeField::FamilyScore => return number(hotel.family_score),
            BadgeField::QuietScore => return number(hotel.quiet_score),
            BadgeField::PartyScore => return number(hotel.party_score),
            _ => {}
        }

        let criteria = criteria?;
        let flag = |value: bool| Some(FieldValue::Flag(value));

        match self {
            BadgeField::SunbedToGuestRatio => number(criteria.sunbed_to_guest_ratio),
            BadgeField::SunExposure => criteria
                .sun_exposure
                .map(|exposure| FieldValue::Text(exposure.label())),
            BadgeField::SunHours => number(criteria.sun_hours.map(f64::from)),
            BadgeField::NumberOfPools => number(Some(criteria.number_of_pools as f64)),
            BadgeField::HasInfinityPool => flag(criteria.has_infinity_pool),
            BadgeField::HasRooftopPool => flag(criteria.has_rooftop_pool),
            BadgeField::HasHeatedPool => flag(criteria.has_heated_pool),
            BadgeField::HasKidsPool => flag(criteria.has_kids_pool),
            BadgeField::HasLazyRiver => flag(criteria.has_lazy_river),
            BadgeField::HasPoolBar => flag(criteria.has_pool_bar),
            BadgeField::HasSwimUpBar => flag(criteria.has_swim_up_bar),
            BadgeField::HasLifeguard => flag(criteria.has_lifeguard),
            BadgeField::HasKidsActivities => flag(criteria.has_kids_activities),
            BadgeField::HasPoolToys => flag(criteria.has_pool_toys),
            BadgeField::HasChangingFacilities => flag(criteria.has_changing_facilities),
            BadgeField::HasTowelService => flag(criteria.has_towel_service),
            BadgeField::HasCabanas => flag(criteria.has_cabanas),
            BadgeField::HasShadeAreas => flag(criteria.has_shade_areas),
            BadgeField::HasWaterSlides => flag(criteria.has_water_slides),
            BadgeField::IsAdultsOnly => flag(criteria.is_adults_only),
            BadgeField::Atmosphere => criteria
                .atmosphere
                .map(|atmosphere| FieldValue::Text(atmosphere.label())),
            BadgeField::CleanlinessScore => number(criteria.cleanliness_score.map(f64::from)),
            BadgeField::MaintenanceScore => number(criteria.maintenance_score.map(f64::from)),
            BadgeField::OverallScore
            | BadgeField::FamilyScore
            | BadgeField::QuietScore
            | BadgeField::PartyScore => None,
        }
    }
}
