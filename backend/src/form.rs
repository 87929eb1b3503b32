//! The input form: control definitions for the page and collection of the
//! control values into a [`PredictionRecord`].

use moto_inference::types::{CAPACITY_MAX, CAPACITY_MIN, YEAR_MAX, YEAR_MIN};
use moto_inference::{
    BikeType, Capacity, Mileage, PredictionRecord, RecordError, Seller, Text, Year,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_BRAND: &str = "Honda";
pub const DEFAULT_MODEL: &str = "CB125";
pub const DEFAULT_BIKE_TYPE: BikeType = BikeType::Motorcycle;
pub const DEFAULT_SELLER: Seller = Seller::Dealer;
pub const DEFAULT_CAPACITY: u16 = 125;
pub const DEFAULT_MILEAGE: f64 = 0.0;
pub const DEFAULT_YEAR: u16 = 2018;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Select,
    Integer,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormControl {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: ControlKind,
    pub default: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    pub column: u8,
}

impl FormControl {
    fn new(key: &'static str, label: &'static str, kind: ControlKind, default: Value, column: u8) -> Self {
        Self {
            key,
            label,
            kind,
            default,
            min: None,
            max: None,
            step: None,
            options: Vec::new(),
            column,
        }
    }

    fn bounded(mut self, min: Option<f64>, max: Option<f64>, step: f64) -> Self {
        self.min = min;
        self.max = max;
        self.step = Some(step);
        self
    }

    fn with_options(mut self, options: Vec<&'static str>) -> Self {
        self.options = options;
        self
    }
}

/// One control per record field, in page order. Numeric bounds are the same
/// constants the record types enforce.
pub fn controls() -> Vec<FormControl> {
    vec![
        FormControl::new("Brand", "Brand", ControlKind::Text, json!(DEFAULT_BRAND), 1),
        FormControl::new("Model", "Model", ControlKind::Text, json!(DEFAULT_MODEL), 1),
        FormControl::new(
            "Bike Type",
            "Bike Type",
            ControlKind::Select,
            json!(DEFAULT_BIKE_TYPE.as_str()),
            1,
        )
        .with_options(BikeType::ALL.iter().map(BikeType::as_str).collect()),
        FormControl::new(
            "Seller",
            "Seller Type",
            ControlKind::Select,
            json!(DEFAULT_SELLER.as_str()),
            1,
        )
        .with_options(Seller::ALL.iter().map(Seller::as_str).collect()),
        FormControl::new(
            "Capacity",
            "Capacity (CC)",
            ControlKind::Integer,
            json!(DEFAULT_CAPACITY),
            2,
        )
        .bounded(Some(CAPACITY_MIN.into()), Some(CAPACITY_MAX.into()), 1.0),
        FormControl::new(
            "Mileage",
            "Mileage (km)",
            ControlKind::Number,
            json!(DEFAULT_MILEAGE),
            2,
        )
        .bounded(Some(0.0), None, 1.0),
        FormControl::new("Year", "Make (year)", ControlKind::Integer, json!(DEFAULT_YEAR), 2)
            .bounded(Some(YEAR_MIN.into()), Some(YEAR_MAX.into()), 1.0),
    ]
}

/// Raw values of the form controls as submitted by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormState {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Bike Type")]
    pub bike_type: String,
    #[serde(rename = "Capacity")]
    pub capacity: i64,
    #[serde(rename = "Mileage")]
    pub mileage: f64,
    #[serde(rename = "Year")]
    pub year: i64,
    #[serde(rename = "Seller")]
    pub seller: String,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            model: DEFAULT_MODEL.to_string(),
            bike_type: DEFAULT_BIKE_TYPE.to_string(),
            capacity: DEFAULT_CAPACITY.into(),
            mileage: DEFAULT_MILEAGE,
            year: DEFAULT_YEAR.into(),
            seller: DEFAULT_SELLER.to_string(),
        }
    }
}

impl FormState {
    /// Collects the current values into a record. Values are taken as-is:
    /// anything outside a field's domain is an error, never clamped.
    pub fn record(&self) -> Result<PredictionRecord, RecordError> {
        let capacity = u16::try_from(self.capacity)
            .map_err(|_| RecordError::CapacityOutOfRange {
                value: self.capacity,
            })
            .and_then(Capacity::try_from)?;
        let year = u16::try_from(self.year)
            .map_err(|_| RecordError::YearOutOfRange { value: self.year })
            .and_then(Year::try_from)?;

        Ok(PredictionRecord::new(
            Text::try_from(self.brand.as_str())?,
            Text::try_from(self.model.as_str())?,
            self.bike_type.parse()?,
            capacity,
            Mileage::try_from(self.mileage)?,
            year,
            self.seller.parse()?,
        ))
    }
}

/// The record the page shows before the user changes anything.
pub fn default_record() -> Result<PredictionRecord, RecordError> {
    FormState::default().record()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_form_a_valid_record() {
        let record = default_record().unwrap();
        assert_eq!(record.brand().as_str(), DEFAULT_BRAND);
        assert_eq!(record.capacity().get(), DEFAULT_CAPACITY);
        assert_eq!(record.year().get(), DEFAULT_YEAR);
        assert_eq!(record.seller(), Seller::Dealer);
    }

    #[test]
    fn boundary_values_are_collected_without_clamping() {
        for (capacity, year) in [(50, 0), (2000, 2025)] {
            let state = FormState {
                capacity,
                year,
                ..FormState::default()
            };
            let record = state.record().unwrap();
            assert_eq!(i64::from(record.capacity().get()), capacity);
            assert_eq!(i64::from(record.year().get()), year);
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let state = FormState {
            capacity: 70_000,
            ..FormState::default()
        };
        assert_eq!(
            state.record().unwrap_err(),
            RecordError::CapacityOutOfRange { value: 70_000 }
        );

        let state = FormState {
            year: -1,
            ..FormState::default()
        };
        assert_eq!(
            state.record().unwrap_err(),
            RecordError::YearOutOfRange { value: -1 }
        );

        let state = FormState {
            mileage: -0.5,
            ..FormState::default()
        };
        assert!(state.record().is_err());

        let state = FormState {
            seller: "Broker".to_string(),
            ..FormState::default()
        };
        assert!(matches!(
            state.record(),
            Err(RecordError::UnknownOption { field: "Seller", .. })
        ));
    }

    #[test]
    fn controls_mirror_record_domain() {
        let controls = controls();
        let keys: Vec<_> = controls.iter().map(|control| control.key).collect();
        assert_eq!(
            keys,
            ["Brand", "Model", "Bike Type", "Seller", "Capacity", "Mileage", "Year"]
        );

        let capacity = controls.iter().find(|c| c.key == "Capacity").unwrap();
        assert_eq!(capacity.min, Some(50.0));
        assert_eq!(capacity.max, Some(2000.0));
        assert_eq!(capacity.column, 2);

        let year = controls.iter().find(|c| c.key == "Year").unwrap();
        assert_eq!((year.min, year.max), (Some(0.0), Some(2025.0)));

        let bike_type = controls.iter().find(|c| c.key == "Bike Type").unwrap();
        assert_eq!(
            bike_type.options,
            ["Motorcycle", "Scooter", "Sports", "Cruiser", "Other"]
        );
    }

    #[test]
    fn control_defaults_match_form_state() {
        let state = serde_json::to_value(FormState::default()).unwrap();
        for control in controls() {
            assert_eq!(state[control.key], control.default, "{}", control.key);
        }
    }
}
