use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

pub const CAPACITY_MIN: u16 = 50;
pub const CAPACITY_MAX: u16 = 2000;
pub const YEAR_MIN: u16 = 0;
pub const YEAR_MAX: u16 = 2025;

/// Column names in the order every model artifact consumes them.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Brand",
    "Model",
    "Bike Type",
    "Capacity",
    "Mileage",
    "Year",
    "Seller",
];
pub const FEATURE_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BikeType {
    Motorcycle,
    Scooter,
    Sports,
    Cruiser,
    Other,
}

impl BikeType {
    pub const ALL: [BikeType; 5] = [
        BikeType::Motorcycle,
        BikeType::Scooter,
        BikeType::Sports,
        BikeType::Cruiser,
        BikeType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BikeType::Motorcycle => "Motorcycle",
            BikeType::Scooter => "Scooter",
            BikeType::Sports => "Sports",
            BikeType::Cruiser => "Cruiser",
            BikeType::Other => "Other",
        }
    }
}

impl fmt::Display for BikeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BikeType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BikeType::ALL
            .into_iter()
            .find(|option| option.as_str() == s.trim())
            .ok_or_else(|| RecordError::UnknownOption {
                field: "Bike Type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seller {
    Dealer,
    Individual,
}

impl Seller {
    pub const ALL: [Seller; 2] = [Seller::Dealer, Seller::Individual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Seller::Dealer => "Dealer",
            Seller::Individual => "Individual",
        }
    }
}

impl fmt::Display for Seller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Seller {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Seller::ALL
            .into_iter()
            .find(|option| option.as_str() == s.trim())
            .ok_or_else(|| RecordError::UnknownOption {
                field: "Seller",
                value: s.to_string(),
            })
    }
}

/// Trimmed, non-empty free text (brand and model names).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Text(String);

impl Text {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Text {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RecordError::EmptyText);
        }
        Ok(Text(trimmed.to_string()))
    }
}

impl TryFrom<&str> for Text {
    type Error = RecordError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Text::try_from(value.to_string())
    }
}

impl From<Text> for String {
    fn from(value: Text) -> Self {
        value.0
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine capacity in cubic centimetres, within `[CAPACITY_MIN, CAPACITY_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Capacity(u16);

impl Capacity {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Capacity {
    type Error = RecordError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (CAPACITY_MIN..=CAPACITY_MAX).contains(&value) {
            Ok(Capacity(value))
        } else {
            Err(RecordError::CapacityOutOfRange {
                value: value.into(),
            })
        }
    }
}

impl From<Capacity> for u16 {
    fn from(value: Capacity) -> Self {
        value.0
    }
}

/// Odometer reading in kilometres. Finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Mileage(f64);

impl Mileage {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Mileage {
    type Error = RecordError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && value >= 0.0 {
            // normalise -0.0 so it displays as "0"
            Ok(Mileage(value + 0.0))
        } else {
            Err(RecordError::InvalidMileage { value })
        }
    }
}

impl From<Mileage> for f64 {
    fn from(value: Mileage) -> Self {
        value.0
    }
}

/// Year of manufacture, within `[YEAR_MIN, YEAR_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Year(u16);

impl Year {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Year {
    type Error = RecordError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (YEAR_MIN..=YEAR_MAX).contains(&value) {
            Ok(Year(value))
        } else {
            Err(RecordError::YearOutOfRange {
                value: value.into(),
            })
        }
    }
}

impl From<Year> for u16 {
    fn from(value: Year) -> Self {
        value.0
    }
}

/// The motorbike attributes submitted for a single price estimate.
///
/// Every field is a domain type, so a value of this struct is always within
/// the declared bounds. Fields are private to keep the record immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionRecord {
    #[serde(rename = "Brand")]
    brand: Text,
    #[serde(rename = "Model")]
    model: Text,
    #[serde(rename = "Bike Type")]
    bike_type: BikeType,
    #[serde(rename = "Capacity")]
    capacity: Capacity,
    #[serde(rename = "Mileage")]
    mileage: Mileage,
    #[serde(rename = "Year")]
    year: Year,
    #[serde(rename = "Seller")]
    seller: Seller,
}

impl PredictionRecord {
    pub fn new(
        brand: Text,
        model: Text,
        bike_type: BikeType,
        capacity: Capacity,
        mileage: Mileage,
        year: Year,
        seller: Seller,
    ) -> Self {
        Self {
            brand,
            model,
            bike_type,
            capacity,
            mileage,
            year,
            seller,
        }
    }

    pub fn brand(&self) -> &Text {
        &self.brand
    }

    pub fn model(&self) -> &Text {
        &self.model
    }

    pub fn bike_type(&self) -> BikeType {
        self.bike_type
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn mileage(&self) -> Mileage {
        self.mileage
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn seller(&self) -> Seller {
        self.seller
    }

    /// Field name and display value pairs, in `FEATURE_NAMES` order. Mileage is
    /// a float column and keeps its decimal point (`15000.0`).
    pub fn fields(&self) -> [(&'static str, String); FEATURE_COUNT] {
        [
            (FEATURE_NAMES[0], self.brand.to_string()),
            (FEATURE_NAMES[1], self.model.to_string()),
            (FEATURE_NAMES[2], self.bike_type.to_string()),
            (FEATURE_NAMES[3], self.capacity.get().to_string()),
            (FEATURE_NAMES[4], format!("{:?}", self.mileage.get())),
            (FEATURE_NAMES[5], self.year.get().to_string()),
            (FEATURE_NAMES[6], self.seller.to_string()),
        ]
    }
}
