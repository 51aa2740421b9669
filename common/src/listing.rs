use crate::rentable::RentableCar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat search document for one rentable car.
///
/// `id` is the identity key: writing a listing with an existing id replaces
/// every field of the stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentableListing {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub car_type: String,
    pub price_per_day: f64,
    pub transmission_type: String,
    pub fuel_type: String,
    pub year: String,
    pub available_quantity: i64,
    #[serde(default)]
    pub primary_image_url: String,
    pub manufacturer: String,
    pub number_of_seats: String,
    #[serde(default)]
    pub description: String,
}

/// Reasons a raw row cannot be turned into a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The row does not have the shape of a rentable car, e.g. a null `car`.
    Undecodable(String),
    EmptyId,
    InvalidPrice(f64),
    NegativeQuantity(i64),
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::Undecodable(msg) => write!(f, "record could not be decoded: {}", msg),
            ProjectionError::EmptyId => write!(f, "record has an empty id"),
            ProjectionError::InvalidPrice(p) => {
                write!(f, "pricePerDay must be a positive number, got {}", p)
            }
            ProjectionError::NegativeQuantity(q) => {
                write!(f, "availableQuantity must not be negative, got {}", q)
            }
        }
    }
}

impl std::error::Error for ProjectionError {}

impl TryFrom<&RentableCar> for RentableListing {
    type Error = ProjectionError;

    fn try_from(row: &RentableCar) -> Result<Self, Self::Error> {
        if row.id.trim().is_empty() {
            return Err(ProjectionError::EmptyId);
        }
        if !row.price_per_day.is_finite() || row.price_per_day <= 0.0 {
            return Err(ProjectionError::InvalidPrice(row.price_per_day));
        }
        if row.available_quantity < 0 {
            return Err(ProjectionError::NegativeQuantity(row.available_quantity));
        }

        let car = &row.car;
        Ok(RentableListing {
            id: row.id.clone(),
            name: car.name.clone(),
            car_type: car.car_type.clone(),
            price_per_day: row.price_per_day,
            transmission_type: car.transmission_type.clone(),
            fuel_type: car.fuel_type.clone(),
            year: car.year.clone(),
            available_quantity: row.available_quantity,
            primary_image_url: car.primary_image_url.clone().unwrap_or_default(),
            manufacturer: car.manufacturer.name.clone(),
            number_of_seats: car.number_of_seats.clone(),
            description: car.description.clone(),
        })
    }
}
