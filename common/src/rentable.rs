use serde::{Deserialize, Deserializer, Serialize};

/// The backend declares `year` and `numberOfSeats` as `String!`; older rows
/// may still carry plain numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// Manufacturer as nested inside a car by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub car_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "string_or_number")]
    pub year: String,
    pub transmission_type: String,
    pub fuel_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub number_of_seats: String,
    #[serde(default)]
    pub primary_image_url: Option<String>,
    pub manufacturer: Manufacturer,
}

/// One row of `getRentableCars`: rental terms joined with car and manufacturer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentableCar {
    pub id: String,
    pub car_id: String,
    pub price_per_day: f64,
    pub available_quantity: i64,
    pub car: Car,
}
