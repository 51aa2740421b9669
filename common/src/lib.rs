pub mod filter;
pub mod listing;
pub mod rentable;

pub use filter::FilterQuery;
pub use listing::{ProjectionError, RentableListing};
pub use rentable::{Car, Manufacturer, RentableCar};
