mod builder;
mod types;

pub use builder::{build_search, search_listings, PRICE_FIELD, SEARCHABLE_FIELDS};
pub use types::{NumericFilter, Operator, SearchParams};

#[cfg(test)]
mod tests;
