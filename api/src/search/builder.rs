use super::types::{NumericFilter, Operator, SearchParams};
use crate::error::QueryFailure;
use crate::search_index::SearchIndex;
use rental_common::{FilterQuery, RentableListing};

pub const PRICE_FIELD: &str = "pricePerDay";

/// Fields matched by free text, in descending weight.
pub const SEARCHABLE_FIELDS: &[&str] = &[
    "name",
    "manufacturer",
    "type",
    "transmissionType",
    "fuelType",
];

/// Builds a single index query from the text box and the price bounds.
///
/// Bounds are passed through untouched: min > max is left for the index to
/// answer with an empty result.
pub fn build_search(query: &FilterQuery) -> SearchParams {
    let mut filters = Vec::new();
    if let Some(min) = query.min_price {
        filters.push(NumericFilter::new(PRICE_FIELD, Operator::Gte, min));
    }
    if let Some(max) = query.max_price {
        filters.push(NumericFilter::new(PRICE_FIELD, Operator::Lte, max));
    }

    SearchParams {
        text: query.text.trim().to_string(),
        query_by: SEARCHABLE_FIELDS,
        filters,
    }
}

/// Runs `query` against `index` and returns every match in ranked order.
pub async fn search_listings(
    index: &dyn SearchIndex,
    query: &FilterQuery,
) -> Result<Vec<RentableListing>, QueryFailure> {
    let params = build_search(query);
    tracing::debug!(
        q = %params.q(),
        filter_by = ?params.filter_by(),
        "searching listings"
    );

    match index.search(&params).await {
        Ok(hits) => Ok(hits),
        Err(e) => {
            tracing::warn!("Listing search failed: {}", e);
            Err(QueryFailure(e))
        }
    }
}
