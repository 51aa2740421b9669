use super::*;
use crate::error::{IndexError, QueryFailure};
use crate::search_index::{InMemoryIndex, SearchIndex};
use async_trait::async_trait;
use rental_common::{FilterQuery, RentableListing};
use std::collections::BTreeSet;

fn listing(id: &str, name: &str, price: f64) -> RentableListing {
    RentableListing {
        id: id.to_string(),
        name: name.to_string(),
        car_type: "Sedan".to_string(),
        price_per_day: price,
        transmission_type: "Automatic".to_string(),
        fuel_type: "Petrol".to_string(),
        year: "2022".to_string(),
        available_quantity: 1,
        primary_image_url: String::new(),
        manufacturer: "Honda".to_string(),
        number_of_seats: "5".to_string(),
        description: String::new(),
    }
}

async fn civic_accord_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index.upsert(&listing("A", "Civic", 50.0)).await.unwrap();
    index.upsert(&listing("B", "Accord", 80.0)).await.unwrap();
    index
}

fn ids(listings: &[RentableListing]) -> Vec<&str> {
    listings.iter().map(|l| l.id.as_str()).collect()
}

struct DownIndex;

#[async_trait]
impl SearchIndex for DownIndex {
    async fn upsert(&self, _listing: &RentableListing) -> Result<(), IndexError> {
        Err(IndexError::Transport("down".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<(), IndexError> {
        Err(IndexError::Transport("down".to_string()))
    }

    async fn document_ids(&self) -> Result<BTreeSet<String>, IndexError> {
        Err(IndexError::Transport("down".to_string()))
    }

    async fn search(&self, _params: &SearchParams) -> Result<Vec<RentableListing>, IndexError> {
        Err(IndexError::Transport("connection refused".to_string()))
    }
}

// =============================================================================
// build_search
// =============================================================================

#[test]
fn test_empty_text_becomes_wildcard() {
    let params = build_search(&FilterQuery::new("   "));
    assert_eq!(params.q(), "*");
    assert_eq!(params.filter_by(), None);
    assert_eq!(
        params.query_by_param(),
        "name,manufacturer,type,transmissionType,fuelType"
    );
}

#[test]
fn test_text_is_trimmed() {
    let params = build_search(&FilterQuery::new("  civic type r "));
    assert_eq!(params.q(), "civic type r");
}

#[test]
fn test_both_bounds_joined_with_and() {
    let params =
        build_search(&FilterQuery::new("").with_price_range(Some(60.0), Some(100.5)));
    assert_eq!(
        params.filter_by().as_deref(),
        Some("pricePerDay:>=60 && pricePerDay:<=100.5")
    );
}

#[test]
fn test_one_sided_bounds() {
    let min_only = build_search(&FilterQuery::new("").with_price_range(Some(60.0), None));
    assert_eq!(min_only.filter_by().as_deref(), Some("pricePerDay:>=60"));

    let max_only = build_search(&FilterQuery::new("").with_price_range(None, Some(40.0)));
    assert_eq!(max_only.filter_by().as_deref(), Some("pricePerDay:<=40"));
}

#[test]
fn test_inverted_bounds_pass_through() {
    let params = build_search(&FilterQuery::new("").with_price_range(Some(100.0), Some(10.0)));
    assert_eq!(
        params.filters,
        vec![
            NumericFilter::new(PRICE_FIELD, Operator::Gte, 100.0),
            NumericFilter::new(PRICE_FIELD, Operator::Lte, 10.0),
        ]
    );
}

// =============================================================================
// search_listings against the in-memory index
// =============================================================================

#[tokio::test]
async fn test_civic_accord_scenario() {
    let index = civic_accord_index().await;

    let hits = search_listings(&index, &FilterQuery::new("accord"))
        .await
        .unwrap();
    assert_eq!(ids(&hits), vec!["B"]);

    let hits = search_listings(
        &index,
        &FilterQuery::new("").with_price_range(Some(60.0), Some(100.0)),
    )
    .await
    .unwrap();
    assert_eq!(ids(&hits), vec!["B"]);

    index.upsert(&listing("A", "Civic", 55.0)).await.unwrap();
    let hits = search_listings(&index, &FilterQuery::default())
        .await
        .unwrap();
    assert_eq!(ids(&hits), vec!["A", "B"]);
    assert_eq!(hits[0].price_per_day, 55.0);
    assert_eq!(hits[1].price_per_day, 80.0);
}

#[tokio::test]
async fn test_empty_text_matches_all() {
    let index = civic_accord_index().await;
    index.upsert(&listing("C", "Jazz", 30.0)).await.unwrap();

    let hits = search_listings(&index, &FilterQuery::new(""))
        .await
        .unwrap();
    assert_eq!(hits.len(), index.len());
}

#[tokio::test]
async fn test_inverted_range_yields_empty() {
    let index = civic_accord_index().await;
    let query = FilterQuery::new("").with_price_range(Some(100.0), Some(10.0));

    let hits = search_listings(&index, &query).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_filter_composes_with_text_as_intersection() {
    let index = InMemoryIndex::new();
    let fleet = [
        ("1", "Civic", 50.0),
        ("2", "Civic Hybrid", 65.0),
        ("3", "Accord", 80.0),
        ("4", "Civic Type R", 120.0),
        ("5", "CR-V", 90.0),
    ];
    for (id, name, price) in fleet {
        index.upsert(&listing(id, name, price)).await.unwrap();
    }

    let bounds = [
        (None, None),
        (Some(60.0), None),
        (None, Some(90.0)),
        (Some(50.0), Some(90.0)),
        (Some(65.0), Some(65.0)),
        (Some(200.0), Some(10.0)),
    ];

    for text in ["", "civic", "honda", "type r", "missing"] {
        let unfiltered = search_listings(&index, &FilterQuery::new(text))
            .await
            .unwrap();
        for (min, max) in bounds {
            let query = FilterQuery::new(text).with_price_range(min, max);
            let filtered = search_listings(&index, &query).await.unwrap();
            let expected: Vec<RentableListing> = unfiltered
                .iter()
                .filter(|l| query.price_matches(l.price_per_day))
                .cloned()
                .collect();
            assert_eq!(filtered, expected, "text={:?} min={:?} max={:?}", text, min, max);
        }
    }
}

#[tokio::test]
async fn test_identical_queries_are_deterministic() {
    let index = civic_accord_index().await;
    index.upsert(&listing("C", "Civic Hatch", 45.0)).await.unwrap();
    let query = FilterQuery::new("civic").with_price_range(Some(40.0), None);

    let first = search_listings(&index, &query).await.unwrap();
    let second = search_listings(&index, &query).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_index_failure_is_query_failure() {
    let result = search_listings(&DownIndex, &FilterQuery::new("civic")).await;
    assert_eq!(
        result,
        Err(QueryFailure(IndexError::Transport(
            "connection refused".to_string()
        )))
    );
}
