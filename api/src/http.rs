use crate::search::search_listings;
use crate::search_index::SearchIndex;
use crate::sync_service::{SyncReport, SyncService};
use poem::{
    get, handler,
    middleware::Cors,
    post,
    web::{Data, Json, Query},
    Endpoint, EndpointExt, Result as PoemResult, Route,
};
use rental_common::{FilterQuery, RentableListing};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

pub struct AppContext {
    pub index: Arc<dyn SearchIndex>,
    pub sync: Arc<SyncService>,
}

#[derive(Debug, Deserialize)]
pub struct ListingSearchQuery {
    #[serde(default)]
    pub q: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[handler]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[handler]
pub async fn search(
    ctx: Data<&Arc<AppContext>>,
    Query(params): Query<ListingSearchQuery>,
) -> PoemResult<Json<ApiResponse<Vec<RentableListing>>>> {
    let query = FilterQuery::new(params.q).with_price_range(params.min_price, params.max_price);

    match search_listings(ctx.index.as_ref(), &query).await {
        Ok(listings) => Ok(Json(ApiResponse::success(listings))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

/// Fetches a fresh snapshot and syncs it. A partially failed run still
/// returns the report, with `success: false` and the culprits in `error`.
#[handler]
pub async fn sync(ctx: Data<&Arc<AppContext>>) -> PoemResult<Json<ApiResponse<SyncReport>>> {
    let report = match ctx.sync.sync_once().await {
        Ok(report) => report,
        Err(e) => return Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    };

    if report.is_clean() {
        return Ok(Json(ApiResponse::success(report)));
    }

    let error = match report.clone().into_result() {
        Err(e) => e.to_string(),
        Ok(_) => "Sync incomplete".to_string(),
    };
    Ok(Json(ApiResponse {
        success: false,
        data: Some(report),
        error: Some(error),
    }))
}

pub fn app(ctx: Arc<AppContext>) -> impl Endpoint {
    Route::new()
        .at("/api/v1/health", get(health))
        .at("/api/v1/listings/search", get(search))
        .at("/api/v1/listings/sync", post(sync))
        .data(ctx)
        .with(Cors::new())
}
