//! Drink handlers.
//!
//! - `GET /drinks` - public menu (short representation)
//! - `GET /drinks-detail` - full recipes, requires `get:drinks-detail`
//! - `POST /drinks` - create, requires `post:drinks`
//! - `PATCH /drinks/:id` - update, requires `patch:drinks`
//! - `DELETE /drinks/:id` - delete, requires `delete:drinks`
//!
//! Protected handlers run only after the authorization middleware has
//! inserted the verified `Claims` into request extensions.

use crate::auth::Claims;
use crate::errors::ApiError;
use crate::models::{
    CreateDrinkRequest, DeleteResponse, DrinkDetail, DrinkSummary, DrinksResponse,
    UpdateDrinkRequest,
};
use crate::repositories::DrinksRepository;
use crate::routes::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Message returned when a drink id does not exist.
pub const DRINK_NOT_FOUND: &str = "No drink was found.";

/// Message returned for unroutable paths and non-numeric ids.
pub const RESOURCE_NOT_FOUND: &str = "resource not found";

fn drink_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id).map_err(|e| {
        tracing::debug!(target: "drinks.handlers.drinks", error = %e, "Invalid drink id");
        ApiError::NotFound(RESOURCE_NOT_FOUND.to_string())
    })
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::Unprocessable(e.body_text()))
}

/// List drinks in the short representation.
#[instrument(skip_all, name = "drinks.handlers.list")]
pub async fn list_drinks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DrinksResponse<DrinkSummary>>, ApiError> {
    let drinks = DrinksRepository::list(&state.pool).await?;
    Ok(Json(DrinksResponse::new(
        drinks.iter().map(|d| d.short()).collect(),
    )))
}

/// List drinks in the long representation.
#[instrument(skip_all, name = "drinks.handlers.list_detail")]
pub async fn list_drink_details(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<DrinksResponse<DrinkDetail>>, ApiError> {
    let drinks = DrinksRepository::list(&state.pool).await?;
    Ok(Json(DrinksResponse::new(
        drinks.iter().map(|d| d.long()).collect(),
    )))
}

/// Create a drink.
///
/// # Response
///
/// - 200 with the new drink in the long representation
/// - 422 for an unreadable or invalid body, or a duplicate title
#[instrument(skip_all, name = "drinks.handlers.create")]
pub async fn create_drink(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
    payload: Result<Json<CreateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkDetail>>, ApiError> {
    let new_drink = json_body(payload)?
        .validate()
        .map_err(ApiError::Unprocessable)?;

    let drink = DrinksRepository::insert(&state.pool, &new_drink).await?;

    tracing::info!(target: "drinks.handlers.drinks", drink_id = drink.id, "Drink created");
    Ok(Json(DrinksResponse::new(vec![drink.long()])))
}

/// Update a drink's title and/or recipe.
///
/// # Response
///
/// - 200 with the updated drink in the long representation
/// - 404 if the drink does not exist
/// - 422 for an unreadable or invalid body, or a duplicate title
#[instrument(skip_all, name = "drinks.handlers.update")]
pub async fn update_drink(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkDetail>>, ApiError> {
    let id = drink_id(path)?;

    // An unknown id is reported as 404 even when the body is also bad
    let Some(current) = DrinksRepository::find(&state.pool, id).await? else {
        return Err(ApiError::NotFound(DRINK_NOT_FOUND.to_string()));
    };

    let changes = json_body(payload)?
        .validate()
        .map_err(ApiError::Unprocessable)?;

    if changes.is_empty() {
        return Ok(Json(DrinksResponse::new(vec![current.long()])));
    }

    let drink = DrinksRepository::update(&state.pool, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(DRINK_NOT_FOUND.to_string()))?;

    tracing::info!(target: "drinks.handlers.drinks", drink_id = drink.id, "Drink updated");
    Ok(Json(DrinksResponse::new(vec![drink.long()])))
}

/// Delete a drink.
///
/// # Response
///
/// - 200 `{"success": true, "delete": id}`
/// - 404 if the drink does not exist
#[instrument(skip_all, name = "drinks.handlers.delete")]
pub async fn delete_drink(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = drink_id(path)?;

    if !DrinksRepository::delete(&state.pool, id).await? {
        return Err(ApiError::NotFound(DRINK_NOT_FOUND.to_string()));
    }

    tracing::info!(target: "drinks.handlers.drinks", drink_id = id, "Drink deleted");
    Ok(Json(DeleteResponse {
        success: true,
        delete: id,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound(RESOURCE_NOT_FOUND.to_string())
}
