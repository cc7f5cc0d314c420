//! Sale endpoints (`/api/ventas`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use cowtracker_api::ApiError;
use cowtracker_storage::{NewSale, SaleStorage, UpdateSale};

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

/// GET /api/ventas - List sales.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let sales = SaleStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(sales))
}

/// GET /api/ventas/stats - Aggregated sales statistics.
pub async fn stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = SaleStorage::new(&state.pool)
        .stats()
        .await
        .map_err(storage_error)?;

    Ok(Json(stats))
}

/// GET /api/ventas/comprador/{comprador} - Sales filtered by buyer.
pub async fn by_buyer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(comprador): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let sales = SaleStorage::new(&state.pool)
        .list_by_buyer(&comprador)
        .await
        .map_err(storage_error)?;

    Ok(Json(sales))
}

/// GET /api/ventas/{id} - Read a sale.
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let sale = SaleStorage::new(&state.pool)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Venta no encontrada"))?;

    Ok(Json(sale))
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub comprador: Option<String>,
    pub cantidad: Option<i32>,
    pub precio_unitario: Option<f64>,
    pub total: Option<f64>,
    /// Cattle ids to link to the sale.
    pub ganados: Option<Vec<i64>>,
}

/// POST /api/ventas - Create a sale, optionally linking cattle.
pub async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<SaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(comprador), Some(cantidad), Some(precio_unitario)) = (
        request.comprador,
        request.cantidad,
        request.precio_unitario,
    ) else {
        return Err(ApiError::bad_request(
            "Faltan datos requeridos: comprador, cantidad y precio_unitario",
        ));
    };

    let total = request
        .total
        .unwrap_or(f64::from(cantidad) * precio_unitario);

    let storage = SaleStorage::new(&state.pool);
    let sale = storage
        .create(&NewSale {
            comprador,
            cantidad,
            precio_unitario,
            total,
        })
        .await
        .map_err(storage_error)?;

    if let Some(ganados) = request.ganados {
        for id_ganado in ganados {
            storage
                .link_cattle(sale.id_venta, id_ganado)
                .await
                .map_err(storage_error)?;
        }
    }

    tracing::info!(id_venta = sale.id_venta, "sale created");

    Ok((StatusCode::CREATED, Json(sale)))
}

/// PUT /api/ventas/{id} - Update a sale; a `ganados` array replaces the
/// linked cattle.
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<SaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Recompute the total when both inputs change and no explicit total is
    // given.
    let total = match (request.total, request.cantidad, request.precio_unitario) {
        (Some(total), _, _) => Some(total),
        (None, Some(cantidad), Some(precio)) => Some(f64::from(cantidad) * precio),
        _ => None,
    };

    let storage = SaleStorage::new(&state.pool);
    let sale = storage
        .update(
            id,
            &UpdateSale {
                comprador: request.comprador,
                cantidad: request.cantidad,
                precio_unitario: request.precio_unitario,
                total,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Venta no encontrada"))?;

    if let Some(ganados) = request.ganados {
        storage
            .unlink_all_cattle(id)
            .await
            .map_err(storage_error)?;
        for id_ganado in ganados {
            storage
                .link_cattle(id, id_ganado)
                .await
                .map_err(storage_error)?;
        }
    }

    tracing::info!(id_venta = id, "sale updated");

    Ok(Json(sale))
}

/// DELETE /api/ventas/{id} - Delete a sale.
pub async fn delete(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = SaleStorage::new(&state.pool)
        .delete(id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::not_found("Venta no encontrada"));
    }

    Ok(Json(json!({ "message": "Venta eliminada exitosamente" })))
}

#[derive(Debug, Deserialize)]
pub struct LinkCattleRequest {
    pub id_ganado: Option<i64>,
}

/// POST /api/ventas/{id}/ganado - Link a cattle record to a sale.
pub async fn add_cattle(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<LinkCattleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(id_ganado) = request.id_ganado else {
        return Err(ApiError::bad_request("ID de ganado es requerido"));
    };

    let link = SaleStorage::new(&state.pool)
        .link_cattle(id, id_ganado)
        .await
        .map_err(storage_error)?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/ventas/{id}/ganado - Cattle linked to a sale.
pub async fn cattle(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let links = SaleStorage::new(&state.pool)
        .cattle_for_sale(id)
        .await
        .map_err(storage_error)?;

    Ok(Json(links))
}
