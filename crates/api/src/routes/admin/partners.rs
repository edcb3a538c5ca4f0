//! Partner administration and API key issuance.
//!
//! The secret key is shown once, in the create and regenerate-keys
//! responses. Everywhere else `Partner` serializes without it.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{Email, Pagination, PartnerId};

use crate::db::partners::{self, NewPartner, PartnerUpdate};
use crate::error::{AppError, OrNotFound, Result};
use crate::middleware::RequireAdmin;
use crate::models::Partner;
use crate::services::keys::partner_key_pair;
use crate::state::AppState;

const PARTNER_NOT_FOUND: &str = "Partner not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/toggle-status", patch(toggle_status))
        .route("/{id}/regenerate-keys", post(regenerate_keys))
}

/// Query string for the partner list.
#[derive(Debug, Default, Deserialize)]
pub struct PartnerListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePartner {
    pub name: String,
    pub email: String,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub commission_rate: Decimal,
}

fn check_commission(rate: Decimal) -> Result<()> {
    if rate.is_sign_negative() || rate > Decimal::ONE {
        return Err(AppError::BadRequest(
            "Commission rate must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|_| AppError::BadRequest("Invalid email address".to_string()))
}

/// Create and regenerate responses: the partner plus its secret.
fn with_secret(partner: &Partner) -> Value {
    json!({
        "id": partner.id,
        "name": partner.name,
        "email": partner.email,
        "api_key": partner.api_key,
        "secret_key": partner.secret_key,
        "webhook_url": partner.webhook_url,
        "commission_rate": partner.commission_rate,
        "is_active": partner.is_active,
    })
}

/// `GET /admin/partners`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PartnerListQuery>,
) -> Result<Json<Value>> {
    let page = Pagination::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(Pagination::DEFAULT_LIMIT),
    );
    let (partners, total) = partners::list(state.pool(), query.search.as_deref(), page).await?;
    Ok(Json(json!({ "partners": partners, "pagination": page.info(total) })))
}

/// `GET /admin/partners/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, partner_id = %id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PartnerId>,
) -> Result<Json<Partner>> {
    partners::get(state.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(PARTNER_NOT_FOUND.to_string()))
}

/// `POST /admin/partners`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(form): Json<CreatePartner>,
) -> Result<(StatusCode, Json<Value>)> {
    if form.name.trim().is_empty() {
        return Err(AppError::BadRequest("Partner name is required".to_string()));
    }
    check_commission(form.commission_rate)?;

    let (api_key, secret_key) = partner_key_pair();
    let partner = partners::create(
        state.pool(),
        &NewPartner {
            name: form.name,
            email: parse_email(&form.email)?,
            webhook_url: form.webhook_url,
            commission_rate: form.commission_rate,
            api_key,
            secret_key,
        },
    )
    .await?;
    info!(partner_id = %partner.id, "Partner created");

    Ok((StatusCode::CREATED, Json(with_secret(&partner))))
}

/// `PUT /admin/partners/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, partner_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PartnerId>,
    Json(update): Json<PartnerUpdate>,
) -> Result<Json<Partner>> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Partner name cannot be empty".to_string()));
    }
    if let Some(rate) = update.commission_rate {
        check_commission(rate)?;
    }
    let email = update.email.as_deref().map(parse_email).transpose()?;

    let partner = partners::update(state.pool(), id, &update, email.as_ref())
        .await
        .or_not_found(PARTNER_NOT_FOUND)?;
    Ok(Json(partner))
}

/// `DELETE /admin/partners/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, partner_id = %id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PartnerId>,
) -> Result<Json<Value>> {
    partners::soft_delete(state.pool(), id)
        .await
        .or_not_found(PARTNER_NOT_FOUND)?;
    info!("Partner deleted");
    Ok(Json(json!({ "message": "Partner deleted successfully" })))
}

/// `PATCH /admin/partners/{id}/toggle-status`
#[instrument(skip_all, fields(admin_id = %admin.id, partner_id = %id))]
pub async fn toggle_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PartnerId>,
) -> Result<Json<Partner>> {
    let partner = partners::toggle_status(state.pool(), id)
        .await
        .or_not_found(PARTNER_NOT_FOUND)?;
    info!(is_active = partner.is_active, "Partner status toggled");
    Ok(Json(partner))
}

/// `POST /admin/partners/{id}/regenerate-keys`
///
/// The old key pair stops working immediately.
#[instrument(skip_all, fields(admin_id = %admin.id, partner_id = %id))]
pub async fn regenerate_keys(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PartnerId>,
) -> Result<Json<Value>> {
    let (api_key, secret_key) = partner_key_pair();
    let partner = partners::set_keys(state.pool(), id, &api_key, &secret_key)
        .await
        .or_not_found(PARTNER_NOT_FOUND)?;
    info!("Partner keys regenerated");

    Ok(Json(json!({ "api_key": partner.api_key, "secret_key": partner.secret_key })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_commission_rate_bounds() {
        assert!(check_commission(Decimal::ZERO).is_ok());
        assert!(check_commission(Decimal::ONE).is_ok());
        assert!(check_commission(Decimal::new(15, 2)).is_ok());
        assert!(check_commission(Decimal::new(-1, 2)).is_err());
        assert!(check_commission(Decimal::new(101, 2)).is_err());
    }

    #[test]
    fn test_with_secret_exposes_secret_once() {
        let partner = Partner {
            id: PartnerId::new(3),
            name: "Acme".to_string(),
            email: Email::parse("ops@acme.test").unwrap(),
            api_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            webhook_url: None,
            is_active: true,
            commission_rate: Decimal::new(5, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(with_secret(&partner)["secret_key"], "sk");
        assert!(serde_json::to_value(&partner).unwrap().get("secret_key").is_none());
    }
}
