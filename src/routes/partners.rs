use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Company, NewPartner, Partner};
use crate::schema::{companies, partners};
use crate::shares::ownership_percentages;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePartnerRequest {
    pub full_name: String,
    pub cin: String,
    pub shares: i32,
}

#[derive(Deserialize)]
pub struct UpdatePartnerRequest {
    pub full_name: Option<String>,
    pub cin: Option<String>,
    pub shares: Option<i32>,
}

#[derive(Serialize)]
pub struct PartnerResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub full_name: String,
    pub cin: String,
    pub shares: i32,
    pub percentage: f64,
}

impl From<Partner> for PartnerResponse {
    fn from(partner: Partner) -> Self {
        Self {
            id: partner.id,
            company_id: partner.company_id,
            full_name: partner.full_name,
            cin: partner.cin,
            shares: partner.shares,
            percentage: partner.percentage,
        }
    }
}

pub async fn list_partners(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<PartnerResponse>>> {
    let mut conn = state.db()?;
    let _company: Company = companies::table.find(company_id).first(&mut conn)?;

    let rows: Vec<Partner> = partners::table
        .filter(partners::company_id.eq(company_id))
        .order(partners::full_name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(PartnerResponse::from).collect()))
}

pub async fn create_partner(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<CreatePartnerRequest>,
) -> AppResult<(StatusCode, Json<PartnerResponse>)> {
    if payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("full_name must not be empty"));
    }
    if payload.cin.trim().is_empty() {
        return Err(AppError::bad_request("cin must not be empty"));
    }
    if payload.shares < 0 {
        return Err(AppError::bad_request("shares must not be negative"));
    }

    let mut conn = state.db()?;
    let _company: Company = companies::table.find(company_id).first(&mut conn)?;

    let new_partner = NewPartner {
        id: Uuid::new_v4(),
        company_id,
        full_name: payload.full_name.trim().to_string(),
        cin: payload.cin.trim().to_string(),
        shares: payload.shares,
        percentage: 0.0,
    };

    let inserted = conn.transaction(|conn| {
        diesel::insert_into(partners::table)
            .values(&new_partner)
            .execute(conn)?;
        recompute_percentages(conn, company_id)?;
        partners::table.find(new_partner.id).first::<Partner>(conn)
    });

    let partner = match inserted {
        Ok(partner) => partner,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request(
                "a partner with this CIN already exists for this company",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    Ok((StatusCode::CREATED, Json(PartnerResponse::from(partner))))
}

pub async fn update_partner(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((company_id, partner_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePartnerRequest>,
) -> AppResult<Json<PartnerResponse>> {
    let mut conn = state.db()?;

    let existing: Partner = partners::table
        .filter(partners::id.eq(partner_id))
        .filter(partners::company_id.eq(company_id))
        .first(&mut conn)?;

    let full_name = match payload.full_name {
        Some(value) if value.trim().is_empty() => {
            return Err(AppError::bad_request("full_name must not be empty"));
        }
        Some(value) => value.trim().to_string(),
        None => existing.full_name.clone(),
    };
    let cin = match payload.cin {
        Some(value) if value.trim().is_empty() => {
            return Err(AppError::bad_request("cin must not be empty"));
        }
        Some(value) => value.trim().to_string(),
        None => existing.cin.clone(),
    };
    let shares = match payload.shares {
        Some(value) if value < 0 => {
            return Err(AppError::bad_request("shares must not be negative"));
        }
        Some(value) => value,
        None => existing.shares,
    };

    let updated = conn.transaction(|conn| {
        diesel::update(partners::table.find(partner_id))
            .set((
                partners::full_name.eq(&full_name),
                partners::cin.eq(&cin),
                partners::shares.eq(shares),
                partners::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        recompute_percentages(conn, company_id)?;
        partners::table.find(partner_id).first::<Partner>(conn)
    })?;

    Ok(Json(PartnerResponse::from(updated)))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((company_id, partner_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let deleted = diesel::delete(
            partners::table
                .filter(partners::id.eq(partner_id))
                .filter(partners::company_id.eq(company_id)),
        )
        .execute(conn)?;
        if deleted == 0 {
            return Err(diesel::result::Error::NotFound);
        }
        recompute_percentages(conn, company_id)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites every partner percentage of a company from the share counts.
/// Always called inside the surrounding mutation's transaction so readers
/// never observe a half-updated breakdown.
pub fn recompute_percentages(conn: &mut PgConnection, company_id: Uuid) -> QueryResult<()> {
    let rows: Vec<Partner> = partners::table
        .filter(partners::company_id.eq(company_id))
        .order(partners::created_at.asc())
        .load(conn)?;

    let shares: Vec<i32> = rows.iter().map(|p| p.shares).collect();
    let percentages = ownership_percentages(&shares);

    for (partner, percentage) in rows.iter().zip(percentages) {
        diesel::update(partners::table.find(partner.id))
            .set(partners::percentage.eq(percentage))
            .execute(conn)?;
    }

    Ok(())
}
