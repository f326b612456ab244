use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Company, Manager, NewManager};
use crate::schema::{companies, managers};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateManagerRequest {
    pub full_name: String,
    pub cin: String,
    #[serde(default = "default_role_title")]
    pub role_title: String,
}

fn default_role_title() -> String {
    "Gérant".to_string()
}

#[derive(Deserialize)]
pub struct UpdateManagerRequest {
    pub full_name: Option<String>,
    pub cin: Option<String>,
    pub role_title: Option<String>,
}

#[derive(Serialize)]
pub struct ManagerResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub full_name: String,
    pub cin: String,
    pub role_title: String,
}

impl From<Manager> for ManagerResponse {
    fn from(manager: Manager) -> Self {
        Self {
            id: manager.id,
            company_id: manager.company_id,
            full_name: manager.full_name,
            cin: manager.cin,
            role_title: manager.role_title,
        }
    }
}

pub async fn list_managers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<ManagerResponse>>> {
    let mut conn = state.db()?;
    let _company: Company = companies::table.find(company_id).first(&mut conn)?;

    let rows: Vec<Manager> = managers::table
        .filter(managers::company_id.eq(company_id))
        .order(managers::full_name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ManagerResponse::from).collect()))
}

pub async fn create_manager(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<CreateManagerRequest>,
) -> AppResult<(StatusCode, Json<ManagerResponse>)> {
    if payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("full_name must not be empty"));
    }
    if payload.cin.trim().is_empty() {
        return Err(AppError::bad_request("cin must not be empty"));
    }

    let mut conn = state.db()?;
    let _company: Company = companies::table.find(company_id).first(&mut conn)?;

    let new_manager = NewManager {
        id: Uuid::new_v4(),
        company_id,
        full_name: payload.full_name.trim().to_string(),
        cin: payload.cin.trim().to_string(),
        role_title: payload.role_title.trim().to_string(),
    };

    match diesel::insert_into(managers::table)
        .values(&new_manager)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request(
                "a manager with this CIN already exists for this company",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let manager: Manager = managers::table.find(new_manager.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(ManagerResponse::from(manager))))
}

pub async fn update_manager(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((company_id, manager_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateManagerRequest>,
) -> AppResult<Json<ManagerResponse>> {
    let mut conn = state.db()?;

    let existing: Manager = managers::table
        .filter(managers::id.eq(manager_id))
        .filter(managers::company_id.eq(company_id))
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
    let role_title = match payload.role_title {
        Some(value) if value.trim().is_empty() => {
            return Err(AppError::bad_request("role_title must not be empty"));
        }
        Some(value) => value.trim().to_string(),
        None => existing.role_title.clone(),
    };

    diesel::update(managers::table.find(manager_id))
        .set((
            managers::full_name.eq(&full_name),
            managers::cin.eq(&cin),
            managers::role_title.eq(&role_title),
            managers::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: Manager = managers::table.find(manager_id).first(&mut conn)?;
    Ok(Json(ManagerResponse::from(updated)))
}

pub async fn delete_manager(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((company_id, manager_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = diesel::delete(
        managers::table
            .filter(managers::id.eq(manager_id))
            .filter(managers::company_id.eq(company_id)),
    )
    .execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
