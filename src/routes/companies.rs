use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Company, Manager, NewCompany, Partner};
use crate::schema::{companies, documents, managers, partners};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, NullableValue};

use super::managers::ManagerResponse;
use super::partners::PartnerResponse;

#[derive(Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub legal_form: String,
    #[serde(default)]
    pub capital: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub registry_id: String,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub name: String,
    pub legal_form: String,
    pub capital: f64,
    pub address: String,
    pub tax_id: String,
    pub registry_id: String,
    pub email: Option<String>,
    pub created_at: String,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            name: company.name,
            legal_form: company.legal_form,
            capital: company.capital,
            address: company.address,
            tax_id: company.tax_id,
            registry_id: company.registry_id,
            email: company.email,
            created_at: company.created_at.and_utc().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct CompanyDetailResponse {
    pub company: CompanyResponse,
    pub partners: Vec<PartnerResponse>,
    pub managers: Vec<ManagerResponse>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = companies)]
struct UpdateCompanyChangeset {
    name: Option<String>,
    legal_form: Option<String>,
    capital: Option<f64>,
    address: Option<String>,
    tax_id: Option<String>,
    registry_id: Option<String>,
    email: Option<Option<String>>,
}

pub async fn list_companies(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<CompanyResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Company> = companies::table
        .order(companies::name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CompanyResponse::from).collect()))
}

pub async fn create_company(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCompanyRequest>,
) -> AppResult<(StatusCode, Json<CompanyResponse>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if payload.legal_form.trim().is_empty() {
        return Err(AppError::bad_request("legal_form must not be empty"));
    }

    let mut conn = state.db()?;
    let new_company = NewCompany {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        legal_form: payload.legal_form.trim().to_string(),
        capital: payload.capital,
        address: payload.address.trim().to_string(),
        tax_id: payload.tax_id.trim().to_string(),
        registry_id: payload.registry_id.trim().to_string(),
        email: payload
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        created_by: Some(user.user_id),
    };

    diesel::insert_into(companies::table)
        .values(&new_company)
        .execute(&mut conn)?;

    let company: Company = companies::table.find(new_company.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(CompanyResponse::from(company))))
}

pub async fn get_company(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<CompanyDetailResponse>> {
    let mut conn = state.db()?;

    let company: Company = companies::table.find(company_id).first(&mut conn)?;
    let partner_rows: Vec<Partner> = partners::table
        .filter(partners::company_id.eq(company_id))
        .order(partners::full_name.asc())
        .load(&mut conn)?;
    let manager_rows: Vec<Manager> = managers::table
        .filter(managers::company_id.eq(company_id))
        .order(managers::full_name.asc())
        .load(&mut conn)?;

    Ok(Json(CompanyDetailResponse {
        company: CompanyResponse::from(company),
        partners: partner_rows.into_iter().map(PartnerResponse::from).collect(),
        managers: manager_rows.into_iter().map(ManagerResponse::from).collect(),
    }))
}

pub async fn update_company(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<CompanyResponse>> {
    let mut conn = state.db()?;
    let _existing: Company = companies::table.find(company_id).first(&mut conn)?;

    let mut changeset = UpdateCompanyChangeset::default();

    for (field, slot) in [
        ("name", &mut changeset.name),
        ("legal_form", &mut changeset.legal_form),
        ("address", &mut changeset.address),
        ("tax_id", &mut changeset.tax_id),
        ("registry_id", &mut changeset.registry_id),
    ] {
        if let Some(value) = body.get(field) {
            let text = value
                .as_str()
                .ok_or_else(|| AppError::bad_request(format!("{field} must be a string")))?;
            if (field == "name" || field == "legal_form") && text.trim().is_empty() {
                return Err(AppError::bad_request(format!("{field} must not be empty")));
            }
            *slot = Some(text.trim().to_string());
        }
    }

    if let Some(value) = body.get("capital") {
        let capital = value
            .as_f64()
            .ok_or_else(|| AppError::bad_request("capital must be a number"))?;
        if capital < 0.0 {
            return Err(AppError::bad_request("capital must not be negative"));
        }
        changeset.capital = Some(capital);
    }

    match classify_nullable(body.get("email")).map_err(AppError::bad_request)? {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.email = Some(None),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() || !trimmed.contains('@') {
                return Err(AppError::bad_request("email must be a valid address"));
            }
            changeset.email = Some(Some(trimmed.to_string()));
        }
    }

    diesel::update(companies::table.find(company_id))
        .set((
            &changeset,
            companies::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: Company = companies::table.find(company_id).first(&mut conn)?;
    Ok(Json(CompanyResponse::from(updated)))
}

pub async fn delete_company(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let document_count: i64 = documents::table
        .filter(documents::company_id.eq(company_id))
        .select(count_star())
        .first(&mut conn)?;
    if document_count > 0 {
        return Err(AppError::bad_request(
            "cannot delete a company that still owns generated documents",
        ));
    }

    let deleted = diesel::delete(companies::table.find(company_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
