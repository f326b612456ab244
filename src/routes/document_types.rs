use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::docgen::template;
use crate::error::{AppError, AppResult};
use crate::models::{DocumentType, NewDocumentType};
use crate::schema::{document_types, documents};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateDocumentTypeRequest {
    pub name: String,
    pub template_key: String,
}

#[derive(Deserialize)]
pub struct UpdateDocumentTypeRequest {
    pub name: Option<String>,
    pub template_key: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentTypeResponse {
    pub id: Uuid,
    pub name: String,
    pub template_key: String,
}

impl From<DocumentType> for DocumentTypeResponse {
    fn from(document_type: DocumentType) -> Self {
        Self {
            id: document_type.id,
            name: document_type.name,
            template_key: document_type.template_key,
        }
    }
}

#[derive(Serialize)]
pub struct TemplateResponse {
    pub key: &'static str,
    pub title: &'static str,
}

/// Built-in template catalog, so clients can offer a picker when creating
/// a document type.
pub async fn list_templates(_user: AuthenticatedUser) -> Json<Vec<TemplateResponse>> {
    Json(
        template::all()
            .iter()
            .map(|t| TemplateResponse {
                key: t.key,
                title: t.title,
            })
            .collect(),
    )
}

pub async fn list_document_types(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentTypeResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<DocumentType> = document_types::table
        .order(document_types::name.asc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter().map(DocumentTypeResponse::from).collect(),
    ))
}

pub async fn create_document_type(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<CreateDocumentTypeRequest>,
) -> AppResult<(StatusCode, Json<DocumentTypeResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let template_key = payload.template_key.trim();
    if template::find(template_key).is_none() {
        return Err(AppError::bad_request(format!(
            "unknown template '{template_key}'"
        )));
    }

    let mut conn = state.db()?;
    let new_type = NewDocumentType {
        id: Uuid::new_v4(),
        name: name.to_string(),
        template_key: template_key.to_string(),
    };

    match diesel::insert_into(document_types::table)
        .values(&new_type)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request(
                "a document type with this name already exists",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let created: DocumentType = document_types::table.find(new_type.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(DocumentTypeResponse::from(created))))
}

pub async fn update_document_type(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(type_id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentTypeRequest>,
) -> AppResult<Json<DocumentTypeResponse>> {
    let mut conn = state.db()?;
    let existing: DocumentType = document_types::table.find(type_id).first(&mut conn)?;

    let name = match payload.name {
        Some(value) if value.trim().is_empty() => {
            return Err(AppError::bad_request("name must not be empty"));
        }
        Some(value) => value.trim().to_string(),
        None => existing.name.clone(),
    };
    let template_key = match payload.template_key {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if template::find(&trimmed).is_none() {
                return Err(AppError::bad_request(format!(
                    "unknown template '{trimmed}'"
                )));
            }
            trimmed
        }
        None => existing.template_key.clone(),
    };

    let result = diesel::update(document_types::table.find(type_id))
        .set((
            document_types::name.eq(&name),
            document_types::template_key.eq(&template_key),
            document_types::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn);
    match result {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request(
                "a document type with this name already exists",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let updated: DocumentType = document_types::table.find(type_id).first(&mut conn)?;
    Ok(Json(DocumentTypeResponse::from(updated)))
}

pub async fn delete_document_type(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(type_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let in_use: i64 = documents::table
        .filter(documents::document_type_id.eq(type_id))
        .select(count_star())
        .first(&mut conn)?;
    if in_use > 0 {
        return Err(AppError::bad_request(
            "cannot delete a document type that generated documents still reference",
        ));
    }

    let deleted = diesel::delete(document_types::table.find(type_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
