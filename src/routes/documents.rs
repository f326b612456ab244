use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::docgen::{self, docx::DOCX_CONTENT_TYPE, template};
use crate::error::{AppError, AppResult};
use crate::mailer::{EmailAttachment, OutboundEmail};
use crate::models::{
    Company, Document, DocumentType, Manager, NewDocument, NewNotification, Partner,
};
use crate::notify;
use crate::schema::{companies, document_types, documents, managers, notifications, partners};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub company_id: Uuid,
    pub document_type_id: Uuid,
    pub fiscal_year: String,
    pub result_amount: f64,
    #[serde(default)]
    pub dividend_amount: f64,
    #[serde(default)]
    pub deficit: bool,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub company_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: String,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub document_type_id: Uuid,
    pub fiscal_year: String,
    pub result_amount: f64,
    pub dividend_amount: f64,
    pub deficit: bool,
    pub docx_url: Option<String>,
    pub pdf_url: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl DocumentResponse {
    fn new(document: Document, public_base_url: &str) -> Self {
        Self {
            id: document.id,
            company_id: document.company_id,
            document_type_id: document.document_type_id,
            fiscal_year: document.fiscal_year,
            result_amount: document.result_amount,
            dividend_amount: document.dividend_amount,
            deficit: document.deficit,
            docx_url: document
                .docx_path
                .as_deref()
                .map(|key| public_url(public_base_url, key)),
            pdf_url: document
                .pdf_path
                .as_deref()
                .map(|key| public_url(public_base_url, key)),
            sent_at: document.sent_at.map(|at| at.and_utc().to_rfc3339()),
            created_at: document.created_at.and_utc().to_rfc3339(),
        }
    }
}

fn public_url(base: &str, key: &str) -> String {
    format!("{}/public/{key}", base.trim_end_matches('/'))
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub document: DocumentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_error: Option<String>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;

    let mut stmt = documents::table
        .order(documents::created_at.desc())
        .into_boxed();
    if let Some(company_id) = query.company_id {
        stmt = stmt.filter(documents::company_id.eq(company_id));
    }

    let rows: Vec<Document> = stmt.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|doc| DocumentResponse::new(doc, &state.config.public_base_url))
            .collect(),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    Ok(Json(DocumentResponse::new(
        document,
        &state.config.public_base_url,
    )))
}

pub async fn generate_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<(StatusCode, Json<GenerateResponse>)> {
    if payload.fiscal_year.trim().is_empty() {
        return Err(AppError::bad_request("fiscal_year must not be empty"));
    }
    if payload.dividend_amount < 0.0 {
        return Err(AppError::bad_request("dividend_amount must not be negative"));
    }

    let mut conn = state.db()?;
    let company: Company = companies::table
        .find(payload.company_id)
        .first(&mut conn)?;
    let document_type: DocumentType = document_types::table
        .find(payload.document_type_id)
        .first(&mut conn)?;
    let template = template::find(&document_type.template_key).ok_or_else(|| {
        AppError::internal(format!(
            "document type references unknown template {}",
            document_type.template_key
        ))
    })?;

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        company_id: company.id,
        document_type_id: document_type.id,
        fiscal_year: payload.fiscal_year.trim().to_string(),
        result_amount: payload.result_amount,
        dividend_amount: payload.dividend_amount,
        deficit: payload.deficit,
    };
    diesel::insert_into(documents::table)
        .values(&new_document)
        .execute(&mut conn)?;
    let document: Document = documents::table.find(new_document.id).first(&mut conn)?;

    let outcome = match run_pipeline(&state, &mut conn, &document, template, &company).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // A fatal DOCX failure must not leave a row with no artifacts.
            let _ = diesel::delete(documents::table.find(document.id)).execute(&mut conn);
            return Err(err);
        }
    };
    let refreshed: Document = documents::table.find(document.id).first(&mut conn)?;

    let message = match outcome.pdf_error {
        Some(_) => "document généré (DOCX seulement, conversion PDF échouée)".to_string(),
        None => "document généré".to_string(),
    };
    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            message,
            document: DocumentResponse::new(refreshed, &state.config.public_base_url),
            pdf_error: outcome.pdf_error,
        }),
    ))
}

/// Re-runs the pipeline against the company's current partners and managers,
/// overwriting both artifacts in place.
pub async fn regenerate_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<GenerateResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    let company: Company = companies::table
        .find(document.company_id)
        .first(&mut conn)?;
    let document_type: DocumentType = document_types::table
        .find(document.document_type_id)
        .first(&mut conn)?;
    let template = template::find(&document_type.template_key).ok_or_else(|| {
        AppError::internal(format!(
            "document type references unknown template {}",
            document_type.template_key
        ))
    })?;

    let outcome = run_pipeline(&state, &mut conn, &document, template, &company).await?;
    let refreshed: Document = documents::table.find(document.id).first(&mut conn)?;

    let message = match outcome.pdf_error {
        Some(_) => "document régénéré (DOCX seulement, conversion PDF échouée)".to_string(),
        None => "document régénéré".to_string(),
    };
    Ok(Json(GenerateResponse {
        message,
        document: DocumentResponse::new(refreshed, &state.config.public_base_url),
        pdf_error: outcome.pdf_error,
    }))
}

async fn run_pipeline(
    state: &AppState,
    conn: &mut PooledConnection<ConnectionManager<PgConnection>>,
    document: &Document,
    template: &'static template::Template,
    company: &Company,
) -> AppResult<docgen::GenerationOutcome> {
    let partner_rows: Vec<Partner> = partners::table
        .filter(partners::company_id.eq(company.id))
        .order(partners::created_at.asc())
        .load(conn)?;
    let manager_rows: Vec<Manager> = managers::table
        .filter(managers::company_id.eq(company.id))
        .order(managers::created_at.asc())
        .load(conn)?;

    let input = docgen::GenerationInput {
        template,
        company,
        partners: &partner_rows,
        managers: &manager_rows,
        fiscal_year: &document.fiscal_year,
        result_amount: document.result_amount,
        dividend_amount: document.dividend_amount,
        deficit: document.deficit,
    };

    let outcome = docgen::generate(state, document.id, &input).await?;

    diesel::update(documents::table.find(document.id))
        .set((
            documents::docx_path.eq(Some(outcome.docx_key.clone())),
            documents::pdf_path.eq(outcome.pdf_key.clone()),
            documents::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    Ok(outcome)
}

/// Replaces the generated DOCX with a hand-edited upload. The PDF rendered
/// from the previous DOCX no longer matches, so it is dropped.
pub async fn upload_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;

    let mut bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(filename) = field.file_name() {
            if !filename.to_ascii_lowercase().ends_with(".docx") {
                return Err(AppError::bad_request("uploaded file must be a .docx"));
            }
        }
        bytes = Some(
            field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?
                .to_vec(),
        );
    }

    let bytes = bytes.ok_or_else(|| AppError::bad_request("missing 'file' field"))?;
    // DOCX is a zip container; anything else would break every consumer.
    if !bytes.starts_with(b"PK") {
        return Err(AppError::bad_request("uploaded file is not a valid DOCX"));
    }

    let docx_key = docgen::docx_key(document.id);
    state.artifacts.put(&docx_key, bytes).await?;
    if let Some(pdf_key) = document.pdf_path.as_deref() {
        state.artifacts.delete(pdf_key).await?;
    }

    diesel::update(documents::table.find(document.id))
        .set((
            documents::docx_path.eq(Some(docx_key)),
            documents::pdf_path.eq(None::<String>),
            documents::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let refreshed: Document = documents::table.find(document.id).first(&mut conn)?;
    Ok(Json(DocumentResponse::new(
        refreshed,
        &state.config.public_base_url,
    )))
}

pub async fn export_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    let document_type: DocumentType = document_types::table
        .find(document.document_type_id)
        .first(&mut conn)?;

    let (key, extension) = match query.format.as_str() {
        "docx" => (document.docx_path.as_deref(), "docx"),
        "pdf" => (document.pdf_path.as_deref(), "pdf"),
        other => {
            return Err(AppError::bad_request(format!(
                "unknown export format '{other}'"
            )));
        }
    };
    let key = key.ok_or_else(|| {
        AppError::bad_request(format!("no {extension} artifact exists for this document"))
    })?;

    let bytes = state
        .artifacts
        .get(key)
        .await
        .map_err(|_| AppError::not_found())?;

    let filename = format!("{} {}.{extension}", document_type.name, document.fiscal_year);
    let content_type = mime_guess::from_ext(extension)
        .first_or_octet_stream()
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_content_disposition(&filename),
    );
    Ok((headers, bytes))
}

/// RFC 5987 disposition with an ASCII fallback, since type names carry
/// accented French characters.
fn attachment_content_disposition(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();
    let value = format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}");
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[derive(Serialize)]
pub struct SendResponse {
    pub message: String,
    pub document: DocumentResponse,
}

/// Emails the generated PV to the company's contact address. Delivery is the
/// point of this endpoint, so a transport failure is a hard error and the
/// document is not marked as sent.
pub async fn send_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<SendResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    let company: Company = companies::table
        .find(document.company_id)
        .first(&mut conn)?;
    let document_type: DocumentType = document_types::table
        .find(document.document_type_id)
        .first(&mut conn)?;

    let recipient = company
        .email
        .as_deref()
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| {
            AppError::bad_request("company has no contact email; set one before sending")
        })?;

    // Prefer the PDF; fall back to the DOCX when conversion never succeeded.
    let (key, filename, content_type) = if let Some(pdf_key) = document.pdf_path.as_deref() {
        (
            pdf_key,
            format!("{} {}.pdf", document_type.name, document.fiscal_year),
            "application/pdf".to_string(),
        )
    } else if let Some(docx_key) = document.docx_path.as_deref() {
        (
            docx_key,
            format!("{} {}.docx", document_type.name, document.fiscal_year),
            DOCX_CONTENT_TYPE.to_string(),
        )
    } else {
        return Err(AppError::bad_request(
            "document has no artifact; generate it before sending",
        ));
    };

    let bytes = state.artifacts.get(key).await?;
    let body = format!(
        "Bonjour,\n\nVeuillez trouver ci-joint le document « {} » pour l'exercice {} de la société {}.\n\nCordialement,\nPV Manager",
        document_type.name, document.fiscal_year, company.name
    );

    state
        .mailer
        .send(OutboundEmail {
            to: recipient.to_string(),
            subject: format!("{} — {} {}", company.name, document_type.name, document.fiscal_year),
            body,
            attachment: Some(EmailAttachment {
                filename,
                content_type,
                bytes,
            }),
        })
        .await
        .map_err(AppError::internal)?;

    diesel::update(documents::table.find(document.id))
        .set((
            documents::sent_at.eq(Some(Utc::now().naive_utc())),
            documents::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    diesel::insert_into(notifications::table)
        .values(&NewNotification {
            id: Uuid::new_v4(),
            recipient_id: user.user_id,
            sender_id: Some(user.user_id),
            kind: notify::KIND_DOCUMENT_SENT.to_string(),
            message: format!(
                "« {} {} » envoyé à {} ({})",
                document_type.name, document.fiscal_year, company.name, recipient
            ),
        })
        .execute(&mut conn)?;

    let refreshed: Document = documents::table.find(document.id).first(&mut conn)?;
    Ok(Json(SendResponse {
        message: format!("document envoyé à {recipient}"),
        document: DocumentResponse::new(refreshed, &state.config.public_base_url),
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;

    if let Some(key) = document.docx_path.as_deref() {
        state.artifacts.delete(key).await?;
    }
    if let Some(key) = document.pdf_path.as_deref() {
        state.artifacts.delete(key).await?;
    }

    diesel::delete(documents::table.find(document.id)).execute(&mut conn)?;
    Ok(StatusCode::NO_CONTENT)
}
