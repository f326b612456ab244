//! Procès-verbal generation pipeline: template registry → list expansion →
//! scalar substitution → DOCX assembly → best-effort PDF conversion.

pub mod convert;
pub mod docx;
pub mod render;
pub mod template;

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Company, Manager, Partner};
use crate::shares;
use crate::state::AppState;
use render::{format_amount, format_count, format_percent, RenderContext};
use template::Template;

pub struct GenerationInput<'a> {
    pub template: &'static Template,
    pub company: &'a Company,
    pub partners: &'a [Partner],
    pub managers: &'a [Manager],
    pub fiscal_year: &'a str,
    pub result_amount: f64,
    pub dividend_amount: f64,
    pub deficit: bool,
}

/// The DOCX key is always present on success; the PDF side carries either
/// the key or the conversion error detail, never both.
pub struct GenerationOutcome {
    pub docx_key: String,
    pub pdf_key: Option<String>,
    pub pdf_error: Option<String>,
}

pub fn docx_key(document_id: Uuid) -> String {
    format!("pv/{document_id}.docx")
}

pub fn pdf_key(document_id: Uuid) -> String {
    format!("pv/{document_id}.pdf")
}

/// Runs the full pipeline for one document. A DOCX failure aborts the
/// operation; a PDF conversion failure degrades to partial success with the
/// DOCX artifact left valid.
pub async fn generate(
    state: &AppState,
    document_id: Uuid,
    input: &GenerationInput<'_>,
) -> Result<GenerationOutcome> {
    let context = build_context(input);
    let expanded = render::expand_lists(input.template.body, template::LIST_FRAGMENTS, &context.lists);
    let text = render::substitute(&expanded, &context.vars);

    let lines = docx::parse_lines(&text);
    let bytes = docx::build_docx(&lines).context("failed to assemble docx")?;

    let docx_key = docx_key(document_id);
    state
        .artifacts
        .put(&docx_key, bytes)
        .await
        .context("failed to persist docx artifact")?;

    let pdf_key = pdf_key(document_id);
    let docx_path = state.artifacts.absolute_path(&docx_key);
    let out_dir = docx_path
        .parent()
        .map(|p| p.to_path_buf())
        .context("docx artifact has no parent directory")?;
    let soffice_bin = state.config.soffice_bin.clone();

    let conversion =
        task::spawn_blocking(move || convert::docx_to_pdf(&soffice_bin, &docx_path, &out_dir))
            .await
            .context("pdf conversion task panicked")?;

    match conversion {
        Ok(_) => Ok(GenerationOutcome {
            docx_key,
            pdf_key: Some(pdf_key),
            pdf_error: None,
        }),
        Err(err) => {
            warn!(document_id = %document_id, error = %err, "pdf conversion failed; docx kept");
            // A stale PDF from an earlier run must not outlive this failure.
            if let Err(cleanup_err) = state.artifacts.delete(&pdf_key).await {
                warn!(document_id = %document_id, error = %cleanup_err, "failed to remove stale pdf");
            }
            Ok(GenerationOutcome {
                docx_key,
                pdf_key: None,
                pdf_error: Some(err.to_string()),
            })
        }
    }
}

fn build_context(input: &GenerationInput<'_>) -> RenderContext {
    let mut context = RenderContext::default();
    let company = input.company;
    let now = Utc::now();

    context.set("RAISON_SOCIALE", &company.name);
    context.set("FORME_JURIDIQUE", &company.legal_form);
    context.set("CAPITAL", format_amount(company.capital));
    context.set("SIEGE_SOCIAL", &company.address);
    context.set("MATRICULE_FISCAL", &company.tax_id);
    context.set("RC", &company.registry_id);
    context.set("EXERCICE", input.fiscal_year);
    context.set("ANNEE", now.format("%Y").to_string());
    context.set("DATE_GENERATION", now.format("%d/%m/%Y").to_string());

    let result = if input.deficit {
        input.result_amount.abs()
    } else {
        input.result_amount
    };
    context.set("RESULTAT", format_amount(result));
    context.set("DIVIDENDES", format_amount(input.dividend_amount));

    let partner_rows: Vec<HashMap<String, String>> = input
        .partners
        .iter()
        .map(|partner| {
            row(&[
                ("NOM_ASSOCIE", partner.full_name.clone()),
                ("CIN", partner.cin.clone()),
                ("PARTS", format_count(i64::from(partner.shares))),
                ("POURCENTAGE", format_percent(partner.percentage)),
            ])
        })
        .collect();
    context.set_list(template::LIST_ASSOCIES, partner_rows);

    let manager_rows: Vec<HashMap<String, String>> = input
        .managers
        .iter()
        .map(|manager| {
            row(&[
                ("NOM_GERANT", manager.full_name.clone()),
                ("CIN", manager.cin.clone()),
                ("FONCTION", manager.role_title.clone()),
            ])
        })
        .collect();
    context.set_list(template::LIST_GERANTS, manager_rows);

    let shares_vec: Vec<i32> = input.partners.iter().map(|p| p.shares).collect();
    let allotments = shares::dividend_allotments(&shares_vec, input.dividend_amount);
    let breakdown_rows: Vec<HashMap<String, String>> = input
        .partners
        .iter()
        .zip(allotments)
        .map(|(partner, allotment)| {
            row(&[
                ("NOM_ASSOCIE", partner.full_name.clone()),
                ("PARTS", format_count(i64::from(partner.shares))),
                ("POURCENTAGE", format_percent(partner.percentage)),
                ("MONTANT", format_amount(allotment)),
            ])
        })
        .collect();
    context.set_list(template::LIST_REPARTITION, breakdown_rows);

    context
}

fn row(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
