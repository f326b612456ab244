//! DOCX to PDF conversion through the office-suite CLI.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("source document {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("converter binary '{0}' not found on PATH")]
    BinaryMissing(String),
    #[error("pdf conversion failed: {0}")]
    Failed(String),
}

/// Converts `docx_path` into a PDF next to it inside `out_dir`, returning
/// the produced file path. Blocking; callers run it on a blocking task.
pub fn docx_to_pdf(
    soffice_bin: &str,
    docx_path: &Path,
    out_dir: &Path,
) -> Result<PathBuf, ConvertError> {
    if !docx_path.exists() {
        return Err(ConvertError::SourceMissing(docx_path.to_path_buf()));
    }

    let output = Command::new(soffice_bin)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(out_dir)
        .arg(docx_path)
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConvertError::BinaryMissing(soffice_bin.to_string()));
        }
        Err(err) => return Err(ConvertError::Failed(err.to_string())),
    };

    if !output.status.success() {
        return Err(ConvertError::Failed(format!(
            "exit={} stderr={}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stem = docx_path
        .file_stem()
        .ok_or_else(|| ConvertError::Failed("source path has no file stem".to_string()))?;
    let pdf_path = out_dir.join(stem).with_extension("pdf");
    if !pdf_path.exists() {
        return Err(ConvertError::Failed(format!(
            "converter reported success but {pdf_path:?} is missing"
        )));
    }

    Ok(pdf_path)
}
