//! Text extraction with OCR fallback (§4.4). Extraction is mime-dispatched;
//! when the extracted text falls under the configured threshold (a scanned
//! PDF with no text layer, typically) the document is handed to OCR.

use crate::error::{Error, Result};
use crate::providers::OcrProvider;
use std::path::Path;
use std::sync::Arc;

/// Outcome of an OCR fallback attempt, or `None` if the primary extraction
/// already cleared the text threshold and OCR was never invoked.
pub type OcrOutcome = Option<&'static str>;

pub async fn extract(path: &Path, mime_type: &str, ocr: &Arc<dyn OcrProvider>, ocr_min_text_threshold: usize) -> Result<(String, OcrOutcome)> {
    let primary = extract_primary(path, mime_type).await?;
    if primary.chars().count() >= ocr_min_text_threshold {
        return Ok((primary, None));
    }
    tracing::info!(mime_type, chars = primary.chars().count(), "text under threshold, falling back to OCR");
    match ocr.extract_text(path, "eng").await {
        Ok(ocr_text) if ocr_text.chars().count() > primary.chars().count() => Ok((ocr_text, Some("success"))),
        Ok(_) => Ok((primary, Some("success"))),
        Err(e) => {
            tracing::warn!(error = %e, "ocr fallback failed, keeping primary extraction");
            Ok((primary, Some("fail")))
        }
    }
}

async fn extract_primary(path: &Path, mime_type: &str) -> Result<String> {
    match mime_type {
        "text/plain" | "text/csv" => tokio::fs::read_to_string(path).await.map_err(Error::Io),
        "application/json" => {
            let raw = tokio::fs::read_to_string(path).await.map_err(Error::Io)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        "application/pdf" => extract_pdf(path).await,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => extract_docx(path).await,
        "application/msword" => {
            // Legacy binary .doc has no crate in the dependency stack; treat
            // as opaque and let OCR (threshold 0 chars) carry it.
            Ok(String::new())
        }
        other => Err(Error::Validation(crate::error::ValidationErrors::Single {
            field: "mime_type".to_string(),
            message: format!("no extractor for {other}"),
        })),
    }
}

async fn extract_pdf(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).unwrap_or_default()
    })
    .await
    .map_err(|e| Error::Internal(format!("pdf extraction task panicked: {e}")))
}

async fn extract_docx(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<String> {
        let bytes = std::fs::read(&path).map_err(Error::Io)?;
        let docx = docx_rs::read_docx(&bytes)
            .map_err(|e| Error::Internal(format!("docx parse failed: {e:?}")))?;
        Ok(docx_paragraphs_to_text(&docx))
    })
    .await
    .map_err(|e| Error::Internal(format!("docx extraction task panicked: {e}")))?
}

fn docx_paragraphs_to_text(docx: &docx_rs::Docx) -> String {
    use docx_rs::DocumentChild;
    docx.document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    use docx_rs::{ParagraphChild, RunChild};
    paragraph
        .children
        .iter()
        .filter_map(|child| match child {
            ParagraphChild::Run(run) => Some(
                run.children
                    .iter()
                    .filter_map(|rc| match rc {
                        RunChild::Text(t) => Some(t.text.clone()),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}
