//! OCR fallback (§4.4, SPEC_FULL §11): invoked as a subprocess rather than
//! linked in-process, with a hard wall-clock timeout so a wedged OCR engine
//! cannot stall an ingestion worker.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, input_path: &Path, language: &str) -> Result<String>;
}

pub struct SubprocessOcrProvider {
    binary: String,
    timeout: Duration,
}

impl SubprocessOcrProvider {
    pub fn new(binary: String, timeout_seconds: u64) -> Self {
        Self { binary, timeout: Duration::from_secs(timeout_seconds) }
    }
}

#[async_trait]
impl OcrProvider for SubprocessOcrProvider {
    async fn extract_text(&self, input_path: &Path, language: &str) -> Result<String> {
        let output_path = input_path.with_extension("ocr.txt");

        let run = Command::new(&self.binary)
            .arg(input_path)
            .arg(&output_path)
            .arg("-l")
            .arg(language)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| Error::UpstreamUnavailable(format!("ocr process exceeded {:?} timeout", self.timeout)))?
            .map_err(Error::Io)?;

        if !output.status.success() {
            return Err(Error::UpstreamUnavailable(format!(
                "ocr process exited with status {}",
                output.status
            )));
        }

        let text = tokio::fs::read_to_string(&output_path).await.map_err(Error::Io)?;
        let _ = tokio::fs::remove_file(&output_path).await;
        Ok(text)
    }
}
