//! Document text extraction
//!
//! PDFs go through `pdftotext`; pages without a text layer are rasterized
//! with `pdftoppm` and run through `tesseract`. Anything else is read as
//! UTF-8 text. Extraction never fails outward: problems are logged and
//! reported as empty text.

use crate::config::ExtractionConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Extracted document text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// Whether any page needed OCR
    pub ocr_used: bool,
}

/// File in, text out
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Empty text means the document could not be read
    async fn extract(&self, path: &Path) -> Extraction;
}

/// Extractor backed by poppler-utils and tesseract
pub struct CommandExtractor {
    config: ExtractionConfig,
}

impl CommandExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    async fn try_extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        if is_pdf(path) {
            self.extract_pdf(path).await
        } else {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ExtractionError::Io {
                    source: e,
                    context: format!("Failed to read document: {:?}", path),
                })?;
            Ok(Extraction {
                text,
                ocr_used: false,
            })
        }
    }

    async fn extract_pdf(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let output = run(
            Command::new(&self.config.pdftotext_command)
                .arg("-layout")
                .arg(path)
                .arg("-"),
            &self.config.pdftotext_command,
        )
        .await?;

        let raw = String::from_utf8_lossy(&output).into_owned();
        let mut pages = split_pages(&raw);
        let mut ocr_used = false;

        if self.config.ocr_enabled {
            for (i, page) in pages.iter_mut().enumerate() {
                if page.trim().is_empty() {
                    ocr_used = true;
                    *page = self.ocr_page(path, i + 1).await.unwrap_or_else(|e| {
                        tracing::error!("OCR error on page {}: {}", i + 1, e);
                        String::new()
                    });
                }
            }
        }

        let mut text = String::new();
        for page in pages {
            text.push_str(&page);
            text.push('\n');
        }

        Ok(Extraction { text, ocr_used })
    }

    async fn ocr_page(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        let work_dir = std::env::temp_dir().join(format!("docqa-ocr-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| ExtractionError::Io {
                source: e,
                context: format!("Failed to create OCR directory: {:?}", work_dir),
            })?;

        let result = self.ocr_page_in(path, page, &work_dir).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            tracing::debug!("Failed to clean up {:?}: {}", work_dir, e);
        }

        result
    }

    async fn ocr_page_in(
        &self,
        path: &Path,
        page: usize,
        work_dir: &Path,
    ) -> Result<String, ExtractionError> {
        let prefix = work_dir.join("page");
        let page_arg = page.to_string();

        run(
            Command::new(&self.config.pdftoppm_command)
                .args(["-f", page_arg.as_str(), "-l", page_arg.as_str(), "-r", "300", "-png", "-singlefile"])
                .arg(path)
                .arg(&prefix),
            &self.config.pdftoppm_command,
        )
        .await?;

        let image: PathBuf = prefix.with_extension("png");
        let output = run(
            Command::new(&self.config.ocr_command).arg(&image).arg("stdout"),
            &self.config.ocr_command,
        )
        .await?;

        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

#[async_trait]
impl DocumentExtractor for CommandExtractor {
    async fn extract(&self, path: &Path) -> Extraction {
        match self.try_extract(path).await {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::error!("Error reading document: {}", e);
                Extraction::default()
            }
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// `pdftotext` separates pages with form feeds and ends the last page with one
fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw.split('\x0c').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().map(|p| p.trim().is_empty()).unwrap_or(false) {
        pages.pop();
    }
    pages
}

async fn run(command: &mut Command, name: &str) -> Result<Vec<u8>, ExtractionError> {
    let output = command.output().await.map_err(|e| ExtractionError::Io {
        source: e,
        context: format!("Failed to run {}", name),
    })?;

    if !output.status.success() {
        return Err(ExtractionError::Command {
            command: name.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}
