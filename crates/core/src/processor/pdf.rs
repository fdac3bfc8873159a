//! PDF page rendering and merging via poppler.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::archive::{build_zip, extract_matching, has_extension};
use super::config::ToolsConfig;
use super::error::ProcessorError;
use super::sink::OutputSink;
use super::tools::{check_tool, path_arg, run_tool};
use super::traits::Processor;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};

pub const OP_TO_IMAGES: &str = "pdf_to_images";
pub const OP_MERGE: &str = "merge_pdfs";

const PAGE_PREFIX: &str = "page";

/// PDF processor: `pdftoppm` for rendering, `pdfunite` for merging,
/// `lopdf` for validation.
pub struct PdfProcessor {
    config: ToolsConfig,
}

/// Parses a PDF and returns its page count.
pub fn pdf_page_count(data: &[u8]) -> Result<usize, ProcessorError> {
    let document = lopdf::Document::load_mem(data)
        .map_err(|e| ProcessorError::invalid_input(format!("not a valid PDF: {}", e)))?;
    Ok(document.get_pages().len())
}

/// Pages rendered by pdftoppm (`page-1.png`, `page-01.png`, ...), in page
/// order.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let number = name
            .strip_prefix(PAGE_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(number) = number {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

impl PdfProcessor {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    async fn to_images(
        &self,
        data: Vec<u8>,
        scratch: &Path,
        base_name: &str,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let (data, pages) = tokio::task::spawn_blocking(move || {
            let pages = pdf_page_count(&data)?;
            Ok::<_, ProcessorError>((data, pages))
        })
        .await??;
        if pages == 0 {
            return Err(ProcessorError::invalid_input("PDF has no pages"));
        }

        let input = scratch.join("input.pdf");
        tokio::fs::write(&input, &data).await?;
        let render_dir = scratch.join("pages");
        tokio::fs::create_dir_all(&render_dir).await?;

        let args = vec![
            "-png".to_string(),
            "-r".to_string(),
            self.config.pdf_render_dpi.to_string(),
            path_arg(&input),
            path_arg(&render_dir.join(PAGE_PREFIX)),
        ];
        run_tool("pdftoppm", &self.config.pdftoppm_path, &args, self.config.timeout_secs).await?;

        let archive = tokio::task::spawn_blocking(move || {
            let rendered = rendered_pages(&render_dir)?;
            if rendered.is_empty() {
                return Err(ProcessorError::tool_failed(
                    "pdftoppm",
                    "no pages were rendered",
                    None,
                ));
            }
            let entries: Vec<(String, PathBuf)> = rendered
                .into_iter()
                .enumerate()
                .map(|(i, path)| (format!("page_{}.png", i + 1), path))
                .collect();
            debug!(pages = entries.len(), "Zipping rendered pages");
            build_zip(&entries)
        })
        .await??;

        let locator = sink
            .put_bytes(&format!("{}_images.zip", base_name), archive)
            .await?;
        Ok(ProcessOutput::single(locator))
    }

    async fn merge(
        &self,
        data: Vec<u8>,
        scratch: &Path,
        base_name: &str,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let parts_dir = scratch.join("parts");
        tokio::fs::create_dir_all(&parts_dir).await?;

        let parts = tokio::task::spawn_blocking(move || {
            let parts = extract_matching(&data, &parts_dir, |name| has_extension(name, &["pdf"]))?;
            if parts.is_empty() {
                return Err(ProcessorError::invalid_input(
                    "no PDF files found in archive",
                ));
            }
            for part in &parts {
                let bytes = std::fs::read(&part.path)?;
                pdf_page_count(&bytes).map_err(|_| {
                    ProcessorError::invalid_input(format!("{} is not a valid PDF", part.name))
                })?;
            }
            Ok(parts)
        })
        .await??;

        let output_name = format!("{}_merged.pdf", base_name);
        let locator = if parts.len() == 1 {
            sink.put_file(&output_name, &parts[0].path).await?
        } else {
            let merged = scratch.join("merged.pdf");
            let mut args: Vec<String> = parts.iter().map(|p| path_arg(&p.path)).collect();
            args.push(path_arg(&merged));
            run_tool("pdfunite", &self.config.pdfunite_path, &args, self.config.timeout_secs)
                .await?;
            sink.put_file(&output_name, &merged).await?
        };

        info!(documents = parts.len(), output = %output_name, "PDFs merged");
        Ok(ProcessOutput::single(locator))
    }
}

#[async_trait]
impl Processor for PdfProcessor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn routes(&self) -> Vec<MatchRule> {
        vec![MatchRule::prefix("pdf_"), MatchRule::exact(OP_MERGE)]
    }

    fn operations(&self) -> &[&'static str] {
        &[OP_TO_IMAGES, OP_MERGE]
    }

    async fn process(
        &self,
        mut request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let operation = request.operation.clone();
        if operation != OP_TO_IMAGES && operation != OP_MERGE {
            return Err(ProcessorError::unsupported(self.name(), operation));
        }

        let data = request.read_input().await?;
        let scratch = self.config.scratch("transmute-pdf-")?;

        if operation == OP_TO_IMAGES {
            self.to_images(data, scratch.path(), &request.base_name, sink)
                .await
        } else {
            self.merge(data, scratch.path(), &request.base_name, sink)
                .await
        }
    }

    async fn validate(&self) -> Result<(), ProcessorError> {
        check_tool("pdftoppm", &self.config.pdftoppm_path, "-v").await?;
        check_tool("pdfunite", &self.config.pdfunite_path, "-v").await
    }
}
