use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult, ToolError};
use crate::pipeline::{OptimizationRequest, OutputKind, TempWorkspace, build_plan, invoker};
use crate::pipeline::options::looks_like_pdf;
use crate::telemetry;

/// Processed document ready to be sent back
#[derive(Debug)]
pub struct LightenedPdf {
    pub bytes: Bytes,
    pub filename: String,
}

/// Runs optimization requests against the configured tools
pub struct LightenService {
    config: Arc<Config>,
}

impl LightenService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline for one request.
    ///
    /// The workspace is dropped (and deleted) before this returns, on success
    /// and on every error path.
    pub async fn lighten(&self, request: OptimizationRequest) -> ServiceResult<LightenedPdf> {
        let tools = &self.config.tools;
        let workspace =
            TempWorkspace::create(tools.work_dir.as_deref()).map_err(ServiceError::Workspace)?;

        workspace
            .write_input(&request.pdf)
            .await
            .map_err(ServiceError::Workspace)?;

        let plan = build_plan(&request.options, tools, workspace.paths());
        info!(
            preset = %request.options.preset,
            ocr = request.options.ocr,
            clean = request.options.clean,
            oversample = request.options.oversample.level(),
            workspace = %workspace.path().display(),
            steps = plan.steps.len(),
            input_bytes = request.pdf.len(),
            "Running lighten pipeline"
        );

        for step in &plan.steps {
            invoker::run_step(step, tools.timeout()).await?;
        }

        let bytes = tokio::fs::read(&plan.final_output)
            .await
            .map_err(ServiceError::Workspace)?;

        if !looks_like_pdf(&bytes) {
            let tool = plan
                .steps
                .last()
                .map(|s| s.tool.name())
                .unwrap_or("ghostscript");
            warn!(tool, "Final output is not a PDF");
            return Err(ToolError::MissingOutput { tool }.into());
        }

        workspace.close();

        telemetry::record_sizes(request.pdf.len(), bytes.len());
        info!(
            input_bytes = request.pdf.len(),
            output_bytes = bytes.len(),
            "Lighten pipeline finished"
        );

        Ok(LightenedPdf {
            bytes: Bytes::from(bytes),
            filename: download_name(request.filename.as_deref(), plan.kind),
        })
    }
}

/// Name offered to the client: `<stem><suffix><ext>` from the uploaded name.
///
/// The uploaded extension is kept as-is, including none at all; only a missing
/// name falls back to `document.pdf`.
pub fn download_name(original: Option<&str>, kind: OutputKind) -> String {
    let base = original
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());

    let path = Path::new(&base);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!("{}{}{}", stem, kind.filename_suffix(), extension)
}

/// Drop characters that would break a quoted header value.
fn sanitize_filename(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' | '/' | ';' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
