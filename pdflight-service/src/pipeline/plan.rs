//! Mapping from options to external tool command lines.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;

use super::options::OptimizationOptions;
use super::workspace::WorkspacePaths;

/// External tools the service knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ghostscript,
    Ocrmypdf,
    Qpdf,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Ghostscript => "ghostscript",
            Tool::Ocrmypdf => "ocrmypdf",
            Tool::Qpdf => "qpdf",
        }
    }
}

/// One external command line and the file it is expected to produce
#[derive(Debug, Clone)]
pub struct ToolStep {
    pub tool: Tool,
    pub program: String,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl ToolStep {
    /// Human-readable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the final file went through; drives the download name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Ghostscript only
    Compressed,
    /// Ghostscript + qpdf cleanup
    Cleaned,
    /// Ghostscript + ocrmypdf
    Ocr,
}

impl OutputKind {
    pub fn filename_suffix(self) -> &'static str {
        match self {
            OutputKind::Compressed => "_light",
            OutputKind::Cleaned => "_light_opt",
            OutputKind::Ocr => "_light_ocr",
        }
    }
}

/// Ordered tool invocations for one request
#[derive(Debug, Clone)]
pub struct InvocationPlan {
    pub steps: Vec<ToolStep>,
    pub final_output: PathBuf,
    pub kind: OutputKind,
}

/// Build the invocation plan. Deterministic: same inputs, same command lines.
pub fn build_plan(
    options: &OptimizationOptions,
    tools: &ToolsConfig,
    paths: &WorkspacePaths,
) -> InvocationPlan {
    let mut steps = vec![ghostscript_step(options, tools, &paths.input, &paths.compressed)];

    let (final_output, kind) = if options.ocr {
        steps.push(ocrmypdf_step(options, tools, &paths.compressed, &paths.output));
        (paths.output.clone(), OutputKind::Ocr)
    } else if options.clean {
        steps.push(qpdf_step(tools, &paths.compressed, &paths.output));
        (paths.output.clone(), OutputKind::Cleaned)
    } else {
        (paths.compressed.clone(), OutputKind::Compressed)
    };

    InvocationPlan {
        steps,
        final_output,
        kind,
    }
}

fn ghostscript_step(
    options: &OptimizationOptions,
    tools: &ToolsConfig,
    input: &Path,
    output: &Path,
) -> ToolStep {
    let mut output_arg = OsString::from("-sOutputFile=");
    output_arg.push(output);

    let args = vec![
        OsString::from("-sDEVICE=pdfwrite"),
        OsString::from("-dCompatibilityLevel=1.4"),
        OsString::from(format!("-dPDFSETTINGS={}", options.preset.pdf_settings())),
        OsString::from("-dSAFER"),
        OsString::from("-dNOPAUSE"),
        OsString::from("-dBATCH"),
        output_arg,
        input.as_os_str().to_owned(),
    ];

    ToolStep {
        tool: Tool::Ghostscript,
        program: tools.ghostscript.clone(),
        args,
        output: output.to_path_buf(),
    }
}

fn ocrmypdf_step(
    options: &OptimizationOptions,
    tools: &ToolsConfig,
    input: &Path,
    output: &Path,
) -> ToolStep {
    let mut args: Vec<OsString> = vec![
        "--force-ocr".into(),
        "-l".into(),
        tools.ocr_languages.as_str().into(),
    ];

    if options.autorotate {
        args.extend(["--rotate-pages", "--rotate-pages-threshold", "2"].map(OsString::from));
    }
    if options.deskew {
        args.push("--deskew".into());
    }
    if options.clean {
        args.push("--clean".into());
    }

    args.push("--oversample".into());
    args.push(options.oversample.dpi().to_string().into());
    args.extend(["--optimize", "3"].map(OsString::from));
    args.push(input.as_os_str().to_owned());
    args.push(output.as_os_str().to_owned());

    ToolStep {
        tool: Tool::Ocrmypdf,
        program: tools.ocrmypdf.clone(),
        args,
        output: output.to_path_buf(),
    }
}

fn qpdf_step(tools: &ToolsConfig, input: &Path, output: &Path) -> ToolStep {
    ToolStep {
        tool: Tool::Qpdf,
        program: tools.qpdf.clone(),
        args: vec![
            "--object-streams=generate".into(),
            "--stream-data=compress".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ],
        output: output.to_path_buf(),
    }
}
