//! Optimization options and their validation.
//!
//! Form values arrive as loose strings; [`RawOptions::resolve`] turns them into
//! a fully-defaulted [`OptimizationOptions`] or fails closed with a
//! validation error.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};

/// Ghostscript compression profile
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(try_from = "String", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Preset {
    #[default]
    Ebook,
    Screen,
    Printer,
}

impl Preset {
    /// Value for Ghostscript's `-dPDFSETTINGS`
    pub fn pdf_settings(self) -> &'static str {
        match self {
            Preset::Ebook => "/ebook",
            Preset::Screen => "/screen",
            Preset::Printer => "/printer",
        }
    }
}

impl TryFrom<String> for Preset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse()
            .map_err(|_| format!("Invalid preset: {}", value.trim()))
    }
}

/// OCR oversampling level, always within 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oversample(u8);

impl Oversample {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// Clamp an arbitrary level into range.
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Target DPI passed to `ocrmypdf --oversample`
    pub fn dpi(self) -> u32 {
        match self.0 {
            1 => 150,
            2 => 300,
            3 => 400,
            _ => 600,
        }
    }
}

impl Default for Oversample {
    fn default() -> Self {
        Self(2)
    }
}

/// Validated, defaulted options for one optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationOptions {
    pub preset: Preset,
    pub ocr: bool,
    pub autorotate: bool,
    pub deskew: bool,
    pub clean: bool,
    /// Only consulted when `ocr` is set.
    pub oversample: Oversample,
}

impl OptimizationOptions {
    /// Options used when the client sends nothing but a file.
    pub fn defaults(config: &Config) -> Self {
        Self {
            preset: config.default_preset,
            ocr: config.ocr_default,
            autorotate: false,
            deskew: false,
            clean: true,
            oversample: Oversample::default(),
        }
        .normalized()
    }

    /// Autorotate and deskew are OCR-stage options and are dropped without OCR.
    fn normalized(mut self) -> Self {
        if !self.ocr {
            self.autorotate = false;
            self.deskew = false;
        }
        self
    }
}

/// Option values exactly as received from the client
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub preset: Option<String>,
    pub ocr: Option<String>,
    pub autorotate: Option<String>,
    pub deskew: Option<String>,
    pub clean: Option<String>,
    pub oversample: Option<String>,
}

impl RawOptions {
    pub fn resolve(&self, config: &Config) -> ServiceResult<OptimizationOptions> {
        let defaults = OptimizationOptions::defaults(config);

        let preset = match non_empty(&self.preset) {
            Some(value) => Preset::try_from(value.to_string()).map_err(ServiceError::validation)?,
            None => defaults.preset,
        };

        let oversample = match non_empty(&self.oversample) {
            Some(value) => parse_oversample(value)?,
            None => defaults.oversample,
        };

        let options = OptimizationOptions {
            preset,
            ocr: parse_flag("ocr", &self.ocr, config.ocr_default)?,
            autorotate: parse_flag("autorotate", &self.autorotate, false)?,
            deskew: parse_flag("deskew", &self.deskew, false)?,
            clean: parse_flag("clean", &self.clean, true)?,
            oversample,
        };

        Ok(options.normalized())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Any integer is accepted and clamped, including ones past `i64`.
fn parse_oversample(value: &str) -> ServiceResult<Oversample> {
    if let Ok(level) = value.parse::<i64>() {
        return Ok(Oversample::clamped(level));
    }

    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Oversample::clamped(if negative { i64::MIN } else { i64::MAX }));
    }

    Err(ServiceError::validation(format!(
        "Invalid oversample value: {} (use {}-{})",
        value,
        Oversample::MIN,
        Oversample::MAX
    )))
}

fn parse_flag(name: &str, value: &Option<String>, default: bool) -> ServiceResult<bool> {
    let Some(value) = non_empty(value) else {
        return Ok(default);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ServiceError::validation(format!(
            "Invalid {} value: {} (use 0 or 1)",
            name, value
        ))),
    }
}

/// A validated request: PDF bytes plus resolved options
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub pdf: Bytes,
    /// Client-supplied filename, used only to name the download.
    pub filename: Option<String>,
    pub options: OptimizationOptions,
}

impl OptimizationRequest {
    pub fn new(
        pdf: Bytes,
        filename: Option<String>,
        options: OptimizationOptions,
        max_bytes: u64,
    ) -> ServiceResult<Self> {
        if pdf.len() as u64 > max_bytes {
            return Err(ServiceError::FileTooLarge {
                size: pdf.len() as u64,
                max: max_bytes,
            });
        }
        if pdf.is_empty() {
            return Err(ServiceError::validation("Uploaded file is empty"));
        }
        if !looks_like_pdf(&pdf) {
            return Err(ServiceError::validation("Uploaded file is not a PDF"));
        }

        Ok(Self {
            pdf,
            filename,
            options,
        })
    }
}

/// PDF readers accept the `%PDF-` header anywhere in the first 1024 bytes.
pub fn looks_like_pdf(data: &[u8]) -> bool {
    const MAGIC: &[u8] = b"%PDF-";
    let head = &data[..data.len().min(1024)];
    head.windows(MAGIC.len()).any(|w| w == MAGIC)
}
