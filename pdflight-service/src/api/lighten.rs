//! PDF lighten endpoint.

use axum::{
    extract::{Multipart, State, multipart::Field},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::{OptimizationRequest, RawOptions};
use crate::service::LightenedPdf;
use crate::telemetry;

use super::AppState;

/// Uploaded file as read from the form
struct Upload {
    data: Bytes,
    filename: Option<String>,
}

/// Optimize an uploaded PDF and return the result
pub async fn lighten_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ServiceError> {
    let job_id = Uuid::new_v4();
    let span = info_span!("lighten", %job_id);

    let result = lighten(&state, multipart).instrument(span).await;
    telemetry::record_request(match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    });

    result.map(pdf_response)
}

async fn lighten(state: &AppState, mut multipart: Multipart) -> ServiceResult<LightenedPdf> {
    let config = state.service.config();
    let max_bytes = config.max_upload_bytes();

    let mut upload: Option<Upload> = None;
    let mut raw = RawOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(ServiceError::validation("Only one file may be uploaded"));
                }
                upload = Some(read_upload(field, max_bytes).await?);
            }
            "preset" => raw.preset = Some(field.text().await.map_err(malformed)?),
            "ocr" => raw.ocr = Some(field.text().await.map_err(malformed)?),
            "autorotate" => raw.autorotate = Some(field.text().await.map_err(malformed)?),
            "deskew" => raw.deskew = Some(field.text().await.map_err(malformed)?),
            "clean" => raw.clean = Some(field.text().await.map_err(malformed)?),
            "oversample" => raw.oversample = Some(field.text().await.map_err(malformed)?),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let upload = upload.ok_or_else(|| ServiceError::validation("No file provided"))?;
    let options = raw.resolve(config)?;
    let request = OptimizationRequest::new(upload.data, upload.filename, options, max_bytes)?;

    state.service.lighten(request).await
}

/// Stream the file field, stopping as soon as it passes the size limit.
async fn read_upload(mut field: Field<'_>, max_bytes: u64) -> ServiceResult<Upload> {
    let filename = field.file_name().map(str::to_string);
    let mut data = BytesMut::new();

    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        let size = (data.len() + chunk.len()) as u64;
        if size > max_bytes {
            return Err(ServiceError::FileTooLarge {
                size,
                max: max_bytes,
            });
        }
        data.extend_from_slice(&chunk);
    }

    Ok(Upload {
        data: data.freeze(),
        filename,
    })
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::validation(format!("Malformed multipart body: {}", e.body_text()))
}

fn pdf_response(pdf: LightenedPdf) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&pdf.filename)),
        ],
        pdf.bytes,
    )
        .into_response()
}

/// `attachment` with an ASCII fallback name plus the RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();

    if ascii == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}
