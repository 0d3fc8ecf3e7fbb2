//! `POST /api/pack` route.
//!
//! Reads the multipart form (`format`, `options`, `file`, `url`), validates it,
//! hands the input to the configured [`Packer`](crate::packing::Packer) and logs
//! the outcome. Failures are rendered through the error envelope.

use std::time::Instant;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};

use crate::http::error::{PackError, INVALID_FORM_DATA};
use crate::http::request::{resolve_client_ip, RequestId};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::latency;
use crate::observability::metrics;
use crate::observability::record::{ErrorInfo, Fields, Level, LogRecord};
use crate::packing::{OutputFormat, PackInput, PackOptions, PackResult, UploadedArchive};

/// Anything that can go wrong between receiving the form and returning content.
#[derive(Debug, thiserror::Error)]
pub enum PackRequestError {
    #[error("failed to read form data: {0}")]
    Form(#[from] MultipartError),

    #[error("failed to parse options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("{0}")]
    Pack(#[from] PackError),
}

/// Raw form fields as submitted.
#[derive(Debug, Default)]
pub struct PackForm {
    pub format: Option<String>,
    pub options: Option<String>,
    pub file: Option<UploadedArchive>,
    pub url: Option<String>,
}

/// A validated pack request.
#[derive(Debug)]
pub struct PackRequest {
    pub input: PackInput,
    pub format: OutputFormat,
    pub options: PackOptions,
}

impl PackForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = PackForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "format" => form.format = Some(field.text().await?),
                "options" => form.options = Some(field.text().await?),
                "url" => form.url = Some(field.text().await?),
                "file" => {
                    let file_name = field.file_name().unwrap_or("upload.zip").to_string();
                    let bytes = field.bytes().await?;
                    form.file = Some(UploadedArchive {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                // drain unknown fields so oversize bodies still hit the limit
                _ => {
                    field.bytes().await?;
                }
            }
        }
        Ok(form)
    }

    /// Validate fields; an uploaded file takes precedence over a URL.
    pub fn into_request(self) -> Result<PackRequest, PackRequestError> {
        let url = self.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

        let input = match (self.file, url) {
            (Some(archive), _) => PackInput::Archive(archive),
            (None, Some(url)) => PackInput::Remote { url },
            (None, None) => {
                return Err(PackError::Validation(
                    "Either repository URL or file is required".into(),
                )
                .into())
            }
        };

        let format: OutputFormat = self.format.as_deref().unwrap_or_default().parse()?;

        let options: PackOptions = match self.options.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => PackOptions::default(),
        };

        Ok(PackRequest {
            input,
            format,
            options,
        })
    }
}

pub async fn pack_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let start = Instant::now();

    match run_pack(&state, &headers, multipart).await {
        Ok((result, input_kind)) => {
            let summary = result.metadata.summary.clone().unwrap_or_default();
            let fields = Fields::new()
                .with("format", result.format.as_str())
                .with("repository", result.metadata.repository.as_str())
                .with("duration", latency::render(start))
                .with("inputType", input_kind)
                .with(
                    "metrics",
                    Fields::new()
                        .with("totalFiles", summary.total_files)
                        .with("totalCharacters", summary.total_characters)
                        .with("totalTokens", summary.total_tokens),
                );
            state.logger.log(
                LogRecord::new(Level::Info, "Pack operation completed")
                    .with_request_id(request_id.as_str())
                    .with_fields(fields),
            );
            metrics::record_pack(result.format.as_str(), "success");

            Json(result).into_response()
        }
        Err((err, format)) => {
            let mut fields = Fields::new().with("duration", latency::render(start));
            if let Some(format) = format {
                fields.insert("format", format.as_str());
            }
            state.logger.log(
                LogRecord::new(Level::Error, "Pack operation failed")
                    .with_request_id(request_id.as_str())
                    .with_fields(fields)
                    .with_error(ErrorInfo::from_error(&err)),
            );
            metrics::record_pack(format.map_or("unknown", |f| f.as_str()), "failure");

            ApiError::from_failure(&err, request_id).into_response()
        }
    }
}

/// Failures carry the output format once the form got far enough to name one.
async fn run_pack(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(PackResult, &'static str), (PackRequestError, Option<OutputFormat>)> {
    let request = read_request(multipart).await.map_err(|err| (err, None))?;
    let format = request.format;
    let input_kind = request.input.kind();
    let client_ip = resolve_client_ip(headers);

    let result = state
        .packer
        .pack(request.input, format, request.options, &client_ip)
        .await
        .map_err(|err| (PackRequestError::from(err), Some(format)))?;
    Ok((result, input_kind))
}

async fn read_request(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PackRequest, PackRequestError> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected non-multipart pack request");
        PackError::Validation(INVALID_FORM_DATA.into())
    })?;
    PackForm::read(multipart).await?.into_request()
}
