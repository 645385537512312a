use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors that reach the HTTP boundary or abort startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load secrets from {path}: {source}")]
    Secrets {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Render(#[from] minijinja::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_)
            | AppError::Secrets { .. }
            | AppError::Storage(_)
            | AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure while turning an uploaded document into text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot open document: {0}")]
    PdfOpen(String),

    #[error("rasterisation failed for page {page}: {detail}")]
    Rasterize { page: usize, detail: String },

    #[error("{detail}")]
    Ocr { detail: String },

    #[error("recognition timed out after {secs}s")]
    OcrTimeout { secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ExtractError {
    /// Text shown in place of a reply when extraction fails.
    pub fn user_message(&self) -> String {
        match self {
            ExtractError::PdfOpen(_) | ExtractError::Rasterize { .. } => {
                format!("{PDF_ERROR_PREFIX}{self}")
            }
            _ => format!("{OCR_ERROR_PREFIX}{self}"),
        }
    }
}

/// Failure while calling the chat-completion service.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response format from the model")]
    MalformedResponse,
}

impl GenerateError {
    pub fn user_message(&self) -> String {
        format!("{API_ERROR_PREFIX}{self}")
    }
}

pub const OCR_ERROR_PREFIX: &str = "OCR error: ";
pub const PDF_ERROR_PREFIX: &str = "PDF processing error: ";
pub const API_ERROR_PREFIX: &str = "API error: ";
