use axum::{
    body::Bytes,
    extract::{Form, FromRequest, Multipart, Request},
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::views::WizardState;

/// An uploaded document after its name has been made safe for the filesystem.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
}

/// What a submission asks the server to work on.
#[derive(Debug)]
pub enum DraftInput {
    Text(String),
    Upload(Upload),
    Nothing,
}

/// Fields posted to `/` or `/demo`, as multipart or urlencoded.
#[derive(Debug, Default)]
pub struct SubmitForm {
    pub text: Option<String>,
    pub file: Option<Upload>,
    pub hidden: WizardState,
}

#[derive(Deserialize, Default)]
struct UrlEncodedFields {
    text: Option<String>,
    #[serde(default)]
    invisible_item1: String,
    #[serde(default)]
    invisible_item2: String,
    #[serde(default)]
    invisible_item3: String,
}

impl SubmitForm {
    /// Pasted text wins over an upload; an empty text field counts as absent.
    pub fn into_input(self) -> (DraftInput, WizardState) {
        let input = match (self.text, self.file) {
            (Some(text), _) if !text.is_empty() => DraftInput::Text(text),
            (_, Some(upload)) => DraftInput::Upload(upload),
            _ => DraftInput::Nothing,
        };
        (input, self.hidden)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = SubmitForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().and_then(sanitize_filename);
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    form.file = filename.map(|filename| Upload { filename, bytes });
                }
                "text" => form.text = Some(field.text().await.map_err(bad_multipart)?),
                "invisible_item1" => {
                    form.hidden.invisible_item1 = field.text().await.map_err(bad_multipart)?
                }
                "invisible_item2" => {
                    form.hidden.invisible_item2 = field.text().await.map_err(bad_multipart)?
                }
                "invisible_item3" => {
                    form.hidden.invisible_item3 = field.text().await.map_err(bad_multipart)?
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> AppError {
    let message = format!("Failed to parse multipart data: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}

impl From<UrlEncodedFields> for SubmitForm {
    fn from(fields: UrlEncodedFields) -> Self {
        SubmitForm {
            text: fields.text,
            file: None,
            hidden: WizardState {
                invisible_item1: fields.invisible_item1,
                invisible_item2: fields.invisible_item2,
                invisible_item3: fields.invisible_item3,
            },
        }
    }
}

impl<S> FromRequest<S> for SubmitForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<UrlEncodedFields>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(fields.into())
        } else {
            // Nothing we can read fields from: behaves like an empty form.
            Ok(UrlEncodedFields::default().into())
        }
    }
}

/// Byte budget for a sanitized upload name; leaves room for the scratch
/// and response prefixes within a 255-byte file name.
pub const MAX_FILENAME_BYTES: usize = 100;

/// Keeps the last path component and replaces anything outside letters,
/// digits, `.`, `_` and `-` with `_`. Long names are shortened to
/// [`MAX_FILENAME_BYTES`], keeping the extension. Returns `None` if nothing
/// usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let mut name: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while name.contains("..") {
        name = name.replace("..", ".");
    }
    let name = name.trim_start_matches(['.', '_']).trim_end_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(truncate_name(name, MAX_FILENAME_BYTES))
    }
}

fn truncate_name(name: &str, budget: usize) -> String {
    if name.len() <= budget {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= 16 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut cut = budget - ext.len();
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], ext)
}
