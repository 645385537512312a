use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::secrets::SecretStore;

pub const DEFAULT_API_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_OCR_LANGUAGES: &str = "rus+eng";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub response_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract_path: PathBuf,
    /// Tesseract language list, e.g. `rus+eng`.
    pub languages: String,
    pub timeout: Duration,
    pub pdfium_lib_path: Option<PathBuf>,
    pub render_width: u32,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let secrets_path =
            env::var("STATEMATE_SECRETS").unwrap_or_else(|_| "secrets.txt".to_string());
        let secrets = SecretStore::load(&secrets_path)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let data_dir = PathBuf::from(
            env::var("STATEMATE_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => parse_number("MAX_UPLOAD_BYTES", &raw)?,
            Err(_) => 20 * 1024 * 1024,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            upload_dir: data_dir.join("uploads"),
            response_dir: data_dir.join("responses"),
            max_upload_bytes,
            ocr: OcrConfig::from_secrets(&secrets)?,
            llm: LlmConfig::from_secrets(&secrets)?,
        })
    }
}

impl OcrConfig {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self> {
        Ok(OcrConfig {
            tesseract_path: PathBuf::from(secrets.get("TESSERACT_PATH").unwrap_or("tesseract")),
            languages: secrets
                .get("OCR_LANGUAGES")
                .unwrap_or(DEFAULT_OCR_LANGUAGES)
                .to_string(),
            timeout: secs_or(secrets, "OCR_TIMEOUT_SECS", 120)?,
            pdfium_lib_path: secrets.get("PDFIUM_LIB_PATH").map(PathBuf::from),
            render_width: match secrets.get("RENDER_WIDTH") {
                Some(raw) => parse_number("RENDER_WIDTH", raw)?,
                None => 2000,
            },
        })
    }
}

impl LlmConfig {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self> {
        Ok(LlmConfig {
            api_key: secrets.require("DEEPSEEK_API_KEY")?.to_string(),
            base_url: secrets
                .get("API_BASE_URL")
                .unwrap_or(DEFAULT_API_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: secrets.get("MODEL").unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: secs_or(secrets, "API_TIMEOUT_SECS", 120)?,
        })
    }
}

fn secs_or(secrets: &SecretStore, key: &str, default: u64) -> Result<Duration> {
    let secs = match secrets.get(key) {
        Some(raw) => parse_number(key, raw)?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}
