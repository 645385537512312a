pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod secrets;
pub mod store;
pub mod views;

use std::sync::Arc;

use config::Config;
use error::{AppError, Result};
use extract::TextExtractor;
use llm::ChatClient;
use store::FileStore;
use views::Views;

/// Application state shared across handlers. Everything in it is read-only;
/// the filesystem is the only shared mutable resource.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extractor: Arc<TextExtractor>,
    pub generator: Arc<ChatClient>,
    pub store: Arc<FileStore>,
    pub views: Arc<Views>,
}

impl AppState {
    /// State backed by tesseract and pdfium.
    pub fn from_config(config: Config) -> Result<Self> {
        let extractor = TextExtractor::from_config(&config.ocr, &config.upload_dir);
        Self::new(config, extractor)
    }

    pub fn new(config: Config, extractor: TextExtractor) -> Result<Self> {
        let generator = ChatClient::new(config.llm.clone())
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;
        let store = FileStore::new(&config.response_dir);

        Ok(AppState {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
            generator: Arc::new(generator),
            store: Arc::new(store),
            views: Arc::new(Views::new()?),
        })
    }

    /// Creates the uploads and responses directories.
    pub async fn prepare_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        self.store.ensure_dir().await
    }
}
