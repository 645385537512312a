use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State},
    response::{Html, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::api::models::{DraftInput, SubmitForm, Upload};
use crate::api::response;
use crate::error::Result;
use crate::store::response_filename;
use crate::views::WizardState;

pub fn create_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index_page).post(submit))
        .route("/demo", get(demo_page).post(demo_submit))
        .route("/dashboard", get(dashboard))
        .route("/contacts", get(contacts))
        .route("/download/{filename}", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>> {
    Ok(Html(state.views.index(&WizardState::blank())?))
}

/// Wizard step: new input pushes a reply into the hidden fields, anything
/// else re-renders the fields exactly as the client sent them.
async fn submit(State(state): State<AppState>, form: SubmitForm) -> Result<Html<String>> {
    let (input, hidden) = form.into_input();

    let wizard = match input {
        DraftInput::Text(text) => {
            info!(chars = text.len(), "drafting reply from pasted text");
            hidden.push(draft_from_text(&state, &text).await)
        }
        DraftInput::Upload(upload) => {
            info!(filename = %upload.filename, bytes = upload.bytes.len(), "drafting reply from upload");
            hidden.push(draft_from_upload(&state, &upload).await?)
        }
        DraftInput::Nothing => hidden,
    };

    Ok(Html(state.views.index(&wizard)?))
}

async fn demo_page(State(state): State<AppState>) -> Result<Html<String>> {
    Ok(Html(state.views.demo(None, None)?))
}

async fn demo_submit(State(state): State<AppState>, form: SubmitForm) -> Result<Html<String>> {
    let Some(upload) = form.file else {
        return demo_page(State(state)).await;
    };

    let reply = draft_from_upload(&state, &upload).await?;
    let filename = response_filename(&upload.filename);
    state.store.save(&reply, &filename).await?;
    info!(%filename, "demo reply saved");

    Ok(Html(state.views.demo(Some(&reply), Some(&filename))?))
}

async fn dashboard(State(state): State<AppState>) -> Result<Html<String>> {
    let history = state.store.list().await?;
    Ok(Html(state.views.dashboard(&history)?))
}

async fn contacts(State(state): State<AppState>) -> Result<Html<String>> {
    Ok(Html(state.views.contacts()?))
}

async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let path = state.store.resolve(&filename).await?;
    let file = tokio::fs::File::open(&path).await?;
    Ok(response::attachment(&filename, file))
}

/// The reply, or a prefixed error message in its place.
async fn draft_from_text(state: &AppState, text: &str) -> String {
    match state.generator.generate(text).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "reply generation failed");
            e.user_message()
        }
    }
}

/// Stores the upload under a unique scratch name, extracts its text and
/// drafts a reply. Extraction failures are reported in place of the reply
/// without calling the model.
async fn draft_from_upload(state: &AppState, upload: &Upload) -> Result<String> {
    let path = state
        .config
        .upload_dir
        .join(format!("{}_{}", Uuid::new_v4(), upload.filename));
    tokio::fs::write(&path, &upload.bytes).await?;

    let extracted = state.extractor.extract(&path).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "could not remove upload");
    }

    match extracted {
        Ok(text) => Ok(draft_from_text(state, &text).await),
        Err(e) => {
            warn!(filename = %upload.filename, error = %e, "text extraction failed");
            Ok(e.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LlmConfig, OcrConfig};
    use crate::error::{API_ERROR_PREFIX, ExtractError, OCR_ERROR_PREFIX};
    use crate::extract::{Rasterizer, Recognizer, TextExtractor};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use image::DynamicImage;
    use serde_json::json;
    use std::path::{Path as FsPath, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeOcr(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl Recognizer for FakeOcr {
        async fn recognize(&self, image: &FsPath) -> std::result::Result<String, ExtractError> {
            assert!(image.exists(), "upload should be on disk while recognised");
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(detail) => Err(ExtractError::Ocr {
                    detail: detail.to_string(),
                }),
            }
        }
    }

    struct NoPages;

    #[async_trait]
    impl Rasterizer for NoPages {
        async fn rasterize(
            &self,
            _document: &FsPath,
        ) -> std::result::Result<Vec<DynamicImage>, ExtractError> {
            Ok(Vec::new())
        }
    }

    struct TwoPages;

    #[async_trait]
    impl Rasterizer for TwoPages {
        async fn rasterize(
            &self,
            _document: &FsPath,
        ) -> std::result::Result<Vec<DynamicImage>, ExtractError> {
            Ok(vec![DynamicImage::new_rgb8(2, 2), DynamicImage::new_rgb8(3, 3)])
        }
    }

    struct Harness {
        server: TestServer,
        data: TempDir,
    }

    impl Harness {
        fn upload_dir(&self) -> PathBuf {
            self.data.path().join("uploads")
        }

        fn response_dir(&self) -> PathBuf {
            self.data.path().join("responses")
        }
    }

    async fn harness(llm: &MockServer, ocr: FakeOcr) -> Harness {
        harness_with_pages(llm, ocr, Arc::new(NoPages)).await
    }

    async fn harness_with_pages(
        llm: &MockServer,
        ocr: FakeOcr,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Harness {
        let data = tempfile::tempdir().unwrap();
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            upload_dir: data.path().join("uploads"),
            response_dir: data.path().join("responses"),
            max_upload_bytes: 1024 * 1024,
            ocr: OcrConfig {
                tesseract_path: PathBuf::from("tesseract"),
                languages: "rus+eng".into(),
                timeout: Duration::from_secs(5),
                pdfium_lib_path: None,
                render_width: 100,
            },
            llm: LlmConfig {
                api_key: "sk-test".into(),
                base_url: llm.uri(),
                model: "deepseek-chat".into(),
                timeout: Duration::from_secs(5),
            },
        };
        let extractor =
            TextExtractor::new(Arc::new(ocr), rasterizer, config.upload_dir.clone());
        let state = AppState::new(config, extractor).unwrap();
        state.prepare_dirs().await.unwrap();

        Harness {
            server: TestServer::new(create_router(state)).unwrap(),
            data,
        }
    }

    async fn model_replies(server: &MockServer, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(server)
            .await;
    }

    fn hidden(html: &str, name: &str, value: &str) -> bool {
        html.contains(&format!("name=\"{name}\" value=\"{value}\""))
    }

    #[tokio::test]
    async fn first_visit_renders_blank_wizard() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h.server.get("/").await;
        response.assert_status_ok();
        let html = response.text();
        for name in ["invisible_item1", "invisible_item2", "invisible_item3"] {
            assert!(hidden(&html, name, " "), "{name} missing in {html}");
        }
    }

    #[tokio::test]
    async fn submission_without_input_passes_hidden_fields_through() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h
            .server
            .post("/")
            .form(&[
                ("invisible_item1", "step one"),
                ("invisible_item2", "step two"),
                ("invisible_item3", "step three"),
            ])
            .await;

        response.assert_status_ok();
        let html = response.text();
        assert!(hidden(&html, "invisible_item1", "step one"));
        assert!(hidden(&html, "invisible_item2", "step two"));
        assert!(hidden(&html, "invisible_item3", "step three"));
        assert!(llm.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multipart_without_file_passes_hidden_fields_through() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let form = MultipartForm::new()
            .add_text("text", "")
            .add_text("invisible_item1", "a")
            .add_text("invisible_item2", "b")
            .add_text("invisible_item3", "c")
            .add_part("file", Part::bytes(Vec::new()).file_name(""));
        let response = h.server.post("/").multipart(form).await;

        response.assert_status_ok();
        let html = response.text();
        assert!(hidden(&html, "invisible_item1", "a"));
        assert!(hidden(&html, "invisible_item2", "b"));
        assert!(hidden(&html, "invisible_item3", "c"));
    }

    #[tokio::test]
    async fn pasted_text_pushes_reply_into_first_field() {
        let llm = MockServer::start().await;
        model_replies(&llm, "Formal reply").await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h
            .server
            .post("/")
            .form(&[
                ("text", "draft a complaint"),
                ("invisible_item1", "older"),
                ("invisible_item2", "oldest"),
                ("invisible_item3", "dropped"),
            ])
            .await;

        response.assert_status_ok();
        let html = response.text();
        assert!(hidden(&html, "invisible_item1", "Formal reply"));
        assert!(hidden(&html, "invisible_item2", "older"));
        assert!(hidden(&html, "invisible_item3", "oldest"));
        assert!(!html.contains("dropped"));
    }

    #[tokio::test]
    async fn model_failure_is_rendered_not_raised() {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&llm)
            .await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h.server.post("/").form(&[("text", "draft a complaint")]).await;

        response.assert_status_ok();
        let html = response.text();
        assert!(
            html.contains(&format!("name=\"invisible_item1\" value=\"{API_ERROR_PREFIX}")),
            "{html}"
        );
    }

    #[tokio::test]
    async fn uploaded_image_is_recognised_then_sent_to_the_model() {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Request number 7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Reply to request 7"}}]
            })))
            .expect(1)
            .mount(&llm)
            .await;
        let h = harness(&llm, FakeOcr(Ok("  Request\nnumber   7 "))).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"fake png".to_vec())
                .file_name("scan.png")
                .mime_type("image/png"),
        );
        let response = h.server.post("/").multipart(form).await;

        response.assert_status_ok();
        assert!(hidden(&response.text(), "invisible_item1", "Reply to request 7"));
        assert!(std::fs::read_dir(h.upload_dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn ocr_failure_skips_the_model() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Err("image too blurry"))).await;

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"x".to_vec()).file_name("scan.png"));
        let response = h.server.post("/").multipart(form).await;

        response.assert_status_ok();
        let html = response.text();
        assert!(hidden(
            &html,
            "invisible_item1",
            &format!("{OCR_ERROR_PREFIX}image too blurry")
        ));
        assert!(llm.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_saves_reply_and_history_lists_it() {
        let llm = MockServer::start().await;
        model_replies(&llm, "Ответ на запрос").await;
        let h = harness(&llm, FakeOcr(Ok("запрос"))).await;

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"img".to_vec()).file_name("letter.jpg"));
        let response = h.server.post("/demo").multipart(form).await;
        response.assert_status_ok();
        let html = response.text();
        assert!(html.contains("Ответ на запрос"));
        assert!(html.contains("/download/response_letter.jpg.txt"));

        let saved = std::fs::read_to_string(h.response_dir().join("response_letter.jpg.txt"))
            .unwrap();
        assert_eq!(saved, "Ответ на запрос");

        let history = h.server.get("/dashboard").await;
        history.assert_status_ok();
        let html = history.text();
        assert!(html.contains("response_letter.jpg.txt"));
        assert!(html.contains("Ответ на запрос"));
    }

    #[tokio::test]
    async fn demo_pdf_pages_are_joined_before_drafting() {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Page text\\nPage text\\n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Reply to both pages"}}]
            })))
            .expect(1)
            .mount(&llm)
            .await;
        let h = harness_with_pages(&llm, FakeOcr(Ok("Page text")), Arc::new(TwoPages)).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"%PDF-1.7".to_vec())
                .file_name("letter.pdf")
                .mime_type("application/pdf"),
        );
        let response = h.server.post("/demo").multipart(form).await;

        response.assert_status_ok();
        assert!(response.text().contains("Reply to both pages"));
        let saved = std::fs::read_to_string(h.response_dir().join("response_letter.pdf.txt"))
            .unwrap();
        assert_eq!(saved, "Reply to both pages");
        assert!(std::fs::read_dir(h.upload_dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn long_upload_names_still_render_a_reply() {
        let llm = MockServer::start().await;
        model_replies(&llm, "Short reply").await;
        let h = harness(&llm, FakeOcr(Ok("text"))).await;

        let long_name = format!("{}.png", "я".repeat(120));
        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"img".to_vec()).file_name(long_name.clone()));
        let response = h.server.post("/").multipart(form).await;
        response.assert_status_ok();
        assert!(hidden(&response.text(), "invisible_item1", "Short reply"));

        let long_name = format!("{}.png", "я".repeat(124));
        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"img".to_vec()).file_name(long_name));
        let response = h.server.post("/demo").multipart(form).await;
        response.assert_status_ok();
        assert!(response.text().contains("Short reply"));

        let saved: Vec<_> = std::fs::read_dir(h.response_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].ends_with(".png.txt"), "got: {saved:?}");
        assert!(saved[0].len() < 255);
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(vec![0u8; 2 * 1024 * 1024]).file_name("huge.png"),
        );
        let response = h.server.post("/").multipart(form).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(llm.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_without_file_renders_empty_page() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h.server.post("/demo").form(&[("other", "x")]).await;
        response.assert_status_ok();
        assert!(!response.text().contains("Download"));
        assert!(std::fs::read_dir(h.response_dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn download_serves_attachment() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;
        std::fs::write(h.response_dir().join("response_a.png.txt"), "saved reply").unwrap();

        let response = h.server.get("/download/response_a.png.txt").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "saved reply");
        let disposition = response.header("content-disposition");
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains("response_a.png.txt"));
        assert!(
            response
                .header("content-type")
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }

    #[tokio::test]
    async fn download_of_missing_file_is_not_found() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h.server.get("/download/response_nothing.txt").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_rejects_traversal() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;
        std::fs::write(h.data.path().join("secrets.txt"), "DEEPSEEK_API_KEY=k").unwrap();

        let response = h.server.get("/download/..%2Fsecrets.txt").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(!response.text().contains("DEEPSEEK_API_KEY"));
    }

    #[tokio::test]
    async fn contacts_page_renders() {
        let llm = MockServer::start().await;
        let h = harness(&llm, FakeOcr(Ok(""))).await;

        let response = h.server.get("/contacts").await;
        response.assert_status_ok();
        assert!(response.text().contains("Contacts"));
    }
}
