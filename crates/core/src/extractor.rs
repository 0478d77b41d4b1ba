use crate::error::IngestError;
use crate::models::Page;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

pub trait LayoutExtractor {
    fn extract_layout(&self, path: &Path) -> Result<Vec<String>, IngestError>;
}

pub trait OcrEngine {
    fn recognize_pages(&self, path: &Path) -> Result<Vec<String>, IngestError>;
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError>;
}

pub struct HybridExtractor<O, L> {
    ocr: O,
    layout: L,
}

impl<O, L> HybridExtractor<O, L>
where
    O: OcrEngine,
    L: LayoutExtractor,
{
    pub fn new(ocr: O, layout: L) -> Self {
        Self { ocr, layout }
    }
}

impl<O, L> PdfExtractor for HybridExtractor<O, L>
where
    O: OcrEngine,
    L: LayoutExtractor,
{
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        let layout_pages = self.layout.extract_layout(path)?;
        let ocr_pages = self.ocr.recognize_pages(path)?;

        if ocr_pages.len() != layout_pages.len() {
            return Err(IngestError::ExtractionFailure {
                page: (ocr_pages.len().min(layout_pages.len()) + 1) as u32,
                details: format!(
                    "ocr produced {} pages but the text layer has {}",
                    ocr_pages.len(),
                    layout_pages.len()
                ),
            });
        }

        let pages = ocr_pages
            .into_iter()
            .zip(layout_pages)
            .enumerate()
            .map(|(position, (ocr_text, layout_text))| Page {
                number: (position + 1) as u32,
                ocr_text,
                layout_text,
            })
            .collect::<Vec<_>>();

        info!(path = %path.display(), pages = pages.len(), "extracted document pages");
        Ok(pages)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfLayoutExtractor;

impl LayoutExtractor for LopdfLayoutExtractor {
    fn extract_layout(&self, path: &Path) -> Result<Vec<String>, IngestError> {
        let document = load_document(path)?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::ExtractionFailure {
                    page: page_no,
                    details: error.to_string(),
                })?;
            pages.push(text);
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf has no pages: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

fn load_document(path: &Path) -> Result<Document, IngestError> {
    Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub language: String,
    pub dpi: u32,
    pub pdftoppm_bin: PathBuf,
    pub tesseract_bin: PathBuf,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            language: "ben".to_string(),
            dpi: 300,
            pdftoppm_bin: PathBuf::from("pdftoppm"),
            tesseract_bin: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractOcr {
    fn recognize_page(&self, path: &Path, page: u32) -> Result<String, IngestError> {
        let prefix = std::env::temp_dir().join(format!("bangla-rag-{}", uuid::Uuid::new_v4()));
        let image = prefix.with_extension("png");

        let rasterized = Command::new(&self.pdftoppm_bin)
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|error| IngestError::ExtractionFailure {
                page,
                details: format!("failed to run {}: {error}", self.pdftoppm_bin.display()),
            })?;

        if !rasterized.status.success() {
            return Err(IngestError::ExtractionFailure {
                page,
                details: String::from_utf8_lossy(&rasterized.stderr).trim().to_string(),
            });
        }

        let recognized = Command::new(&self.tesseract_bin)
            .arg(&image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output();
        let _ = std::fs::remove_file(&image);

        let recognized = recognized.map_err(|error| IngestError::ExtractionFailure {
            page,
            details: format!("failed to run {}: {error}", self.tesseract_bin.display()),
        })?;

        if !recognized.status.success() {
            return Err(IngestError::ExtractionFailure {
                page,
                details: String::from_utf8_lossy(&recognized.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&recognized.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_pages(&self, path: &Path) -> Result<Vec<String>, IngestError> {
        let document = load_document(path)?;

        let mut pages = Vec::new();
        for page_no in document.get_pages().into_keys() {
            debug!(page = page_no, "running tesseract");
            pages.push(self.recognize_page(path, page_no)?);
        }
        Ok(pages)
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    source_path: String,
    language: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: String,
}

pub struct HttpOcrEngine {
    config: OcrEndpointConfig,
    timeout: Duration,
}

impl HttpOcrEngine {
    pub fn new(config: OcrEndpointConfig) -> Self {
        Self {
            config,
            timeout: Duration::from_secs(300),
        }
    }

    fn recognize_blocking(&self, path: &Path) -> Result<Vec<String>, IngestError> {
        let pdf = std::fs::read(path)?;
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
            language: self.config.language.clone(),
        };

        let client = Client::builder().timeout(self.timeout).build()?;
        let mut request = client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "ocr request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        payload_to_pages(&payload, path)
    }
}

impl OcrEngine for HttpOcrEngine {
    fn recognize_pages(&self, path: &Path) -> Result<Vec<String>, IngestError> {
        tokio::task::block_in_place(|| self.recognize_blocking(path))
    }
}

fn payload_to_pages(payload: &OcrResponse, path: &Path) -> Result<Vec<String>, IngestError> {
    if let Some(listed) = payload.pages.as_ref().filter(|listed| !listed.is_empty()) {
        let numbered = listed
            .iter()
            .enumerate()
            .map(|(position, page)| {
                let number = page.page.unwrap_or((position + 1) as u32);
                (number, page.text.clone().unwrap_or_default())
            })
            .collect::<Vec<_>>();

        let mut pages: Vec<Option<String>> = vec![None; numbered.len()];
        for (number, text) in numbered {
            let slot = (number as usize)
                .checked_sub(1)
                .and_then(|position| pages.get_mut(position))
                .ok_or_else(|| {
                    IngestError::OcrFailed(format!(
                        "ocr response for {} lists page {number} of {}",
                        path.display(),
                        listed.len()
                    ))
                })?;

            if slot.is_some() {
                return Err(IngestError::OcrFailed(format!(
                    "ocr response for {} lists page {number} twice",
                    path.display()
                )));
            }
            *slot = Some(text);
        }
        return Ok(pages.into_iter().flatten().collect());
    }

    if let Some(raw_text) = &payload.text {
        let mut pages = raw_text
            .split('\u{000c}')
            .map(|chunk| chunk.to_string())
            .collect::<Vec<_>>();

        if pages.len() > 1 && pages.last().is_some_and(|last| last.trim().is_empty()) {
            pages.pop();
        }

        return Ok(pages);
    }

    Err(IngestError::OcrFailed(format!(
        "ocr response was empty for {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    struct FixedPages(Vec<String>);

    impl OcrEngine for FixedPages {
        fn recognize_pages(&self, _path: &Path) -> Result<Vec<String>, IngestError> {
            Ok(self.0.clone())
        }
    }

    impl LayoutExtractor for FixedPages {
        fn extract_layout(&self, _path: &Path) -> Result<Vec<String>, IngestError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        fn recognize_pages(&self, _path: &Path) -> Result<Vec<String>, IngestError> {
            Err(IngestError::ExtractionFailure {
                page: 2,
                details: "engine crashed".to_string(),
            })
        }
    }

    fn pages(texts: &[&str]) -> FixedPages {
        FixedPages(texts.iter().map(|text| text.to_string()).collect())
    }

    #[test]
    fn hybrid_extractor_pairs_pages_in_order() {
        let extractor = HybridExtractor::new(pages(&["ocr one", "ocr two"]), pages(&["l1", "l2"]));

        let extracted = extractor
            .extract_pages(Path::new("doc.pdf"))
            .expect("pages should pair");

        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].number, 1);
        assert_eq!(extracted[0].ocr_text, "ocr one");
        assert_eq!(extracted[0].layout_text, "l1");
        assert_eq!(extracted[1].number, 2);
        assert_eq!(extracted[1].layout_text, "l2");
    }

    #[test]
    fn page_count_mismatch_is_an_extraction_failure() {
        let extractor = HybridExtractor::new(pages(&["only one"]), pages(&["l1", "l2"]));

        let error = extractor
            .extract_pages(Path::new("doc.pdf"))
            .expect_err("mismatch should fail");

        assert!(matches!(
            error,
            IngestError::ExtractionFailure { page: 2, ref details } if details.contains("1 pages")
        ));
    }

    #[test]
    fn ocr_failure_aborts_the_document() {
        let extractor = HybridExtractor::new(BrokenOcr, pages(&["l1", "l2"]));

        let error = extractor
            .extract_pages(Path::new("doc.pdf"))
            .expect_err("ocr failure should propagate");

        assert!(matches!(error, IngestError::ExtractionFailure { page: 2, .. }));
    }

    #[test]
    fn ocr_payload_pages_are_ordered_by_number() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(3),
                    text: Some("Page 3".to_string()),
                },
                OcrPage {
                    page: Some(1),
                    text: Some("Page 1".to_string()),
                },
                OcrPage {
                    page: Some(2),
                    text: None,
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response, Path::new("x.pdf"))
            .expect("ocr response should be parsed");

        assert_eq!(pages, vec!["Page 1", "", "Page 3"]);
    }

    #[test]
    fn ocr_payload_page_beyond_listed_count_is_rejected() {
        let response = OcrResponse {
            pages: Some(vec![OcrPage {
                page: Some(4_000_000_000),
                text: Some("x".to_string()),
            }]),
            text: None,
        };

        let error = payload_to_pages(&response, Path::new("x.pdf"))
            .expect_err("out of range page must fail");

        assert!(matches!(error, IngestError::OcrFailed(message) if message.contains("4000000000")));
    }

    #[test]
    fn ocr_payload_duplicate_page_is_rejected() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(1),
                    text: Some("first".to_string()),
                },
                OcrPage {
                    page: Some(1),
                    text: Some("again".to_string()),
                },
            ]),
            text: None,
        };

        let error = payload_to_pages(&response, Path::new("x.pdf"))
            .expect_err("duplicate page must fail");

        assert!(matches!(error, IngestError::OcrFailed(message) if message.contains("twice")));
    }

    #[test]
    fn ocr_payload_page_zero_is_rejected() {
        let response = OcrResponse {
            pages: Some(vec![OcrPage {
                page: Some(0),
                text: Some("x".to_string()),
            }]),
            text: None,
        };

        assert!(matches!(
            payload_to_pages(&response, Path::new("x.pdf")),
            Err(IngestError::OcrFailed(_))
        ));
    }

    #[test]
    fn ocr_payload_fallback_text_split_by_form_feed() {
        let response = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n\u{000C}".to_string()),
        };

        let pages = payload_to_pages(&response, Path::new("x.pdf"))
            .expect("ocr response should be parsed");

        assert_eq!(pages, vec!["First", "Second\n"]);
    }

    #[test]
    fn empty_ocr_payload_is_rejected() {
        let response = OcrResponse {
            pages: None,
            text: None,
        };

        assert!(payload_to_pages(&response, Path::new("x.pdf")).is_err());
    }

    fn pdf_fixture() -> Result<(tempfile::TempDir, PathBuf), std::io::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%scan")?;
        Ok((dir, path))
    }

    fn endpoint_config(server: &MockServer, api_key: Option<&str>) -> OcrEndpointConfig {
        OcrEndpointConfig {
            endpoint: server.url("/ocr"),
            api_key: api_key.map(str::to_string),
            language: "ben".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_ocr_posts_the_document_and_reads_pages() -> Result<(), Box<dyn std::error::Error>>
    {
        let (_dir, path) = pdf_fixture()?;
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ocr")
                    .json_body_partial(r#"{"language":"ben"}"#);
                then.status(200).json_body(json!({
                    "pages": [
                        { "page": 1, "text": "প্রথম পাতা" },
                        { "page": 2, "text": "দ্বিতীয় পাতা" }
                    ]
                }));
            })
            .await;

        let engine = HttpOcrEngine::new(endpoint_config(&server, None));
        let pages = engine.recognize_pages(&path)?;

        mock.assert_async().await;
        assert_eq!(pages, vec!["প্রথম পাতা", "দ্বিতীয় পাতা"]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_ocr_forwards_the_api_key() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, path) = pdf_fixture()?;
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ocr")
                    .header("authorization", "Bearer ocr-secret");
                then.status(200)
                    .json_body(json!({ "text": "এক\u{000c}দুই" }));
            })
            .await;

        let engine = HttpOcrEngine::new(endpoint_config(&server, Some("ocr-secret")));
        let pages = engine.recognize_pages(&path)?;

        mock.assert_async().await;
        assert_eq!(pages, vec!["এক", "দুই"]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_ocr_error_status_is_an_ocr_failure() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, path) = pdf_fixture()?;
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ocr");
                then.status(502).body("upstream down");
            })
            .await;

        let engine = HttpOcrEngine::new(endpoint_config(&server, None));
        let result = engine.recognize_pages(&path);

        assert!(matches!(result, Err(IngestError::OcrFailed(message)) if message.contains("502")));
        Ok(())
    }

    #[test]
    fn layout_extractor_rejects_non_pdf_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = LopdfLayoutExtractor.extract_layout(&path);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }
}
