//! PDF chunking, upload and chunk-wise querying
//!
//! A document is cut into fixed-size page ranges; each range becomes its own
//! PDF and is uploaded to the model vendor's file store. Questions are then
//! asked range by range and the answers stitched together.

use lopdf::Document;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::ResearchError;
use crate::llm::{InputMessage, InputPart, LanguageModel, ResponseInput, ResponseRequest};
use crate::Result;

/// Uploaded page range, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub file_id: String,
    pub start: u32,
    pub end: u32,
}

/// A page range cut out of a source PDF, ready to upload.
#[derive(Debug, Clone)]
pub struct PdfChunk {
    pub start: u32,
    pub end: u32,
    pub bytes: Vec<u8>,
}

/// SHA-256 hex digest identifying an uploaded document.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Split a PDF into standalone documents of at most `pages_per_chunk` pages.
pub fn split_pdf(bytes: &[u8], pages_per_chunk: u32) -> Result<Vec<PdfChunk>> {
    if pages_per_chunk == 0 {
        return Err(ResearchError::InvalidInput(
            "pages per chunk must be at least 1".to_string(),
        ));
    }

    let source = Document::load_mem(bytes)?;
    let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
    let total = page_numbers.len() as u32;
    if total == 0 {
        return Err(ResearchError::PdfError("document has no pages".to_string()));
    }

    let mut chunks = Vec::new();
    let mut start = 1;
    while start <= total {
        let end = start.saturating_add(pages_per_chunk - 1).min(total);

        let outside: Vec<u32> = page_numbers
            .iter()
            .copied()
            .filter(|page| *page < start || *page > end)
            .collect();

        let mut chunk = source.clone();
        chunk.delete_pages(&outside);
        chunk.prune_objects();
        chunk.renumber_objects();

        let mut buffer = Vec::new();
        chunk.save_to(&mut buffer)?;

        chunks.push(PdfChunk {
            start,
            end,
            bytes: buffer,
        });
        start = end + 1;
    }

    Ok(chunks)
}

pub struct DocumentProcessor {
    model: Arc<dyn LanguageModel>,
    default_model: String,
    chunk_pages: u32,
    pacing: Duration,
}

impl DocumentProcessor {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        default_model: &str,
        chunk_pages: u32,
        pacing: Duration,
    ) -> Self {
        Self {
            model,
            default_model: default_model.to_string(),
            chunk_pages,
            pacing,
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &AppConfig) -> Self {
        Self::new(
            model,
            &config.default_model,
            config.chunk_pages,
            config.chunk_pacing,
        )
    }

    async fn split(&self, bytes: Vec<u8>) -> Result<Vec<PdfChunk>> {
        let pages = self.chunk_pages;
        tokio::task::spawn_blocking(move || split_pdf(&bytes, pages))
            .await
            .map_err(|e| ResearchError::PdfError(format!("split task failed: {}", e)))?
    }

    async fn upload_chunk(&self, name: &str, chunk: PdfChunk) -> Result<ChunkRef> {
        let filename = format!("{}-pages-{}-{}.pdf", name, chunk.start, chunk.end);
        let file_id = self.model.upload_file(&filename, chunk.bytes).await?;
        Ok(ChunkRef {
            file_id,
            start: chunk.start,
            end: chunk.end,
        })
    }

    /// Split a PDF and upload every page range.
    pub async fn split_and_upload(&self, name: &str, bytes: Vec<u8>) -> Result<Vec<ChunkRef>> {
        let chunks = self.split(bytes).await?;
        info!("Uploading {} chunk(s) of {}", chunks.len(), name);

        let mut refs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            refs.push(self.upload_chunk(name, chunk).await?);
        }
        Ok(refs)
    }

    async fn ask_file(&self, file_id: &str, prompt: &str) -> Result<String> {
        let request = ResponseRequest::with_model(
            &self.default_model,
            ResponseInput::Messages(vec![InputMessage::user_parts(vec![
                InputPart::InputFile {
                    file_id: file_id.to_string(),
                },
                InputPart::InputText {
                    text: prompt.to_string(),
                },
            ])]),
        );
        let response = self.model.respond(&request).await?;
        Ok(response.output_text().trim().to_string())
    }

    /// Ask `query` of every uploaded range and concatenate the answers.
    pub async fn query_chunks(&self, query: &str, chunks: &[ChunkRef]) -> String {
        let mut full = String::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            info!("Querying pages {}-{} (file {})", chunk.start, chunk.end, chunk.file_id);

            match self.ask_file(&chunk.file_id, query).await {
                Ok(answer) => {
                    full.push_str(&format!("\n\n### Pages {}-{}\n{}", chunk.start, chunk.end, answer));
                }
                Err(e) => {
                    warn!("Query failed on pages {}-{}: {}", chunk.start, chunk.end, e);
                    full.push_str(&format!("\n Error on pages {}-{}: {}", chunk.start, chunk.end, e));
                }
            }
        }

        full.trim().to_string()
    }

    /// Run the same prompt over several documents; results keyed by file name.
    pub async fn compare(
        &self,
        files: Vec<(String, Vec<u8>)>,
        prompt: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut results = BTreeMap::new();

        for (name, bytes) in files {
            let chunks = self.split(bytes).await?;
            let mut sections = Vec::with_capacity(chunks.len());

            for (index, chunk) in chunks.into_iter().enumerate() {
                if index > 0 {
                    tokio::time::sleep(self.pacing).await;
                }
                let (start, end) = (chunk.start, chunk.end);
                let uploaded = self.upload_chunk(&name, chunk).await?;

                match self.ask_file(&uploaded.file_id, prompt).await {
                    Ok(answer) => sections.push(format!("**Pages {}-{}**\n{}", start, end, answer)),
                    Err(e) => sections.push(format!(" Error on pages {}-{}: {}", start, end, e)),
                }
            }

            results.insert(name, sections.join("\n\n"));
        }

        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::mock::{Scripted, ScriptedModel};
    use lopdf::{dictionary, Object, Stream};

    pub(crate) fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for n in 0..pages {
            let content = Stream::new(
                dictionary! {},
                format!("BT 72 720 Td (Page {}) Tj ET", n + 1).into_bytes(),
            );
            let content_id = doc.add_object(content);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn processor(model: Arc<ScriptedModel>, chunk_pages: u32) -> DocumentProcessor {
        DocumentProcessor::new(model, "gpt-4o", chunk_pages, Duration::ZERO)
    }

    #[test]
    fn test_split_ranges() {
        let chunks = split_pdf(&sample_pdf(7), 3).unwrap();
        let ranges: Vec<(u32, u32)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(ranges, vec![(1, 3), (4, 6), (7, 7)]);

        let last = Document::load_mem(&chunks[2].bytes).unwrap();
        assert_eq!(last.get_pages().len(), 1);
        let first = Document::load_mem(&chunks[0].bytes).unwrap();
        assert_eq!(first.get_pages().len(), 3);
    }

    #[test]
    fn test_split_single_chunk() {
        let chunks = split_pdf(&sample_pdf(4), 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start, chunks[0].end), (1, 4));
    }

    #[test]
    fn test_split_huge_chunk_size() {
        let chunks = split_pdf(&sample_pdf(3), u32::MAX).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start, chunks[0].end), (1, 3));
    }

    #[test]
    fn test_split_rejects_garbage() {
        let result = split_pdf(b"not a pdf", 50);
        assert!(matches!(result, Err(ResearchError::PdfError(_))));
        assert!(split_pdf(&sample_pdf(1), 0).is_err());
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[tokio::test]
    async fn test_split_and_upload() {
        let model = Arc::new(ScriptedModel::answering("ok"));
        let docs = processor(model.clone(), 2);

        let refs = docs.split_and_upload("report", sample_pdf(5)).await.unwrap();

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[2], ChunkRef { file_id: "file-3".to_string(), start: 5, end: 5 });
        assert_eq!(model.upload_count(), 3);
    }

    #[tokio::test]
    async fn test_query_chunks_collects_errors() {
        let model = Arc::new(ScriptedModel::new(vec![
            Scripted::Text("Revenue grew 12%.".to_string()),
            Scripted::Fail("file expired".to_string()),
        ]));
        let docs = processor(model, 50);
        let chunks = vec![
            ChunkRef { file_id: "file-a".to_string(), start: 1, end: 50 },
            ChunkRef { file_id: "file-b".to_string(), start: 51, end: 80 },
        ];

        let answer = docs.query_chunks("What is the revenue?", &chunks).await;

        assert!(answer.starts_with("### Pages 1-50\nRevenue grew 12%."));
        assert!(answer.contains("\n Error on pages 51-80: "));
        assert!(answer.contains("file expired"));
    }

    #[tokio::test]
    async fn test_compare_keys_by_file() {
        let model = Arc::new(ScriptedModel::answering("Summary"));
        let docs = processor(model.clone(), 2);

        let results = docs
            .compare(
                vec![
                    ("a.pdf".to_string(), sample_pdf(3)),
                    ("b.pdf".to_string(), sample_pdf(1)),
                ],
                "Compare market sizes",
            )
            .await
            .unwrap();

        assert_eq!(results["a.pdf"], "**Pages 1-2**\nSummary\n\n**Pages 3-3**\nSummary");
        assert_eq!(results["b.pdf"], "**Pages 1-1**\nSummary");
        assert_eq!(model.upload_count(), 3);
    }

    #[tokio::test]
    async fn test_compare_marks_failed_ranges() {
        let model = Arc::new(ScriptedModel::new(vec![
            Scripted::Text("First half".to_string()),
            Scripted::Fail("quota".to_string()),
        ]));
        let docs = processor(model, 2);

        let results = docs
            .compare(vec![("a.pdf".to_string(), sample_pdf(3))], "Summarize")
            .await
            .unwrap();

        assert!(results["a.pdf"].starts_with("**Pages 1-2**\nFirst half\n\n Error on pages 3-3: "));
        assert!(results["a.pdf"].contains("quota"));
    }
}
