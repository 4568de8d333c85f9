use crate::error::LoadError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;

        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("txt") || extension.eq_ignore_ascii_case("md") {
            Some(Self::PlainText)
        } else {
            None
        }
    }

    pub fn extract_blocks(self, path: &Path) -> Result<Vec<String>, LoadError> {
        match self {
            Self::Pdf => LopdfExtractor.extract_blocks(path),
            Self::PlainText => PlainTextExtractor.extract_blocks(path),
        }
    }
}

pub trait TextExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<Vec<String>, LoadError>;
}

#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<Vec<String>, LoadError> {
        let document =
            Document::load(path).map_err(|error| LoadError::PdfParse(error.to_string()))?;

        let mut blocks = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| LoadError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                blocks.push(text);
            }
        }

        if blocks.is_empty() {
            return Err(LoadError::NoText(path.display().to_string()));
        }

        Ok(blocks)
    }
}

#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<Vec<String>, LoadError> {
        let text = std::fs::read_to_string(path)?;

        if text.trim().is_empty() {
            return Err(LoadError::NoText(path.display().to_string()));
        }

        Ok(vec![text])
    }
}
