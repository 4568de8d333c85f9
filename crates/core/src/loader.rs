use crate::error::LoadError;
use crate::extractor::SourceKind;
use crate::models::Document;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

pub fn discover_source_files(folder: &Path) -> Result<Vec<PathBuf>, LoadError> {
    std::fs::read_dir(folder)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if SourceKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

pub fn load_documents(folder: &Path) -> Result<LoadReport, LoadError> {
    let files = discover_source_files(folder)?;

    let mut report = LoadReport::default();
    for path in files {
        match document_from_file(&path) {
            Ok(document) => report.documents.push(document),
            Err(error) => report.skipped.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}

pub fn document_from_file(path: &Path) -> Result<Document, LoadError> {
    let kind = SourceKind::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;

    let source_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoadError::MissingFileName(path.display().to_string()))?
        .to_string();

    let mut text = format!("Document: {source_name}\n\n");
    for block in kind.extract_blocks(path)? {
        text.push_str(&block);
        if !text.ends_with('\n') {
            text.push('\n');
        }
    }

    Ok(Document {
        id: document_id(path),
        source_name,
        text,
    })
}

fn document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}
