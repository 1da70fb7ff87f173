use crate::models::RawDocument;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let allowed = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            });

        if allowed {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone)]
pub struct UnreadableFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<RawDocument>,
    pub unreadable: Vec<UnreadableFile>,
}

pub fn load_documents(folder: &Path, extensions: &[String]) -> LoadReport {
    let mut report = LoadReport::default();

    for path in discover_documents(folder, extensions) {
        match fs::read(&path) {
            Ok(bytes) => {
                let name = path
                    .strip_prefix(folder)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string();
                report.documents.push(RawDocument::inferred(name, bytes));
            }
            Err(error) => report.unreadable.push(UnreadableFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    report
}
