use crate::error::{RAGError, Result};
use jwalk::WalkDir;
use log::{info, warn};
use std::{
    io,
    path::{Path, PathBuf},
};

/// A normalized sentence file, the unit the chunker splits.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String, // path as discovered, carried into every chunk
    pub text: String,
}

/// Reads a file as UTF-8, validating with simdutf8.
pub fn read_utf8(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| RAGError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = simdutf8::basic::from_utf8(&bytes).map_err(|e| RAGError::InvalidUtf8 {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(text.to_owned())
}

/// Files directly under `root` with the given extension, sorted by path.
pub fn list_files(root: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(RAGError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Root path does not exist: {}", root.display()),
        )));
    }

    let paths = WalkDir::new(root)
        .sort(true)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) if entry.file_type().is_file() => Some(entry.path()),
            Ok(_) => None,
            Err(err) => {
                warn!("Failed to walk directory entry: {}", err);
                None
            }
        })
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();

    Ok(paths)
}

pub fn grab_all_documents(root: &Path) -> Result<Vec<Document>> {
    list_files(root, "txt")?
        .iter()
        .map(|path| load_document(path))
        .collect()
}

fn load_document(path: &Path) -> Result<Document> {
    info!("Loading {}", path.display());
    let text = read_utf8(path)?;

    Ok(Document {
        source: path.display().to_string(),
        text,
    })
}
