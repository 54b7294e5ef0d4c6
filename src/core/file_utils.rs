//! File utilities for safe and robust file reads.
//!
//! Provides UTF-8-safe reading with lossy fallback and binary-file
//! detection, used by the pre-analysis phase when building `CodeFile`
//! handles.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::core::errors::{Result, WardenError};

/// Safe file reading with UTF-8 validation and fallback handling.
pub struct FileReader;

impl FileReader {
    /// Read a file to a string, handling non-UTF-8 files gracefully.
    pub fn read_to_string(file_path: &Path) -> Result<String> {
        if Self::is_likely_binary(file_path)? {
            return Err(WardenError::validation(format!(
                "file appears to be binary: {}",
                file_path.display()
            )));
        }

        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let bytes = fs::read(file_path).map_err(|err| WardenError::io("failed to read file as bytes", err))?;
                let content = String::from_utf8_lossy(&bytes).to_string();
                warn!(path = %file_path.display(), "file contained invalid UTF-8, converted with lossy encoding");
                Ok(content)
            }
            Err(e) => Err(WardenError::io("failed to read file", e)),
        }
    }

    /// Check whether a file is likely binary based on extension and a
    /// content sample.
    pub fn is_likely_binary(file_path: &Path) -> Result<bool> {
        const BINARY_EXTENSIONS: &[&str] = &[
            "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "png", "jpg", "jpeg", "gif", "bmp", "ico",
            "webp", "mp3", "mp4", "avi", "wav", "mov", "mkv", "pdf", "doc", "docx", "xls", "xlsx",
            "exe", "dll", "so", "dylib", "bin", "sqlite", "db", "woff", "woff2", "ttf",
        ];

        if let Some(ext) = file_path.extension().and_then(|e| e.to_str()) {
            if BINARY_EXTENSIONS.iter().any(|b| ext.eq_ignore_ascii_case(b)) {
                return Ok(true);
            }
        }

        let metadata = fs::metadata(file_path).map_err(|e| WardenError::io("failed to stat file", e))?;
        if metadata.len() > 10 * 1024 * 1024 {
            return Ok(true);
        }
        if metadata.len() == 0 {
            return Ok(false);
        }

        let sample_size = std::cmp::min(1024, metadata.len() as usize);
        let mut buffer = vec![0u8; sample_size];
        let mut file = fs::File::open(file_path).map_err(|e| WardenError::io("failed to open file for sampling", e))?;
        file.read_exact(&mut buffer)
            .map_err(|e| WardenError::io("failed to read file sample", e))?;

        let null_bytes = buffer.iter().filter(|&&b| b == 0).count();
        let null_percentage = (null_bytes as f64 / buffer.len() as f64) * 100.0;
        Ok(null_percentage > 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_valid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.txt");
        fs::write(&path, "hello world").unwrap();
        assert_eq!(FileReader::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn detects_binary_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();
        assert!(FileReader::is_likely_binary(&path).unwrap());
    }

    #[test]
    fn empty_file_is_not_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.py");
        fs::write(&path, b"").unwrap();
        assert!(!FileReader::is_likely_binary(&path).unwrap());
    }
}
