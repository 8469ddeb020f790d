//! Extension-to-MIME-type resolution.

use std::collections::HashMap;
use std::path::Path;

/// Resolves file extensions to MIME types, backed by an optional
/// `mime.types`-style text file with a built-in fallback table.
#[derive(Debug, Clone)]
pub struct MimeResolver {
    by_ext: HashMap<String, String>,
}

impl MimeResolver {
    /// Load from a `mime.types` file (lines of `mime ext [ext ...]`,
    /// `#`-comments, case-insensitive). Falls back to the built-in table
    /// when the file is missing or unreadable.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            if let Ok(text) = std::fs::read_to_string(path) {
                return Self::parse(&text);
            }
        }
        Self::builtin()
    }

    fn parse(text: &str) -> Self {
        let mut by_ext = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(mime) = fields.next() else { continue };
            for ext in fields {
                by_ext.insert(format!(".{}", ext.to_lowercase()), mime.to_lowercase());
            }
        }
        if by_ext.is_empty() {
            return Self::builtin();
        }
        Self { by_ext }
    }

    fn builtin() -> Self {
        const TABLE: &[(&str, &[&str])] = &[
            ("video/mp4", &["mp4"]),
            ("video/x-matroska", &["mkv"]),
            ("video/x-msvideo", &["avi"]),
            ("video/quicktime", &["mov"]),
            ("video/x-ms-wmv", &["wmv"]),
            ("video/x-flv", &["flv"]),
            ("video/webm", &["webm"]),
            ("audio/mpeg", &["mp3"]),
            ("audio/wav", &["wav"]),
            ("audio/ogg", &["ogg"]),
            ("audio/aac", &["aac"]),
            ("audio/flac", &["flac"]),
            ("image/jpeg", &["jpg", "jpeg"]),
            ("image/png", &["png"]),
            ("image/gif", &["gif"]),
            ("image/bmp", &["bmp"]),
            ("image/webp", &["webp"]),
        ];

        let mut by_ext = HashMap::new();
        for (mime, exts) in TABLE {
            for ext in *exts {
                by_ext.insert(format!(".{ext}"), mime.to_string());
            }
        }
        Self { by_ext }
    }

    /// Guess the MIME type for a filename, keyed on the lowercased final
    /// dot-suffix of the basename.
    pub fn guess(&self, filename: &Path) -> String {
        let ext = filename
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()));

        ext.and_then(|e| self.by_ext.get(&e).cloned())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// True iff `mime` starts with `video/`, `audio/`, or `image/`.
pub fn is_supported(mime: &str) -> bool {
    mime.starts_with("video/") || mime.starts_with("audio/") || mime.starts_with("image/")
}
