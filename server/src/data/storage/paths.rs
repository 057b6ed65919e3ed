//! Path normalization, content types and cache policies
//!
//! Everything here is pure. Storage-relative paths never start with `/` and
//! never contain `//`; directory paths end with exactly one `/`. The empty
//! string is the zone root.

use serde::Serialize;
use utoipa::ToSchema;

/// Fallback MIME type for unknown extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Design-tool formats that `mime_guess` either misses or maps to generic types
const DESIGN_CONTENT_TYPES: &[(&str, &str)] = &[
    ("psd", "image/vnd.adobe.photoshop"),
    ("ai", "application/postscript"),
    ("eps", "application/postscript"),
    ("sketch", "application/x-sketch"),
    ("fig", "application/x-figma"),
    ("xd", "application/vnd.adobe.xd"),
    ("indd", "application/x-indesign"),
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "avif", "ico", "bmp", "tiff",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "md", "rtf", "odt",
];
const DESIGN_EXTENSIONS: &[&str] = &["psd", "ai", "sketch", "fig", "xd", "indd", "eps"];

/// Collapse repeated slashes and strip the leading one.
///
/// A trailing slash survives, so directory paths stay directory paths.
/// Idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.trim().chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out.trim_start_matches('/').to_string()
}

/// Normalize a directory path: exactly one trailing `/`, or empty for the root
pub fn normalize_dir(path: &str) -> String {
    let mut dir = normalize_path(path);
    if !dir.is_empty() && !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}

/// True for directory paths (trailing `/`) and the root
pub fn is_dir_path(path: &str) -> bool {
    path.is_empty() || path.ends_with('/')
}

/// Parent directory of a normalized path, `""` for top-level entries
///
/// ```text
/// parent_dir("a/b/c.txt") == "a/b/"
/// parent_dir("a/b/")      == "a/"
/// parent_dir("c.txt")     == ""
/// ```
pub fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[..=idx].to_string(),
        None => String::new(),
    }
}

/// Last segment of a path without any trailing `/`
pub fn leaf_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Join a directory and a relative path
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        normalize_path(name)
    } else {
        normalize_path(&format!("{}/{}", dir, name))
    }
}

/// Reject `.`/`..` segments and control characters
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.chars().any(|c| c.is_control() || c == '\\') {
        return Err(format!("path contains invalid characters: {:?}", path));
    }
    if path.split('/').any(|s| s == "." || s == "..") {
        return Err(format!("relative segments are not allowed: {}", path));
    }
    Ok(())
}

/// A single path segment used as a new file or folder name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.contains('/') {
        return Err(format!("name must not contain '/': {}", name));
    }
    if name == "." || name == ".." {
        return Err(format!("invalid name: {}", name));
    }
    validate_path(name)
}

fn extension(path: &str) -> Option<String> {
    let leaf = leaf_name(path);
    let (stem, ext) = leaf.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type inferred from the file extension
pub fn content_type_for(name: &str) -> String {
    if let Some(ext) = extension(name)
        && let Some((_, mime)) = DESIGN_CONTENT_TYPES.iter().find(|(e, _)| *e == ext)
    {
        return (*mime).to_string();
    }
    mime_guess::from_path(leaf_name(name))
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Cache category derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    Image,
    Document,
    Design,
    Default,
}

/// CDN cache policy for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    pub category: CacheCategory,
    pub max_age_seconds: u64,
    pub cache_control_header: &'static str,
}

impl CachePolicy {
    const IMAGE: Self = Self {
        category: CacheCategory::Image,
        max_age_seconds: 30 * 86_400,
        cache_control_header: "public, max-age=2592000, stale-while-revalidate=86400",
    };
    const DOCUMENT: Self = Self {
        category: CacheCategory::Document,
        max_age_seconds: 7 * 86_400,
        cache_control_header: "public, max-age=604800",
    };
    const DESIGN: Self = Self {
        category: CacheCategory::Design,
        max_age_seconds: 86_400,
        cache_control_header: "public, max-age=86400, must-revalidate",
    };
    const DEFAULT: Self = Self {
        category: CacheCategory::Default,
        max_age_seconds: 3 * 86_400,
        cache_control_header: "public, max-age=259200",
    };
}

pub fn cache_policy_for(path: &str) -> CachePolicy {
    let Some(ext) = extension(path) else {
        return CachePolicy::DEFAULT;
    };
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        CachePolicy::IMAGE
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        CachePolicy::DOCUMENT
    } else if DESIGN_EXTENSIONS.contains(&ext) {
        CachePolicy::DESIGN
    } else {
        CachePolicy::DEFAULT
    }
}

/// Public CDN URL for a storage-relative path
pub fn public_url_for(cdn_base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        cdn_base.trim_end_matches('/'),
        normalize_path(path)
    )
}
