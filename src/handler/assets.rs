//! In-memory asset store
//!
//! The asset root is walked once at startup; every regular file is read
//! into memory and kept immutable for the process lifetime. Request-time
//! lookup is an exact, case-sensitive map access on the sanitized relative
//! path, so a traversal attempt can never reach outside the root.

use crate::http::mime;
use crate::logger;
use hyper::body::Bytes;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Built-in fallback page used when the configured 404 file is absent
const DEFAULT_NOT_FOUND_PAGE: &str = r"<!DOCTYPE html>
<html>
<head>
    <meta charset='utf-8'>
    <title>404 Not Found</title>
</head>
<body>
    <h1>404</h1>
    <p>The page you are looking for does not exist.</p>
    <p><a href='/'>Back to the homepage</a></p>
</body>
</html>";

/// A single static asset: content bytes plus derived content type
#[derive(Debug, Clone)]
pub struct Asset {
    pub content: Bytes,
    pub content_type: &'static str,
}

/// Read-only set of assets served by the responder
#[derive(Debug)]
pub struct AssetStore {
    assets: HashMap<String, Asset>,
    index_key: String,
    fallback: Bytes,
}

impl AssetStore {
    /// Load every file under `root` into memory.
    ///
    /// A missing or unreadable root is not fatal: the store starts empty
    /// and every request falls through to the fallback page. Individual
    /// unreadable files are skipped with a warning.
    pub fn load(root: &Path, index_file: &str, not_found_file: &str) -> Self {
        let mut assets = HashMap::new();

        match collect_files(root, root, &mut assets) {
            Ok(()) => {}
            Err(e) => {
                logger::log_warning(&format!(
                    "Asset root '{}' not readable: {e}",
                    root.display()
                ));
            }
        }

        let fallback = assets
            .get(not_found_file)
            .map_or_else(
                || Bytes::from_static(DEFAULT_NOT_FOUND_PAGE.as_bytes()),
                |asset| asset.content.clone(),
            );

        Self {
            assets,
            index_key: index_file.to_string(),
            fallback,
        }
    }

    /// Exact lookup by relative path key
    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.assets.get(key)
    }

    /// The asset served for `/`
    pub fn index(&self) -> Option<&Asset> {
        self.assets.get(&self.index_key)
    }

    /// Fallback "not found" page bytes (cheap to clone)
    pub fn fallback(&self) -> Bytes {
        self.fallback.clone()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Recursively collect regular files under `dir` keyed by their
/// root-relative path with `/` separators
fn collect_files(
    dir: &Path,
    root: &Path,
    out: &mut HashMap<String, Asset>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_files(&path, root, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                logger::log_warning(&format!(
                    "Skipping unreadable asset '{}': {e}",
                    path.display()
                ));
                continue;
            }
        };

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content_type = mime::get_content_type(path.extension().and_then(|e| e.to_str()));

        out.insert(
            key,
            Asset {
                content: Bytes::from(content),
                content_type,
            },
        );
    }
    Ok(())
}

/// Turn a request path into an exact store key.
///
/// Percent-decodes the path, then rejects anything that could not name an
/// asset: NUL bytes, backslashes, empty segments, and `.`/`..` components.
/// Returns `None` for any rejected path, which the router surfaces as 404.
pub fn sanitize_request_path(path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;

    if decoded.contains('\0') || decoded.contains('\\') {
        return None;
    }

    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    if relative
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return None;
    }

    Some(relative.to_string())
}
