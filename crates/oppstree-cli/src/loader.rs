//! Plain-text source loading for the CLI.
//!
//! Each `--input category=path` names a file or a directory. Directories
//! are read one level deep, supported extensions only, in filename order.
//! A file that cannot be read as UTF-8 text is logged and skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use oppstree_types::{CategoryRegistry, Source};

/// File extensions read from input directories.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "log"];

/// One `category=path` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub category: String,
    pub path: PathBuf,
}

impl FromStr for InputSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <category>=<path>, got '{s}'"))?;
        let category = category.trim();
        let path = path.trim();
        if category.is_empty() || path.is_empty() {
            return Err(format!("expected <category>=<path>, got '{s}'"));
        }
        Ok(Self {
            category: category.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Load every input into [`Source`]s. Indexes are assigned per category in
/// load order, so ids are stable for a given set of inputs.
pub async fn load_sources(
    inputs: &[InputSpec],
    registry: &CategoryRegistry,
    max_chars: usize,
) -> anyhow::Result<Vec<Source>> {
    for input in inputs {
        if !registry.contains(&input.category) {
            let known: Vec<&str> = registry.keys().collect();
            anyhow::bail!(
                "unknown category '{}' (known: {})",
                input.category,
                known.join(", ")
            );
        }
    }

    let mut next_index: HashMap<&str, usize> = HashMap::new();
    let mut sources = Vec::new();

    for input in inputs {
        for file in input_files(&input.path).await? {
            let Some(content) = read_text(&file).await else {
                continue;
            };
            let index = next_index.entry(input.category.as_str()).or_insert(0);
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let source = Source::new(registry, &input.category, *index, filename, content, max_chars)?;
            debug!(id = %source.id, file = %file.display(), "loaded source");
            *index += 1;
            sources.push(source);
        }
    }

    Ok(sources)
}

async fn input_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot access {}: {e}", path.display()))?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read directory {}: {e}", path.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let file = entry.path();
        if file.is_file() && is_supported(&file) {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

async fn read_text(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => {
            warn!(file = %path.display(), "skipping empty source file");
            None
        }
        Ok(text) => Some(text),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "skipping unreadable source file");
            None
        }
    }
}
