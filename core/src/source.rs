use std::path::PathBuf;

use crate::StagehandErrorExt;

/// A workflow-description document loaded into memory. The lowering engine
/// never touches the filesystem itself; callers hand it a `Source`.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

impl Source {
    pub fn new(path: PathBuf) -> Result<Self, Box<dyn StagehandErrorExt>> {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let content = std::fs::read_to_string(&path).map_err(|_| {
            Box::<dyn StagehandErrorExt>::from(Box::new(MissingSourceError { path: path.clone() }))
        })?;
        Ok(Source {
            name,
            path,
            content,
        })
    }

    /// Construct a `Source` directly from text, without touching the
    /// filesystem. Used by tests and by round-trip validation.
    pub fn from_text(name: &str, content: &str) -> Self {
        Source {
            name: name.to_string(),
            path: PathBuf::from(name),
            content: content.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source: {} at {:?}", self.name, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct MissingSourceError {
    pub path: PathBuf,
}

impl std::fmt::Display for MissingSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Missing source document at {:?}", self.path)
    }
}

impl std::error::Error for MissingSourceError {}

impl StagehandErrorExt for MissingSourceError {
    fn level(&self) -> crate::Level {
        crate::Level::Error
    }

    fn message(&self) -> String {
        format!("Missing source document at {:?}", self.path)
    }

    fn issuer(&self) -> String {
        "stagehand.source".to_string()
    }

    fn span(&self) -> Option<crate::location::Span> {
        None
    }

    fn location(&self) -> Option<crate::location::Location> {
        None
    }
}
