use crate::{browser::SessionSnapshot, error::CrawlerError, sites::SiteDefinition};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    files: HashMap<String, String>,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> SessionStore {
        SessionStore {
            dir: dir.as_ref().to_path_buf(),
            files: HashMap::new(),
        }
    }

    pub fn for_sites(dir: impl AsRef<Path>, sites: &[SiteDefinition]) -> SessionStore {
        let mut store = SessionStore::new(dir);
        for site in sites {
            store
                .files
                .insert(site.key.to_string(), site.context_file.to_string());
        }
        store
    }

    pub fn path(&self, site_key: &str) -> PathBuf {
        match self.files.get(site_key) {
            Some(file) => self.dir.join(file),
            None => self.dir.join(format!("{}_context.json", site_key)),
        }
    }

    /// A missing or unreadable snapshot is treated as no snapshot at all.
    pub async fn load(&self, site_key: &str) -> Option<SessionSnapshot> {
        let path = self.path(site_key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No session snapshot at {}", path.display());
                return None;
            }
            Err(e) => {
                warn!("Cannot read session snapshot {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring corrupt session snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, site_key: &str, snapshot: &SessionSnapshot) -> Result<(), CrawlerError> {
        let path = self.path(site_key);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string(snapshot)?;
        tokio::fs::write(&path, raw).await?;
        debug!("Saved session snapshot {}", path.display());
        Ok(())
    }
}
