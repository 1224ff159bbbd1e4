//! Material store and text extraction implementations.
//!
//! Materials are an upstream concern; the worker only needs to resolve an
//! id to content and pull plain text out of it. These implementations cover
//! the filesystem-backed deployment and the in-memory test setup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use revio_core::{defaults, Error, MaterialContent, MaterialStore, Result, TextExtractor};

/// Filesystem-backed material store.
///
/// Materials live as `<root>/<material_id>.txt`. A missing file means the
/// material does not exist.
pub struct FsMaterialStore {
    root: PathBuf,
}

impl FsMaterialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at the `REVIO_MATERIAL_DIR` environment
    /// variable, defaulting to `./materials`.
    pub fn from_env() -> Self {
        let root = std::env::var("REVIO_MATERIAL_DIR").unwrap_or_else(|_| "materials".to_string());
        Self::new(root)
    }

    fn path_for(&self, material_id: Uuid) -> PathBuf {
        self.root.join(format!("{material_id}.txt"))
    }
}

#[async_trait]
impl MaterialStore for FsMaterialStore {
    async fn fetch(&self, material_id: Uuid) -> Result<MaterialContent> {
        let path = self.path_for(material_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(%material_id, size = bytes.len(), "Fetched material from filesystem");
                Ok(MaterialContent::Bytes(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::MaterialNotFound(material_id))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// In-memory material store for tests.
#[derive(Default)]
pub struct MemoryMaterialStore {
    materials: Mutex<HashMap<Uuid, Vec<u8>>>,
    /// When set, `fetch` hands out signed URLs instead of raw bytes.
    signed_url_base: Option<String>,
}

impl MemoryMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the store into signed-URL mode: fetches return a short-lived
    /// URL under `base` instead of the bytes themselves.
    pub fn with_signed_urls(base: impl Into<String>) -> Self {
        Self {
            materials: Mutex::new(HashMap::new()),
            signed_url_base: Some(base.into()),
        }
    }

    /// Insert a material, returning its id.
    pub fn insert(&self, text: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.materials
            .lock()
            .expect("material store lock poisoned")
            .insert(id, text.as_bytes().to_vec());
        id
    }
}

#[async_trait]
impl MaterialStore for MemoryMaterialStore {
    async fn fetch(&self, material_id: Uuid) -> Result<MaterialContent> {
        let materials = self
            .materials
            .lock()
            .map_err(|_| Error::Persistence("material store lock poisoned".into()))?;
        let bytes = materials
            .get(&material_id)
            .ok_or(Error::MaterialNotFound(material_id))?;

        match &self.signed_url_base {
            Some(base) => Ok(MaterialContent::SignedUrl {
                url: format!("{base}/{material_id}?sig=test"),
                expires_at: Utc::now()
                    + Duration::seconds(defaults::SIGNED_URL_TTL_SECS as i64),
            }),
            None => Ok(MaterialContent::Bytes(bytes.clone())),
        }
    }
}

/// Extractor for plain-text materials.
///
/// Handles byte content only; signed URLs belong to an out-of-process
/// extraction service, so receiving one here is a caller error.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: MaterialContent) -> Result<String> {
        match content {
            MaterialContent::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::ExtractionFailure("material is empty".into()));
                }
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            MaterialContent::SignedUrl { .. } => Err(Error::InvalidInput(
                "plain-text extractor cannot dereference signed URLs".into(),
            )),
        }
    }
}
