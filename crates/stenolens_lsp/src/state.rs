//! LSP Backend state management.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tower_lsp::lsp_types::Url;
use tracing::error;

use stenolens_core::AnnotationProvider;

/// Shared backend state.
pub(crate) struct BackendState {
    /// Latest text of every open document.
    pub documents: RwLock<HashMap<Url, String>>,
    /// Annotation provider (None until `initialize` succeeds).
    pub provider: RwLock<Option<AnnotationProvider>>,
    /// Workspace root path, searched for a config file.
    pub workspace_root: RwLock<Option<PathBuf>>,
}

impl fmt::Debug for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendState")
            .field("documents", &"<HashMap<Url, String>>")
            .field("provider", &"<Option<AnnotationProvider>>")
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

impl BackendState {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            provider: RwLock::new(None),
            workspace_root: RwLock::new(None),
        }
    }

    /// Returns a handle to the provider, if one is installed.
    pub fn provider(&self) -> Option<AnnotationProvider> {
        match self.provider.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Provider lock poisoned: {}", e);
                None
            }
        }
    }

    /// Returns the workspace root recorded at `initialize`.
    pub fn workspace_root(&self) -> Option<PathBuf> {
        match self.workspace_root.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Workspace root lock poisoned: {}", e);
                None
            }
        }
    }

    /// Returns the current text of an open document.
    pub fn document_text(&self, uri: &Url) -> Option<String> {
        match self.documents.read() {
            Ok(docs) => docs.get(uri).cloned(),
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                None
            }
        }
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for shared state.
pub type SharedState = Arc<BackendState>;
