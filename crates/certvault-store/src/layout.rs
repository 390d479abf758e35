//! Path resolution for the two storage backends.
//!
//! Everything that turns a tier into a concrete filesystem path lives here:
//! certificates roots, the persisted index location, and container
//! destinations. The rest of the system never joins path segments itself.

use std::path::{Path, PathBuf};

use certvault_core::defaults::{CERTIFICATES_DIR, CONTAINER_EXTENSION, INDEX_FILE_NAME};
use certvault_core::models::{DocumentLocation, StorageTier};

/// Resolved roots of the local backend and, when available, the remote
/// synchronized drive.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    local_root: PathBuf,
    remote_root: Option<PathBuf>,
}

impl StorageLayout {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: Option<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root,
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote_root.is_some()
    }

    /// Certificates directory under the given tier's root. `None` when the
    /// remote drive is not mounted.
    pub fn certificates_root(&self, tier: StorageTier) -> Option<PathBuf> {
        match tier {
            StorageTier::Local => Some(self.local_root.join(CERTIFICATES_DIR)),
            StorageTier::Remote => self
                .remote_root
                .as_ref()
                .map(|root| root.join(CERTIFICATES_DIR)),
        }
    }

    pub fn local_certificates_root(&self) -> PathBuf {
        self.local_root.join(CERTIFICATES_DIR)
    }

    /// Where the persisted index lives for the given tier.
    pub fn index_path(&self, tier: StorageTier) -> Option<PathBuf> {
        self.certificates_root(tier)
            .map(|root| root.join(INDEX_FILE_NAME))
    }

    /// Destination for a new container: inside the per-activity folder when
    /// one is named, flat at the certificates root otherwise.
    pub fn container_destination(
        &self,
        tier: StorageTier,
        folder: Option<&str>,
        stem: &str,
    ) -> Option<PathBuf> {
        let root = self.certificates_root(tier)?;
        let bundle = format!("{}.{}", stem, CONTAINER_EXTENSION);
        Some(match folder {
            Some(folder) => root.join(folder).join(bundle),
            None => root.join(bundle),
        })
    }

    /// Which tier a location resolves under, if any.
    pub fn tier_of(&self, location: &DocumentLocation) -> Option<StorageTier> {
        if let Some(remote) = self.certificates_root(StorageTier::Remote) {
            if location.is_under(&remote) {
                return Some(StorageTier::Remote);
            }
        }
        if location.is_under(&self.local_certificates_root()) {
            return Some(StorageTier::Local);
        }
        None
    }

    /// Equivalent path for a container under the other tier's certificates
    /// root, preserving the per-activity folder structure when the source
    /// sits under a known root.
    pub fn relocated_path(&self, location: &DocumentLocation, to: StorageTier) -> Option<PathBuf> {
        let target_root = self.certificates_root(to)?;
        let source_root = self
            .tier_of(location)
            .and_then(|tier| self.certificates_root(tier));

        let relative: PathBuf = match source_root {
            Some(root) => match location.as_path().strip_prefix(&root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => PathBuf::from(location.as_path().file_name()?),
            },
            None => PathBuf::from(location.as_path().file_name()?),
        };

        Some(target_root.join(relative))
    }

    /// Whether a directory entry name is a certificate container.
    pub fn is_container_name(name: &Path) -> bool {
        name.extension()
            .map(|ext| ext == CONTAINER_EXTENSION)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StorageLayout {
        StorageLayout::new("/data/local", Some(PathBuf::from("/mnt/drive")))
    }

    #[test]
    fn test_certificates_roots() {
        let layout = layout();
        assert_eq!(
            layout.certificates_root(StorageTier::Local).unwrap(),
            PathBuf::from("/data/local/Certificates")
        );
        assert_eq!(
            layout.certificates_root(StorageTier::Remote).unwrap(),
            PathBuf::from("/mnt/drive/Certificates")
        );
    }

    #[test]
    fn test_remote_unavailable() {
        let layout = StorageLayout::new("/data/local", None);
        assert!(!layout.has_remote());
        assert!(layout.certificates_root(StorageTier::Remote).is_none());
        assert!(layout.index_path(StorageTier::Remote).is_none());
    }

    #[test]
    fn test_index_path() {
        let layout = layout();
        assert_eq!(
            layout.index_path(StorageTier::Local).unwrap(),
            PathBuf::from("/data/local/Certificates/certvault-index.json")
        );
    }

    #[test]
    fn test_container_destination_with_folder() {
        let layout = layout();
        assert_eq!(
            layout
                .container_destination(StorageTier::Remote, Some("Marathon"), "cert-1")
                .unwrap(),
            PathBuf::from("/mnt/drive/Certificates/Marathon/cert-1.cert")
        );
    }

    #[test]
    fn test_container_destination_flat() {
        let layout = layout();
        assert_eq!(
            layout
                .container_destination(StorageTier::Local, None, "cert-1")
                .unwrap(),
            PathBuf::from("/data/local/Certificates/cert-1.cert")
        );
    }

    #[test]
    fn test_tier_of() {
        let layout = layout();
        let local = DocumentLocation::new("/data/local/Certificates/Run/a.cert");
        let remote = DocumentLocation::new("/mnt/drive/Certificates/a.cert");
        let foreign = DocumentLocation::new("/somewhere/else/a.cert");
        assert_eq!(layout.tier_of(&local), Some(StorageTier::Local));
        assert_eq!(layout.tier_of(&remote), Some(StorageTier::Remote));
        assert_eq!(layout.tier_of(&foreign), None);
    }

    #[test]
    fn test_relocated_path_preserves_folder() {
        let layout = layout();
        let local = DocumentLocation::new("/data/local/Certificates/Run/a.cert");
        assert_eq!(
            layout.relocated_path(&local, StorageTier::Remote).unwrap(),
            PathBuf::from("/mnt/drive/Certificates/Run/a.cert")
        );
    }

    #[test]
    fn test_relocated_path_foreign_source_flattens() {
        let layout = layout();
        let foreign = DocumentLocation::new("/somewhere/else/a.cert");
        assert_eq!(
            layout.relocated_path(&foreign, StorageTier::Local).unwrap(),
            PathBuf::from("/data/local/Certificates/a.cert")
        );
    }

    #[test]
    fn test_is_container_name() {
        assert!(StorageLayout::is_container_name(Path::new("a.cert")));
        assert!(!StorageLayout::is_container_name(Path::new(
            "certvault-index.json"
        )));
        assert!(!StorageLayout::is_container_name(Path::new("folder")));
    }
}
