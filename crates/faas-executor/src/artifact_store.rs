//! Deterministic on-disk layout for function code and layer bundles, plus zip extraction.
//!
//! Paths mirror the original `GetDestPath`/`GetLayerDestPath` helpers:
//! `{data_path}/lambda/functions/{name}/{version}/content`,
//! `{data_path}/lambda/functions/{name}/{version}/layers`,
//! `{data_path}/lambda/layers/{name}/{version}.zip`.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use faas_common::LayerRef;
use tracing::{info, instrument};

use crate::{ExecutorError, Result};

#[derive(Clone)]
pub struct ArtifactStore {
    data_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    pub fn function_base_path(&self, name: &str, version: i64) -> PathBuf {
        self.data_path.join("lambda").join("functions").join(name).join(version.to_string())
    }

    pub fn function_content_path(&self, name: &str, version: i64) -> PathBuf {
        self.function_base_path(name, version).join("content")
    }

    pub fn function_layer_path(&self, name: &str, version: i64) -> PathBuf {
        self.function_base_path(name, version).join("layers")
    }

    pub fn layer_bundle_path(&self, name: &str, version: i64) -> PathBuf {
        self.data_path
            .join("lambda")
            .join("layers")
            .join(name)
            .join(format!("{version}.zip"))
    }

    #[instrument(skip(self, zip_bytes))]
    pub fn save_function_code(&self, name: &str, version: i64, zip_bytes: &[u8]) -> Result<()> {
        let dest = self.function_content_path(name, version);
        extract_zip_bytes(zip_bytes, &dest)
    }

    #[instrument(skip(self, zip_bytes))]
    pub fn save_layer_bundle(&self, name: &str, version: i64, zip_bytes: &[u8]) -> Result<()> {
        let dest = self.layer_bundle_path(name, version);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, zip_bytes)?;
        Ok(())
    }

    /// Extracts each referenced layer's zip into the function's layer mount directory, in
    /// order, so later layers overwrite files from earlier ones.
    #[instrument(skip(self, layers))]
    pub fn extract_layers_into(&self, function_name: &str, version: i64, layers: &[LayerRef]) -> Result<()> {
        let dest = self.function_layer_path(function_name, version);
        std::fs::create_dir_all(&dest)?;
        for layer in layers {
            let bundle = self.layer_bundle_path(&layer.name, layer.version);
            let bytes = std::fs::read(&bundle)?;
            extract_zip_bytes(&bytes, &dest)?;
        }
        Ok(())
    }
}

/// Extracts `zip_bytes` into `dest_root`, creating it if necessary. Rejects any entry whose
/// cleaned path would escape `dest_root` via `..` traversal — the original implementation
/// joins the raw archive name directly onto the destination path with no such check.
fn extract_zip_bytes(zip_bytes: &[u8], dest_root: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_root)?;
    let reader = std::io::Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| ExecutorError::ExtractError(format!("unable to read zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExecutorError::ExtractError(format!("unable to read entry {i}: {e}")))?;

        let entry_name = entry.name().to_string();
        let safe_path = sanitize_entry_path(&entry_name)
            .ok_or_else(|| ExecutorError::ExtractError(format!("zip entry escapes destination: {entry_name}")))?;
        let out_path = dest_root.join(&safe_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %out_path.display(), "Saving extracted file");
        let mut out_file = std::fs::File::create(&out_path)?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| ExecutorError::ExtractError(format!("problem decompressing {entry_name}: {e}")))?;
        std::io::Write::write_all(&mut out_file, &buf)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    Ok(())
}

/// Cleans a zip entry name into a relative path, returning `None` if any component would
/// traverse above the destination root.
fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = zip::write::FileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn function_paths_follow_deterministic_layout() {
        let store = ArtifactStore::new("data");
        assert_eq!(
            store.function_content_path("hello", 3),
            PathBuf::from("data/lambda/functions/hello/3/content")
        );
        assert_eq!(
            store.layer_bundle_path("shared", 2),
            PathBuf::from("data/lambda/layers/shared/2.zip")
        );
    }

    #[test]
    fn save_function_code_extracts_into_content_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let zip_bytes = build_zip(&[("main.py", b"print('hi')")]);
        store.save_function_code("hello", 1, &zip_bytes).unwrap();
        let content = std::fs::read_to_string(
            store.function_content_path("hello", 1).join("main.py"),
        )
        .unwrap();
        assert_eq!(content, "print('hi')");
    }

    #[test]
    fn path_traversal_entries_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let zip_bytes = build_zip(&[("../../etc/evil", b"pwned")]);
        let err = store.save_function_code("hello", 1, &zip_bytes).unwrap_err();
        assert!(matches!(err, ExecutorError::ExtractError(_)));
        assert!(!tmp.path().join("etc/evil").exists());
    }
}
