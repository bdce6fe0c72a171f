use serde::{Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

/// Size and modification time of one stored JSON document.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the directory this manager owns (e.g. ".../storage/cache")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// **Constructor: new_relative**
    /// Creates a manager whose directory sits next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// **Constructor: new**
    /// Creates a manager rooted at an explicit directory. The directory is
    /// created immediately so later saves never have to check for it.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// A manager for a sub-directory of this one.
    pub async fn child(&self, name: &str) -> anyhow::Result<Self> {
        Self::new(self.base_dir.join(name)).await
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize(filename)))
    }

    /// **Generic Save Function**
    /// Serializes `data` to `<filename>.json` using an atomic write: the bytes
    /// go to a `.tmp` sibling first and are then renamed over the target, so
    /// readers only ever see the old or the new document.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = final_path.with_extension("json.tmp");

        let json_bytes = serde_json::to_vec_pretty(data)?;

        tokio::fs::write(&tmp_path, json_bytes).await?;
        tokio::fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// **Generic Load Function**
    /// Reads `<filename>.json` and deserializes it into `T`.
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // Read raw bytes; serde_json validates UTF-8 while parsing anyway.
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Like `load`, but a missing file is `Ok(None)` instead of an error.
    pub async fn load_optional<T: DeserializeOwned>(
        &self,
        filename: &str,
    ) -> anyhow::Result<Option<T>> {
        match fs::read(self.path_for(filename)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every `.json` document in the directory.
    pub async fn list(&self) -> anyhow::Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") {
                continue;
            }
            files.push(StoredFile {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        Ok(files)
    }

    /// Removes every document in the directory, leaving the directory itself.
    pub async fn clear(&self) -> anyhow::Result<usize> {
        let files = self.list().await?;
        for file in &files {
            fs::remove_file(self.base_dir.join(&file.name)).await?;
        }
        Ok(files.len())
    }
}

/// File names come from symbols and provider ids; keep them flat.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}
