//! Durable storage for saves.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::blockfit_core::BlockfitCore;

/// A single persisted value.
pub trait DurableCell<T> {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> io::Result<Option<T>>;
    fn store(&mut self, value: &T) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

/// JSON file written via a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct JsonFileCell<T> {
    path: PathBuf,
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonFileCell<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> DurableCell<T> for JsonFileCell<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> io::Result<Option<T>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn store(&mut self, value: &T) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        atomic_write(&self.path, &json)
    }

    fn clear(&mut self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// In-memory cell holding the serialized JSON, so values still pass
/// through the same encoding as on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryCell<T> {
    json: Option<Vec<u8>>,
    _value: PhantomData<fn() -> T>,
}

impl<T> MemoryCell<T> {
    pub fn new() -> Self {
        Self {
            json: None,
            _value: PhantomData,
        }
    }

    pub fn raw(&self) -> Option<&[u8]> {
        self.json.as_deref()
    }
}

impl<T> DurableCell<T> for MemoryCell<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> io::Result<Option<T>> {
        self.json
            .as_deref()
            .map(|bytes| {
                serde_json::from_slice(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .transpose()
    }

    fn store(&mut self, value: &T) -> io::Result<()> {
        let json =
            serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.json = Some(json);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.json = None;
        Ok(())
    }
}

pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}

pub const SAVE_VERSION: u32 = 1;

fn default_save_version() -> u32 {
    SAVE_VERSION
}

/// Versioned envelope around a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFile {
    #[serde(default = "default_save_version")]
    pub version: u32,
    pub session: BlockfitCore,
}

/// Loads and stores whole sessions through any durable cell.
pub struct SaveStore<C: DurableCell<SaveFile>> {
    cell: C,
}

impl SaveStore<JsonFileCell<SaveFile>> {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileCell::new(path))
    }

    /// `BLOCKFIT_SAVE_PATH`, else `$XDG_DATA_HOME/blockfit/save.json`
    /// (falling back to `~/.local/share`).
    pub fn from_env() -> Self {
        Self::at_path(default_save_path(|k| std::env::var_os(k).map(PathBuf::from)))
    }
}

pub fn default_save_path<F>(mut get_env: F) -> PathBuf
where
    F: FnMut(&str) -> Option<PathBuf>,
{
    if let Some(explicit) = get_env("BLOCKFIT_SAVE_PATH") {
        return explicit;
    }
    let mut path = get_env("XDG_DATA_HOME")
        .or_else(|| {
            get_env("HOME").map(|mut home| {
                home.push(".local");
                home.push("share");
                home
            })
        })
        .unwrap_or_else(|| PathBuf::from("."));
    path.push("blockfit");
    path.push("save.json");
    path
}

impl<C: DurableCell<SaveFile>> SaveStore<C> {
    pub fn new(cell: C) -> Self {
        Self { cell }
    }

    pub fn cell(&self) -> &C {
        &self.cell
    }

    pub fn load(&self) -> io::Result<Option<BlockfitCore>> {
        let Some(save) = self.cell.load()? else {
            return Ok(None);
        };
        if save.version > SAVE_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("save version {} is newer than {SAVE_VERSION}", save.version),
            ));
        }
        let mut session = save.session;
        session.sanitize_loaded_config();
        Ok(Some(session))
    }

    pub fn save(&mut self, session: &BlockfitCore) -> io::Result<()> {
        self.cell.store(&SaveFile {
            version: SAVE_VERSION,
            session: session.clone(),
        })
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.cell.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_save_path_prefers_explicit_env() {
        let path = default_save_path(|k| match k {
            "BLOCKFIT_SAVE_PATH" => Some(PathBuf::from("/tmp/x.json")),
            "HOME" => Some(PathBuf::from("/home/p")),
            _ => None,
        });
        assert_eq!(path, PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn default_save_path_falls_back_to_home() {
        let path = default_save_path(|k| match k {
            "HOME" => Some(PathBuf::from("/home/p")),
            _ => None,
        });
        assert_eq!(path, PathBuf::from("/home/p/.local/share/blockfit/save.json"));
    }

    #[test]
    fn memory_cell_starts_empty_and_clears() {
        let mut cell = MemoryCell::<Vec<u32>>::new();
        assert_eq!(cell.load().unwrap(), None);
        cell.store(&vec![1, 2]).unwrap();
        assert_eq!(cell.load().unwrap(), Some(vec![1, 2]));
        cell.clear().unwrap();
        assert!(cell.raw().is_none());
    }

    #[test]
    fn newer_save_versions_are_rejected() {
        let mut cell = MemoryCell::<SaveFile>::new();
        let mut save = SaveFile {
            version: SAVE_VERSION,
            session: BlockfitCore::new(1),
        };
        save.version = SAVE_VERSION + 1;
        cell.store(&save).unwrap();
        let store = SaveStore::new(cell);
        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
