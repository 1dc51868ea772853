use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use atomic_write_file::AtomicWriteFile;

use crate::models::Module;
use crate::payload;
use crate::slip::Slip;

pub const DEFAULT_KEY: &str = "resultSlipData";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    key: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key: key.into(),
        }
    }

    pub fn open_default(root: Option<PathBuf>) -> anyhow::Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };
        Ok(Self::new(root, DEFAULT_KEY))
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.key))
    }

    pub fn load(&self) -> anyhow::Result<Option<Vec<Module>>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let modules = payload::decode_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(modules))
    }

    pub fn save(&self, modules: &[Module]) -> anyhow::Result<()> {
        ensure_dir(&self.root)?;
        let path = self.path();

        let mut file = AtomicWriteFile::open(&path)
            .with_context(|| format!("failed to open {} for writing", path.display()))?;
        serde_json::to_writer_pretty(&mut file, &payload::encode(modules))
            .context("failed to serialize slip")?;
        file.commit()
            .with_context(|| format!("failed to save {}", path.display()))?;
        Ok(())
    }

    /// Loads the slip for editing. A first run starts from one empty module;
    /// unreadable data is reported and replaced by an empty slip.
    pub fn load_or_default(&self) -> Slip {
        match self.load() {
            Ok(Some(modules)) => Slip::new(modules),
            Ok(None) => Slip::starter(),
            Err(err) => {
                eprintln!("Warning: {err:#}. Starting from an empty slip.");
                Slip::default()
            }
        }
    }
}

pub fn default_root() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir().context("could not determine a data directory; pass --data-dir")?;
    Ok(base.join("result-slip"))
}

fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}
