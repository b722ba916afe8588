use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::info;

/// A program image read from disk, ready to hand to an engine.
#[derive(Debug, Clone)]
pub struct Cartridge {
    path: PathBuf,
    data: Box<[u8]>,
}

impl Cartridge {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read program image {}", path.display()))?;
        ensure!(!content.is_empty(), "Program image {} is empty", path.display());
        info!(
            "Loaded {} bytes from {}",
            content.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            data: content.into_boxed_slice(),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name without its directory, for the window title.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("frameshell-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load() {
        let path = temp_file("game.nes", &[0x4e, 0x45, 0x53, 0x1a]);
        let cartridge = Cartridge::load(&path).unwrap();
        assert_eq!(cartridge.data(), &[0x4e, 0x45, 0x53, 0x1a]);
        assert_eq!(cartridge.len(), 4);
        assert!(cartridge.name().ends_with("game.nes"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = Cartridge::load("/definitely/not/here.nes").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.nes"));
    }

    #[test]
    fn test_empty_file() {
        let path = temp_file("empty.nes", &[]);
        let err = Cartridge::load(&path).unwrap_err();
        assert!(err.to_string().contains("is empty"));
        std::fs::remove_file(path).unwrap();
    }
}
