//! Loads per-contract interface descriptors (`<address>.json`, `<address>.abi.json`)
//! into an [`EventNameResolver`].

use std::path::{Path, PathBuf};

use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use thiserror::Error;

use crate::resolver::EventNameResolver;

#[derive(Debug, Error)]
pub enum AbiLoadError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Register every event of every descriptor found in `dir`.
///
/// A missing directory is not an error. Files that fail to read or parse are
/// logged and skipped. Returns the number of events registered.
pub fn load_abi_dir(dir: &Path, resolver: &mut EventNameResolver) -> Result<usize, AbiLoadError> {
    let meta = match std::fs::metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "ABI directory not present");
            return Ok(0);
        }
        Err(source) => {
            return Err(AbiLoadError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };
    if !meta.is_dir() {
        return Err(AbiLoadError::NotADirectory(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|source| AbiLoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut registered = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(address) = descriptor_address(&path) else {
            continue;
        };
        match load_file(&path, address, resolver) {
            Ok(count) => {
                tracing::debug!(file = %path.display(), events = count, "Loaded ABI");
                registered += count;
            }
            Err(e) => tracing::warn!(error = %e, "Skipping ABI file"),
        }
    }

    tracing::info!(dir = %dir.display(), events = registered, "ABI descriptors loaded");
    Ok(registered)
}

fn load_file(
    path: &Path,
    address: Address,
    resolver: &mut EventNameResolver,
) -> Result<usize, AbiLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AbiLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let abi: JsonAbi = serde_json::from_str(&raw).map_err(|source| AbiLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut count = 0;
    for event in abi.events() {
        resolver.register(address, event.selector(), event.name.clone());
        count += 1;
    }
    Ok(count)
}

/// Address encoded in a descriptor file name, if the name qualifies.
fn descriptor_address(path: &Path) -> Option<Address> {
    let name = path.file_name()?.to_str()?;
    let lower = name.to_ascii_lowercase();
    if !(lower.ends_with(".json") || lower.ends_with(".abi")) {
        return None;
    }
    let stem = name.split('.').next()?;
    stem.parse::<Address>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    const ABI: &str = r#"[
        {"type":"event","name":"Paused","inputs":[{"name":"account","type":"address","indexed":false}],"anonymous":false},
        {"type":"function","name":"pause","inputs":[],"outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    #[test]
    fn test_missing_dir_is_ok() {
        let mut resolver = EventNameResolver::new();
        let loaded = load_abi_dir(Path::new("/definitely/not/here"), &mut resolver).unwrap();
        assert_eq!(loaded, 0);
    }

    #[test]
    fn test_loads_events_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let contract = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");

        std::fs::write(dir.path().join(format!("{contract:#x}.abi.json")), ABI).unwrap();
        std::fs::write(
            dir.path().join("0x1111111111111111111111111111111111111111.json"),
            "{ not json",
        )
        .unwrap();
        std::fs::write(dir.path().join("readme.json"), ABI).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let mut resolver = EventNameResolver::new();
        let loaded = load_abi_dir(dir.path(), &mut resolver).unwrap();
        assert_eq!(loaded, 1);

        let paused = keccak256("Paused(address)");
        assert_eq!(resolver.resolve(&contract, &paused), "Paused");
        assert_ne!(resolver.resolve(&Address::ZERO, &paused), "Paused");
    }

    #[test]
    fn test_file_instead_of_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut resolver = EventNameResolver::new();
        assert!(matches!(
            load_abi_dir(file.path(), &mut resolver),
            Err(AbiLoadError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_descriptor_address() {
        let abi = Path::new("0x33381eC82DD811b1BABa841f1e2410468aeD7047.abi");
        let txt = Path::new("0x33381eC82DD811b1BABa841f1e2410468aeD7047.txt");
        assert!(descriptor_address(abi).is_some());
        assert!(descriptor_address(txt).is_none());
        assert!(descriptor_address(Path::new("hub.json")).is_none());
    }
}
