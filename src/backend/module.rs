// Mon Aug 03 2026 - Alex

use crate::backend::builtins;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Where the operation-module source comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleLocator {
    /// Read the module source from a file on disk.
    File(PathBuf),
    /// Module source supplied directly by the caller.
    Inline { name: String, source: String },
    /// The default module exposing every builtin operation.
    Builtin,
}

/// Module source text, loaded once by the engine and compiled
/// independently into every worker's context.
#[derive(Debug, Clone)]
pub struct ModuleCode {
    pub name: String,
    pub source: String,
}

impl ModuleLocator {
    pub fn read(&self) -> io::Result<ModuleCode> {
        match self {
            ModuleLocator::File(path) => {
                let source = fs::read_to_string(path)?;
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "module".to_string());
                Ok(ModuleCode { name, source })
            }
            ModuleLocator::Inline { name, source } => Ok(ModuleCode {
                name: name.clone(),
                source: source.clone(),
            }),
            ModuleLocator::Builtin => Ok(ModuleCode {
                name: "builtin".to_string(),
                source: builtins::default_module_source(),
            }),
        }
    }
}

impl Default for ModuleLocator {
    fn default() -> Self {
        ModuleLocator::Builtin
    }
}
