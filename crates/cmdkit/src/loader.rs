//! Module loading
//!
//! A module is a manifest: a JSON-shaped value describing what a file
//! exports. [`ModuleSource`] turns a path into that value; [`ModuleLoader`]
//! unwraps `default` indirection and resolves handler names against the
//! registered [`Handlers`].
//!
//! Command module (`commands/info/ping.toml`):
//!
//! ```toml
//! run = "ping"
//!
//! [data]
//! name = "ping"
//! description = "Replies with Pong!"
//!
//! [options]
//! guild_only = true
//! ```
//!
//! Event or validation module: `handler = "log_ready"`.

use crate::error::{LoadError, ScanError};
use crate::handlers::{CommandRun, EventHandler, Handlers, Validation};
use crate::scanner::PathScanner;
use crate::types::{AccessOptions, CommandData};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps a discovered path to the value the module exports
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Whether `path` looks like a module this source can load
    fn accepts(&self, path: &Path) -> bool;

    async fn load(&self, path: &Path) -> Result<JsonValue, LoadError>;
}

/// Reads `.toml`, `.json`, `.yaml` and `.yml` manifests from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestSource;

impl ManifestSource {
    const EXTENSIONS: &'static [&'static str] = &["toml", "json", "yaml", "yml"];

    fn extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

#[async_trait]
impl ModuleSource for ManifestSource {
    fn accepts(&self, path: &Path) -> bool {
        Self::extension(path)
            .map(|ext| Self::EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    async fn load(&self, path: &Path) -> Result<JsonValue, LoadError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let parse_error = |message: String| LoadError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match Self::extension(path).as_deref() {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            _ => Err(parse_error("unsupported module extension".to_string())),
        }
    }
}

/// Modules registered up front, keyed by path
///
/// Serves as both the scanner and the source, so a bot can ship its module
/// tree compiled in without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct StaticModules {
    modules: BTreeMap<PathBuf, JsonValue>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>, export: JsonValue) -> Self {
        self.insert(path, export);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, export: JsonValue) {
        self.modules.insert(path.into(), export);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn relative<'a>(path: &'a Path, dir: &Path) -> Option<&'a Path> {
        path.strip_prefix(dir).ok().filter(|p| !p.as_os_str().is_empty())
    }
}

impl PathScanner for StaticModules {
    fn files(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError> {
        Ok(self
            .modules
            .keys()
            .filter(|path| {
                Self::relative(path, dir)
                    .map(|rel| nested || rel.components().count() == 1)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn folders(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError> {
        let mut folders = BTreeSet::new();
        for path in self.modules.keys() {
            let Some(rel) = Self::relative(path, dir) else {
                continue;
            };
            let mut current = dir.to_path_buf();
            let components: Vec<_> = rel.components().collect();
            // The last component is the file itself
            for (depth, component) in components.iter().take(components.len() - 1).enumerate() {
                if !nested && depth > 0 {
                    break;
                }
                current.push(component);
                folders.insert(current.clone());
            }
        }
        Ok(folders.into_iter().collect())
    }
}

#[async_trait]
impl ModuleSource for StaticModules {
    fn accepts(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    async fn load(&self, path: &Path) -> Result<JsonValue, LoadError> {
        self.modules
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

/// What a command module resolves to
pub struct LoadedCommand {
    pub data: CommandData,
    pub options: AccessOptions,
    pub run: Arc<dyn CommandRun>,
}

/// Loads modules from a [`ModuleSource`] and resolves their handlers
#[derive(Clone)]
pub struct ModuleLoader {
    source: Arc<dyn ModuleSource>,
    handlers: Handlers,
}

impl ModuleLoader {
    pub fn new(source: Arc<dyn ModuleSource>, handlers: Handlers) -> Self {
        Self { source, handlers }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        self.source.accepts(path)
    }

    /// Load a module's export, unwrapping one level of `default`
    pub async fn load(&self, path: &Path) -> Result<JsonValue, LoadError> {
        let export = self.source.load(path).await?;
        Ok(unwrap_default(export))
    }

    /// Load a command module: `data`, optional `options`, and `run`
    pub async fn load_command(&self, path: &Path) -> Result<LoadedCommand, LoadError> {
        let export = self.load(path).await?;

        let data = export.get("data").ok_or(LoadError::MissingExport("data"))?;
        let run = export.get("run").ok_or(LoadError::MissingExport("run"))?;

        let data: CommandData =
            serde_json::from_value(data.clone()).map_err(|e| LoadError::InvalidExport {
                field: "data",
                message: e.to_string(),
            })?;

        let options = match export.get("options") {
            Some(JsonValue::Null) | None => AccessOptions::default(),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| LoadError::InvalidExport {
                    field: "options",
                    message: e.to_string(),
                })?
            }
        };

        let run_name = run.as_str().ok_or_else(|| LoadError::InvalidExport {
            field: "run",
            message: "expected a handler name".to_string(),
        })?;
        let run = self
            .handlers
            .command(run_name)
            .ok_or_else(|| LoadError::UnknownHandler(run_name.to_string()))?;

        debug!("Loaded command \"{}\" from {}", data.name(), path.display());

        Ok(LoadedCommand { data, options, run })
    }

    /// Load an event module exporting a single handler
    pub async fn load_event_handler(&self, path: &Path) -> Result<Arc<dyn EventHandler>, LoadError> {
        let name = handler_name(&self.load(path).await?)?;
        self.handlers
            .event(&name)
            .ok_or(LoadError::UnknownHandler(name))
    }

    /// Load a validation module exporting a single handler
    pub async fn load_validation(&self, path: &Path) -> Result<Arc<dyn Validation>, LoadError> {
        let name = handler_name(&self.load(path).await?)?;
        self.handlers
            .validation(&name)
            .ok_or(LoadError::UnknownHandler(name))
    }
}

/// Unwrap `default` when it is the only meaningful content of the export
fn unwrap_default(export: JsonValue) -> JsonValue {
    match export {
        JsonValue::Object(mut map) if is_wrapped(&map) => {
            map.remove("default").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

fn is_wrapped(map: &serde_json::Map<String, JsonValue>) -> bool {
    map.get("default").is_some_and(|d| !is_empty_export(d))
        && map
            .iter()
            .all(|(key, value)| key == "default" || is_empty_export(value))
}

fn is_empty_export(value: &JsonValue) -> bool {
    matches!(value, JsonValue::Null | JsonValue::Bool(false))
}

/// A callable export is a handler name, bare or as `{ handler = "..." }`
fn handler_name(export: &JsonValue) -> Result<String, LoadError> {
    match export {
        JsonValue::String(name) => Ok(name.clone()),
        JsonValue::Object(map) => map
            .get("handler")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or(LoadError::NotCallable),
        _ => Err(LoadError::NotCallable),
    }
}

/// Log a module that was skipped during a build
pub(crate) fn warn_skipped(kind: &str, path: &Path, err: &LoadError) {
    match err {
        LoadError::MissingExport(_) | LoadError::NotCallable => {
            warn!("Ignoring: {} {} {}.", kind, compact_path(path), err)
        }
        _ => warn!("Ignoring: {} {}: {}", kind, compact_path(path), err),
    }
}

/// Path shown in skip warnings: relative to the working directory when possible
fn compact_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
