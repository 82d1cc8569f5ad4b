//! The command registry
//!
//! Built once from the commands root, then read-only for the rest of the
//! process. Files that fail to load are skipped with a warning; a single bad
//! module never aborts the build.

use crate::error::ScanError;
use crate::loader::{warn_skipped, ModuleLoader};
use crate::scanner::PathScanner;
use crate::types::{CommandEntry, CommandInfo};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Immutable, ordered set of loaded commands
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    /// Load every command module below `commands_path`
    ///
    /// Entries keep discovery order and names are unique. When two files
    /// declare the same name, the last one loaded wins.
    pub async fn build(
        commands_path: &Path,
        scanner: &dyn PathScanner,
        loader: &ModuleLoader,
    ) -> Result<Self, ScanError> {
        let paths = scanner.files(commands_path, true)?;
        let mut entries = Vec::new();

        for path in paths.into_iter().filter(|p| loader.accepts(p)) {
            let command = match loader.load_command(&path).await {
                Ok(command) => command,
                Err(e) => {
                    warn_skipped("Command", &path, &e);
                    continue;
                }
            };

            let category = derive_category(commands_path, &path);
            debug!(
                "Command \"{}\" in category {:?}",
                command.data.name(),
                category
            );

            entries.push(CommandEntry {
                data: command.data,
                options: command.options,
                run: command.run,
                file_path: path,
                category,
            });
        }

        let registry = Self::from_entries(entries);
        info!(
            "Loaded {} commands from {}",
            registry.len(),
            commands_path.display()
        );

        Ok(registry)
    }

    /// Collect `entries` in order, collapsing duplicate names
    ///
    /// A later entry replaces an earlier one of the same name in the earlier
    /// entry's position.
    pub fn from_entries(loaded: Vec<CommandEntry>) -> Self {
        let mut entries: Vec<CommandEntry> = Vec::with_capacity(loaded.len());
        let mut positions: HashMap<String, usize> = HashMap::new();

        for entry in loaded {
            match positions.get(entry.name()) {
                Some(&index) => {
                    warn!(
                        "Command \"{}\" from {} is overridden by {}.",
                        entry.name(),
                        entries[index].file_path.display(),
                        entry.file_path.display()
                    );
                    entries[index] = entry;
                }
                None => {
                    positions.insert(entry.name().to_string(), entries.len());
                    entries.push(entry);
                }
            }
        }

        Self { entries }
    }

    /// All entries in load order
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handler-free views of every entry
    pub fn infos(&self) -> Vec<CommandInfo> {
        self.entries.iter().map(CommandEntry::info).collect()
    }
}

/// The directory directly below `root` that holds `file`
///
/// `commands/info/ping.toml` → `Some("info")`, `commands/ping.toml` → `None`.
pub fn derive_category(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A lone component is the file itself
    components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}
