//! Remote command reconciliation
//!
//! One best-effort pass per process start that converges the platform's
//! registered commands toward the local registry. Snapshots of every scope
//! are fetched up front; each local entry is then checked against them in
//! registry order and the resulting create, edit and delete calls are issued
//! one at a time.
//!
//! The diff is shallow: two definitions differ when their
//! descriptions (missing counts as empty) or their top-level option counts
//! differ. Renamed choices or reordered options are not detected.
//!
//! A failed remote call is logged and recorded in the [`ReconcileReport`];
//! it never stops the pass. There is no retry and no rollback.

use crate::error::PlatformError;
use crate::platform::{GuildInfo, PlatformClient, RemoteCommand, Scope};
use crate::registry::CommandRegistry;
use crate::types::{CommandData, CommandEntry};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Whether a remote definition needs an edit to match `local`
pub fn is_different(remote: &RemoteCommand, local: &CommandData) -> bool {
    let remote_description = remote.description.as_deref().unwrap_or("");
    let local_description = local.description().unwrap_or("");

    remote_description != local_description || remote.option_count != local.options().len()
}

/// Remote state of one scope, fetched once before the pass
#[derive(Debug, Clone)]
struct ScopeSnapshot {
    scope: Scope,
    commands: Vec<RemoteCommand>,
}

impl ScopeSnapshot {
    fn find(&self, name: &str) -> Option<&RemoteCommand> {
        self.commands.iter().find(|c| c.name == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

/// A remote mutation issued during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Create,
    Edit,
    Delete,
}

impl ReconcileAction {
    fn past(self) -> &'static str {
        match self {
            Self::Create => "Registered",
            Self::Edit => "Edited",
            Self::Delete => "Deleted",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Create => "register",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// One remote call and how it went
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub command: String,
    pub action: ReconcileAction,
    pub scope: Scope,
    pub error: Option<PlatformError>,
}

impl ReconcileOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Something the pass chose not to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    /// A configured developer guild was not joined, or its commands could not be fetched
    UnknownGuild { guild_id: String },
    /// A deleted command had nothing to delete in this scope
    NotRegistered { command: String, scope: Scope },
    /// A developer-only command with no developer guild to live in
    NoDevGuilds { command: String },
}

/// Everything one reconciliation pass did
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReconcileOutcome>,
    pub skipped: Vec<Skipped>,
}

impl ReconcileReport {
    fn count(&self, action: ReconcileAction) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && o.succeeded())
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(ReconcileAction::Create)
    }

    pub fn edited(&self) -> usize {
        self.count(ReconcileAction::Edit)
    }

    pub fn deleted(&self) -> usize {
        self.count(ReconcileAction::Delete)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    /// Remote calls issued, successful or not
    pub fn calls(&self) -> usize {
        self.outcomes.len()
    }

    /// No remote call was needed
    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn record(
        &mut self,
        action: ReconcileAction,
        scope: &Scope,
        name: &str,
        result: Result<(), PlatformError>,
    ) {
        let error = match result {
            Ok(()) => {
                info!("{} command \"{}\" {}.", action.past(), name, scope);
                None
            }
            Err(e) => {
                error!("Failed to {} command \"{}\" {}: {}", action, name, scope, e);
                Some(e)
            }
        };

        self.outcomes.push(ReconcileOutcome {
            command: name.to_string(),
            action,
            scope: scope.clone(),
            error,
        });
    }
}

/// Drives a reconciliation pass against one platform client
pub struct Reconciler {
    client: Arc<dyn PlatformClient>,
    dev_guild_ids: Vec<String>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn PlatformClient>, dev_guild_ids: Vec<String>) -> Self {
        Self {
            client,
            dev_guild_ids,
        }
    }

    /// Run one pass over `registry`
    ///
    /// Fails only when the global command list cannot be fetched. Every
    /// other failure is logged, recorded and passed over.
    pub async fn run(&self, registry: &CommandRegistry) -> Result<ReconcileReport, PlatformError> {
        let mut report = ReconcileReport::default();

        let dev_guilds = self.resolve_dev_guilds(&mut report);

        let global = ScopeSnapshot {
            scope: Scope::Global,
            commands: self.client.fetch_commands(&Scope::Global).await?,
        };

        let mut guilds = Vec::with_capacity(dev_guilds.len());
        for guild in dev_guilds {
            let scope = Scope::Guild(guild.clone());
            match self.client.fetch_commands(&scope).await {
                Ok(commands) => guilds.push(ScopeSnapshot { scope, commands }),
                Err(e) => {
                    warn!(
                        "Ignoring: Failed to fetch commands for guild {}: {}",
                        guild.id, e
                    );
                    report.skipped.push(Skipped::UnknownGuild { guild_id: guild.id });
                }
            }
        }

        debug!(
            "Reconciling {} commands against {} global and {} guild scopes",
            registry.len(),
            global.commands.len(),
            guilds.len()
        );

        for entry in registry.iter() {
            self.reconcile_entry(entry, &global, &guilds, &mut report)
                .await;
        }

        Ok(report)
    }

    fn resolve_dev_guilds(&self, report: &mut ReconcileReport) -> Vec<GuildInfo> {
        let mut guilds = Vec::new();
        for guild_id in &self.dev_guild_ids {
            match self.client.guild(guild_id) {
                Some(guild) => guilds.push(guild),
                None => {
                    warn!(
                        "Ignoring: Guild {} does not exist or client isn't in this guild.",
                        guild_id
                    );
                    report.skipped.push(Skipped::UnknownGuild {
                        guild_id: guild_id.clone(),
                    });
                }
            }
        }
        guilds
    }

    async fn reconcile_entry(
        &self,
        entry: &CommandEntry,
        global: &ScopeSnapshot,
        guilds: &[ScopeSnapshot],
        report: &mut ReconcileReport,
    ) {
        let name = entry.name();

        if entry.options.deleted {
            self.delete_everywhere(name, global, guilds, report).await;
            return;
        }

        // An attempted edit counts, even when the call fails
        let mut edited = false;
        for snapshot in std::iter::once(global).chain(guilds) {
            if let Some(remote) = snapshot.find(name) {
                if is_different(remote, &entry.data) {
                    let result = self
                        .client
                        .edit_command(&snapshot.scope, remote, &entry.data)
                        .await;
                    report.record(ReconcileAction::Edit, &snapshot.scope, name, result);
                    edited = true;
                }
            }
        }
        if edited {
            return;
        }

        if entry.options.dev_only {
            if guilds.is_empty() {
                warn!(
                    "Ignoring: Cannot register command \"{}\" as no valid \"devGuildIds\" were provided.",
                    name
                );
                report.skipped.push(Skipped::NoDevGuilds {
                    command: name.to_string(),
                });
                return;
            }

            for snapshot in guilds.iter().filter(|s| !s.contains(name)) {
                self.create(&snapshot.scope, entry, report).await;
            }
        } else if !global.contains(name) {
            self.create(&Scope::Global, entry, report).await;
        }
    }

    async fn create(&self, scope: &Scope, entry: &CommandEntry, report: &mut ReconcileReport) {
        let result = self
            .client
            .create_command(scope, &entry.data)
            .await
            .map(|_| ());
        report.record(ReconcileAction::Create, scope, entry.name(), result);
    }

    async fn delete_everywhere(
        &self,
        name: &str,
        global: &ScopeSnapshot,
        guilds: &[ScopeSnapshot],
        report: &mut ReconcileReport,
    ) {
        for snapshot in std::iter::once(global).chain(guilds) {
            match snapshot.find(name) {
                Some(remote) => {
                    let result = self.client.delete_command(&snapshot.scope, remote).await;
                    report.record(ReconcileAction::Delete, &snapshot.scope, name, result);
                }
                None => {
                    match &snapshot.scope {
                        Scope::Global => warn!(
                            "Ignoring: Command \"{}\" is globally marked as deleted.",
                            name
                        ),
                        Scope::Guild(guild) => warn!(
                            "Ignoring: Command \"{}\" is marked as deleted for {}.",
                            name, guild.name
                        ),
                    }
                    report.skipped.push(Skipped::NotRegistered {
                        command: name.to_string(),
                        scope: snapshot.scope.clone(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::command_fn;
    use crate::testing::MockPlatform;
    use crate::types::AccessOptions;
    use serde_json::json;
    use tracing_test::traced_test;

    fn entry(data: serde_json::Value, options: AccessOptions) -> CommandEntry {
        let data: CommandData = serde_json::from_value(data).unwrap();
        CommandEntry {
            file_path: format!("commands/{}.json", data.name()).into(),
            data,
            options,
            run: Arc::new(command_fn(|_ctx| async { anyhow::Ok(()) })),
            category: None,
        }
    }

    fn ping() -> CommandEntry {
        entry(
            json!({ "name": "ping", "description": "Pong!" }),
            AccessOptions::default(),
        )
    }

    fn dev_only(name: &str) -> CommandEntry {
        entry(
            json!({ "name": name, "description": "Developer tool" }),
            AccessOptions {
                dev_only: true,
                ..Default::default()
            },
        )
    }

    fn deleted(name: &str) -> CommandEntry {
        entry(
            json!({ "name": name, "description": "Gone" }),
            AccessOptions {
                deleted: true,
                ..Default::default()
            },
        )
    }

    fn reconciler(platform: &Arc<MockPlatform>, dev_guild_ids: &[&str]) -> Reconciler {
        Reconciler::new(
            platform.clone(),
            dev_guild_ids.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn remote(name: &str, description: &str, option_count: usize) -> RemoteCommand {
        RemoteCommand {
            id: format!("remote-{}", name),
            name: name.to_string(),
            description: Some(description.to_string()),
            option_count,
        }
    }

    #[test]
    fn test_is_different_compares_description_and_option_count() {
        let local: CommandData = serde_json::from_value(json!({
            "name": "echo",
            "description": "Echo",
            "options": [{ "type": "string", "name": "text", "description": "Text" }]
        }))
        .unwrap();

        assert!(!is_different(&remote("echo", "Echo", 1), &local));
        assert!(is_different(&remote("echo", "Echo", 0), &local));
        assert!(is_different(&remote("echo", "Other", 1), &local));
    }

    #[test]
    fn test_is_different_ignores_option_contents() {
        let local: CommandData = serde_json::from_value(json!({
            "name": "echo",
            "description": "Echo",
            "options": [{ "type": "integer", "name": "renamed", "description": "Changed" }]
        }))
        .unwrap();

        assert!(!is_different(&remote("echo", "Echo", 1), &local));
    }

    #[test]
    fn test_is_different_treats_missing_description_as_empty() {
        let local: CommandData =
            serde_json::from_value(json!({ "name": "Inspect", "type": "user" })).unwrap();
        let remote = RemoteCommand {
            id: "1".into(),
            name: "Inspect".into(),
            description: None,
            option_count: 0,
        };
        assert!(!is_different(&remote, &local));

        let remote_empty = RemoteCommand {
            description: Some(String::new()),
            ..remote
        };
        assert!(!is_different(&remote_empty, &local));
    }

    #[tokio::test]
    async fn test_creates_missing_global_command() {
        let platform = Arc::new(MockPlatform::new());
        let registry = CommandRegistry::from_entries(vec![ping()]);

        let report = reconciler(&platform, &[]).run(&registry).await.unwrap();

        assert_eq!(report.created(), 1);
        assert_eq!(platform.global_commands().len(), 1);
        assert_eq!(platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev"));
        let registry = CommandRegistry::from_entries(vec![
            ping(),
            dev_only("reload"),
            entry(
                json!({
                    "name": "echo",
                    "description": "Echo",
                    "options": [{ "type": "string", "name": "text", "description": "Text" }]
                }),
                AccessOptions::default(),
            ),
        ]);
        let reconciler = reconciler(&platform, &["10"]);

        let first = reconciler.run(&registry).await.unwrap();
        assert_eq!(first.created(), 3);

        platform.clear_calls();
        let second = reconciler.run(&registry).await.unwrap();
        assert!(second.is_noop());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edits_in_every_differing_scope_and_skips_create() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_guild("10", "Dev")
                .with_remote(Scope::Global, remote("ping", "Old", 0)),
        );
        platform.insert_remote(&platform.guild_scope("10"), remote("ping", "Older", 0));
        let registry = CommandRegistry::from_entries(vec![ping()]);

        let report = reconciler(&platform, &["10"]).run(&registry).await.unwrap();

        assert_eq!(report.edited(), 2);
        assert_eq!(report.created(), 0);
        assert_eq!(
            platform.global_commands()[0].description.as_deref(),
            Some("Pong!")
        );
    }

    #[tokio::test]
    async fn test_unchanged_remote_issues_no_calls() {
        let platform =
            Arc::new(MockPlatform::new().with_remote(Scope::Global, remote("ping", "Pong!", 0)));
        let registry = CommandRegistry::from_entries(vec![ping()]);

        let report = reconciler(&platform, &[]).run(&registry).await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_duplicate_names_reconcile_the_last_loaded_definition() {
        let first = entry(
            json!({ "name": "ping", "description": "first" }),
            AccessOptions::default(),
        );
        let second = entry(
            json!({ "name": "ping", "description": "second" }),
            AccessOptions::default(),
        );
        let registry = CommandRegistry::from_entries(vec![first, second]);

        let converged =
            Arc::new(MockPlatform::new().with_remote(Scope::Global, remote("ping", "second", 0)));
        let report = reconciler(&converged, &[]).run(&registry).await.unwrap();
        assert!(report.is_noop());
        assert!(converged.calls().is_empty());

        let empty = Arc::new(MockPlatform::new());
        let report = reconciler(&empty, &[]).run(&registry).await.unwrap();
        assert_eq!(report.created(), 1);
        assert_eq!(empty.global_commands().len(), 1);
        assert_eq!(
            empty.global_commands()[0].description.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deleted_entry_is_never_created() {
        let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev"));
        let registry = CommandRegistry::from_entries(vec![deleted("old")]);

        let report = reconciler(&platform, &["10"]).run(&registry).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.skipped.len(), 2);
        assert!(logs_contain("Command \"old\" is globally marked as deleted."));
        assert!(logs_contain("Command \"old\" is marked as deleted for Dev."));
    }

    #[tokio::test]
    async fn test_deleted_entry_removed_from_every_scope_holding_it() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_guild("10", "Dev A")
                .with_guild("20", "Dev B")
                .with_remote(Scope::Global, remote("old", "Gone", 0)),
        );
        platform.insert_remote(&platform.guild_scope("20"), remote("old", "Gone", 0));
        let registry = CommandRegistry::from_entries(vec![deleted("old")]);

        let report = reconciler(&platform, &["10", "20"])
            .run(&registry)
            .await
            .unwrap();

        assert_eq!(report.deleted(), 2);
        assert!(platform.global_commands().is_empty());
        assert!(platform.commands_in(&platform.guild_scope("20")).is_empty());
        assert_eq!(
            report.skipped,
            vec![Skipped::NotRegistered {
                command: "old".into(),
                scope: platform.guild_scope("10"),
            }]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dev_only_without_dev_guilds_is_skipped() {
        let platform = Arc::new(MockPlatform::new());
        let registry = CommandRegistry::from_entries(vec![dev_only("reload")]);

        let report = reconciler(&platform, &["404"]).run(&registry).await.unwrap();

        assert!(report.is_noop());
        assert!(platform.global_commands().is_empty());
        assert_eq!(
            report.skipped,
            vec![
                Skipped::UnknownGuild {
                    guild_id: "404".into()
                },
                Skipped::NoDevGuilds {
                    command: "reload".into()
                },
            ]
        );
        assert!(logs_contain("Guild 404 does not exist"));
    }

    #[tokio::test]
    async fn test_dev_only_created_in_each_guild_lacking_it() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_guild("10", "Dev A")
                .with_guild("20", "Dev B")
                .with_guild("30", "Dev C"),
        );
        platform.insert_remote(&platform.guild_scope("20"), remote("reload", "Developer tool", 0));
        let registry = CommandRegistry::from_entries(vec![dev_only("reload")]);

        let report = reconciler(&platform, &["10", "20", "30"])
            .run(&registry)
            .await
            .unwrap();

        assert_eq!(report.created(), 2);
        assert!(platform.global_commands().is_empty());
        let scopes: Vec<_> = report.outcomes.iter().map(|o| o.scope.clone()).collect();
        assert_eq!(
            scopes,
            vec![platform.guild_scope("10"), platform.guild_scope("30")]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_call_does_not_stop_the_pass() {
        let platform = Arc::new(MockPlatform::new().fail_on("ping"));
        let registry = CommandRegistry::from_entries(vec![
            ping(),
            entry(
                json!({ "name": "help", "description": "Help" }),
                AccessOptions::default(),
            ),
        ]);

        let report = reconciler(&platform, &[]).run(&registry).await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.created(), 1);
        assert_eq!(platform.global_commands().len(), 1);
        assert!(logs_contain("Failed to register command \"ping\" globally"));
        assert!(logs_contain("Registered command \"help\" globally."));
    }

    #[tokio::test]
    async fn test_global_fetch_failure_aborts() {
        let platform = Arc::new(MockPlatform::new().fail_fetch(Scope::Global));
        let registry = CommandRegistry::from_entries(vec![ping()]);

        assert!(reconciler(&platform, &[]).run(&registry).await.is_err());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_guild_fetch_failure_excludes_guild() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_guild("10", "Dev")
                .fail_fetch(Scope::Guild(GuildInfo {
                    id: "10".into(),
                    name: "Dev".into(),
                })),
        );
        let registry = CommandRegistry::from_entries(vec![dev_only("reload")]);

        let report = reconciler(&platform, &["10"]).run(&registry).await.unwrap();

        assert!(report.is_noop());
        assert!(report
            .skipped
            .contains(&Skipped::NoDevGuilds { command: "reload".into() }));
    }
}
