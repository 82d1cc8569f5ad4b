//! Validation pipeline run before every command handler
//!
//! Custom rules run first, in load order, followed by the built-in rules
//! unless they are switched off. The first rule that answers
//! [`Flow::Stop`] ends the invocation; the handler only runs when every rule
//! lets it through. Rules that reject are expected to have replied to the
//! user already. Built-in rejections are always ephemeral.

use crate::error::{DispatchError, ScanError};
use crate::handlers::{CommandContext, Flow, Validation, ValidationContext};
use crate::kit::KitHandle;
use crate::loader::{warn_skipped, ModuleLoader};
use crate::permissions::format_missing;
use crate::platform::{Interaction, InteractionReply, PlatformClient};
use crate::scanner::PathScanner;
use crate::types::{AccessOptions, CommandEntry};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Who counts as a developer for developer-only commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeveloperAllowList {
    pub user_ids: Vec<String>,
    pub guild_ids: Vec<String>,
    pub role_ids: Vec<String>,
}

impl DeveloperAllowList {
    pub fn is_dev_guild(&self, guild_id: &str) -> bool {
        self.guild_ids.iter().any(|id| id == guild_id)
    }

    /// Listed user, or holder of a listed role
    pub fn is_developer(&self, user_id: &str, role_ids: &[String]) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
            || role_ids.iter().any(|role| self.role_ids.contains(role))
    }
}

/// The rules every command gets unless built-ins are skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinValidation {
    BotPermissions,
    DevOnly,
    GuildOnly,
    UserPermissions,
}

impl BuiltinValidation {
    /// Evaluation order
    pub const ALL: [Self; 4] = [
        Self::BotPermissions,
        Self::DevOnly,
        Self::GuildOnly,
        Self::UserPermissions,
    ];

    /// The rejection message for `interaction`, if this rule refuses it
    pub fn rejection(
        self,
        interaction: &dyn Interaction,
        options: &AccessOptions,
        allow_list: &DeveloperAllowList,
    ) -> Option<String> {
        match self {
            Self::BotPermissions => {
                if options.bot_permissions.is_empty() {
                    return None;
                }
                let missing = interaction
                    .bot_permissions()?
                    .missing(&options.bot_permissions);
                (!missing.is_empty()).then(|| {
                    format!(
                        "❌ I do not have enough permissions to execute this command. Missing: {}",
                        format_missing(&missing)
                    )
                })
            }
            Self::DevOnly => {
                if !options.dev_only {
                    return None;
                }
                if let Some(guild_id) = interaction.guild_id() {
                    if !allow_list.is_dev_guild(guild_id) {
                        return Some(
                            "❌ This command can only be used inside development servers."
                                .to_string(),
                        );
                    }
                }
                let roles = interaction.member_role_ids();
                if !allow_list.is_developer(interaction.user_id(), &roles) {
                    return Some("❌ This command can only be used by developers.".to_string());
                }
                None
            }
            Self::GuildOnly => (options.guild_only && !interaction.in_guild())
                .then(|| "❌ This command can only be used inside a server.".to_string()),
            Self::UserPermissions => {
                if options.user_permissions.is_empty() {
                    return None;
                }
                let missing = interaction
                    .member_permissions()?
                    .missing(&options.user_permissions);
                (!missing.is_empty()).then(|| {
                    format!(
                        "❌ You do not have enough permissions to run this command. Missing: {}",
                        format_missing(&missing)
                    )
                })
            }
        }
    }
}

/// One link in the pipeline
#[derive(Clone)]
pub enum ValidationRule {
    Custom(Arc<dyn Validation>),
    Builtin(BuiltinValidation),
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("Custom"),
            Self::Builtin(rule) => write!(f, "Builtin({:?})", rule),
        }
    }
}

/// How a dispatched invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A rule stopped the invocation before the handler
    Rejected,
    /// The handler ran
    Executed,
}

/// Immutable ordered rule set, shared by every in-flight invocation
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    rules: Arc<[ValidationRule]>,
    allow_list: DeveloperAllowList,
}

impl ValidationPipeline {
    pub fn new(
        custom: Vec<Arc<dyn Validation>>,
        skip_builtins: bool,
        allow_list: DeveloperAllowList,
    ) -> Self {
        let builtins: &[BuiltinValidation] = if skip_builtins {
            &[]
        } else {
            &BuiltinValidation::ALL
        };

        let rules: Vec<ValidationRule> = custom
            .into_iter()
            .map(ValidationRule::Custom)
            .chain(builtins.iter().copied().map(ValidationRule::Builtin))
            .collect();

        Self {
            rules: rules.into(),
            allow_list,
        }
    }

    /// Load custom validations from every file below `validations_path`
    ///
    /// Files that do not export a registered validation are skipped with a
    /// warning.
    pub async fn load_custom(
        validations_path: &Path,
        scanner: &dyn PathScanner,
        loader: &ModuleLoader,
    ) -> Result<Vec<Arc<dyn Validation>>, ScanError> {
        let mut validations = Vec::new();

        for path in scanner
            .files(validations_path, true)?
            .into_iter()
            .filter(|p| loader.accepts(p))
        {
            match loader.load_validation(&path).await {
                Ok(validation) => {
                    debug!("Loaded validation from {}", path.display());
                    validations.push(validation);
                }
                Err(e) => warn_skipped("Validation", &path, &e),
            }
        }

        info!(
            "Loaded {} validations from {}",
            validations.len(),
            validations_path.display()
        );
        Ok(validations)
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn allow_list(&self) -> &DeveloperAllowList {
        &self.allow_list
    }

    /// Evaluate the rules for `entry`, then run its handler if none stopped
    pub async fn run(
        &self,
        entry: &CommandEntry,
        interaction: Arc<dyn Interaction>,
        client: Arc<dyn PlatformClient>,
        kit: KitHandle,
    ) -> Result<Dispatched, DispatchError> {
        let name = entry.name();
        let validation_ctx = ValidationContext {
            interaction: interaction.clone(),
            client: client.clone(),
            command: entry.info(),
            kit: kit.clone(),
        };

        for rule in self.rules.iter() {
            let flow = match rule {
                ValidationRule::Custom(validation) => validation
                    .validate(&validation_ctx)
                    .await
                    .map_err(|source| DispatchError::Validation {
                        command: name.to_string(),
                        source,
                    })?,
                ValidationRule::Builtin(builtin) => {
                    match builtin.rejection(interaction.as_ref(), &entry.options, &self.allow_list)
                    {
                        Some(content) => {
                            debug!("{:?} rejected \"{}\" for {}", builtin, name, interaction.user_id());
                            interaction
                                .reply(InteractionReply::ephemeral(content))
                                .await?;
                            Flow::Stop
                        }
                        None => Flow::Continue,
                    }
                }
            };

            if flow.is_stop() {
                return Ok(Dispatched::Rejected);
            }
        }

        let ctx = CommandContext {
            interaction,
            client,
            kit,
        };
        entry
            .run
            .run(ctx)
            .await
            .map_err(|source| DispatchError::Command {
                command: name.to_string(),
                source,
            })?;

        Ok(Dispatched::Executed)
    }
}
