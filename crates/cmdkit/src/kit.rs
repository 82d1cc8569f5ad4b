//! The orchestrator
//!
//! [`CommandKit`] owns the configuration and the platform client, builds the
//! event, validation and command registries in that order, and wires them to
//! the client. Everything it builds is published once and read-only
//! afterwards; handlers reach it through a cloneable [`KitHandle`].

use crate::error::{DispatchError, KitError, KitResult};
use crate::events::EventDispatcher;
use crate::handlers::{Handlers, Validation};
use crate::loader::{ManifestSource, ModuleLoader, ModuleSource, StaticModules};
use crate::platform::{
    EventArgs, EventListener, Interaction, InteractionListener, ListenerResult, PlatformClient,
};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::CommandRegistry;
use crate::scanner::{FsScanner, PathScanner};
use crate::types::CommandInfo;
use crate::validation::{DeveloperAllowList, Dispatched, ValidationPipeline};
use cmdkit_config::KitConfig;
use futures::FutureExt;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, info};

/// Everything [`CommandKit::new`] needs
///
/// Only the client is mandatory. Modules are read from disk with
/// [`FsScanner`] and [`ManifestSource`] unless another scanner or source is
/// supplied.
#[derive(Default)]
pub struct KitOptions {
    client: Option<Arc<dyn PlatformClient>>,
    config: KitConfig,
    scanner: Option<Arc<dyn PathScanner>>,
    source: Option<Arc<dyn ModuleSource>>,
    handlers: Handlers,
}

impl KitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: KitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn scanner(mut self, scanner: impl PathScanner + 'static) -> Self {
        self.scanner = Some(Arc::new(scanner));
        self
    }

    pub fn source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Serve every module from a pre-registered set instead of the filesystem
    pub fn modules(self, modules: StaticModules) -> Self {
        self.scanner(modules.clone()).source(modules)
    }
}

impl fmt::Debug for KitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitOptions")
            .field("client", &self.client.is_some())
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

struct KitState {
    config: KitConfig,
    commands: OnceLock<CommandRegistry>,
}

/// Shared read-only view of a [`CommandKit`]
///
/// Passed to every command, validation and event handler.
#[derive(Clone)]
pub struct KitHandle {
    state: Arc<KitState>,
}

impl KitHandle {
    fn new(config: KitConfig) -> Self {
        Self {
            state: Arc::new(KitState {
                config,
                commands: OnceLock::new(),
            }),
        }
    }

    /// A handle not attached to any running kit
    #[cfg(any(test, feature = "test-utils"))]
    pub fn detached() -> Self {
        Self::new(KitConfig::default())
    }

    pub(crate) fn registry(&self) -> Option<&CommandRegistry> {
        self.state.commands.get()
    }

    /// Every loaded command, handlers stripped
    pub fn commands(&self) -> Vec<CommandInfo> {
        self.registry().map(CommandRegistry::infos).unwrap_or_default()
    }

    pub fn config(&self) -> &KitConfig {
        &self.state.config
    }

    pub fn commands_path(&self) -> Option<&Path> {
        self.state.config.commands_path.as_deref()
    }

    pub fn events_path(&self) -> Option<&Path> {
        self.state.config.events_path.as_deref()
    }

    pub fn validations_path(&self) -> Option<&Path> {
        self.state.config.validations_path.as_deref()
    }

    pub fn dev_user_ids(&self) -> &[String] {
        &self.state.config.dev_user_ids
    }

    pub fn dev_guild_ids(&self) -> &[String] {
        &self.state.config.dev_guild_ids
    }

    pub fn dev_role_ids(&self) -> &[String] {
        &self.state.config.dev_role_ids
    }
}

impl fmt::Debug for KitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitHandle")
            .field("config", &self.state.config)
            .field(
                "commands",
                &self.registry().map(CommandRegistry::len).unwrap_or(0),
            )
            .finish()
    }
}

/// Discovers modules, reconciles commands and dispatches interactions
pub struct CommandKit {
    handle: KitHandle,
    client: Arc<dyn PlatformClient>,
    scanner: Arc<dyn PathScanner>,
    loader: ModuleLoader,
    pipeline: OnceLock<ValidationPipeline>,
    started: AtomicBool,
}

impl CommandKit {
    /// Validate `options` and set up the kit
    ///
    /// Nothing is loaded or subscribed until [`init`](Self::init).
    pub fn new(options: KitOptions) -> KitResult<Self> {
        let client = options.client.ok_or(KitError::MissingClient)?;
        options.config.validate()?;

        let scanner = options
            .scanner
            .unwrap_or_else(|| Arc::new(FsScanner) as Arc<dyn PathScanner>);
        let source = options
            .source
            .unwrap_or_else(|| Arc::new(ManifestSource) as Arc<dyn ModuleSource>);

        Ok(Self {
            handle: KitHandle::new(options.config),
            client,
            scanner,
            loader: ModuleLoader::new(source, options.handlers),
            pipeline: OnceLock::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Build and subscribe events, then validations, then commands
    ///
    /// Commands are reconciled against the platform when it fires `ready`.
    /// Every tree is loaded before anything is subscribed, so a failed init
    /// leaves the client untouched and may be retried. A successful init can
    /// only run once per kit.
    pub async fn init(&self) -> KitResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(KitError::AlreadyInitialized);
        }

        let (events, commands) = match self.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let config = self.handle.config();

        if let Some(events) = events {
            events.subscribe(&self.client, &self.handle);
        }

        if let Some((registry, pipeline)) = commands {
            self.handle
                .state
                .commands
                .set(registry)
                .map_err(|_| KitError::AlreadyInitialized)?;
            self.pipeline
                .set(pipeline.clone())
                .map_err(|_| KitError::AlreadyInitialized)?;

            self.client.once(
                "ready",
                ready_listener(
                    Arc::downgrade(&self.client),
                    self.handle.clone(),
                    config.dev_guild_ids.clone(),
                ),
            );
            self.client.on_interaction(interaction_listener(
                Arc::downgrade(&self.client),
                self.handle.clone(),
                pipeline,
            ));
        }

        info!(
            "CommandKit ready with {} commands",
            self.handle.registry().map(CommandRegistry::len).unwrap_or(0)
        );
        Ok(())
    }

    /// Load the event, validation and command trees without subscribing
    async fn load(
        &self,
    ) -> KitResult<(
        Option<EventDispatcher>,
        Option<(CommandRegistry, ValidationPipeline)>,
    )> {
        let config = self.handle.config();

        let events = match &config.events_path {
            Some(events_path) => Some(
                EventDispatcher::build(events_path, self.scanner.as_ref(), &self.loader).await?,
            ),
            None => None,
        };

        let mut custom: Vec<Arc<dyn Validation>> = Vec::new();
        if let Some(validations_path) = &config.validations_path {
            custom = ValidationPipeline::load_custom(
                validations_path,
                self.scanner.as_ref(),
                &self.loader,
            )
            .await?;
        }

        let commands = match &config.commands_path {
            Some(commands_path) => {
                let registry =
                    CommandRegistry::build(commands_path, self.scanner.as_ref(), &self.loader)
                        .await?;
                let pipeline = ValidationPipeline::new(
                    custom,
                    config.skip_builtin_validations,
                    DeveloperAllowList {
                        user_ids: config.dev_user_ids.clone(),
                        guild_ids: config.dev_guild_ids.clone(),
                        role_ids: config.dev_role_ids.clone(),
                    },
                );
                Some((registry, pipeline))
            }
            None => None,
        };

        Ok((events, commands))
    }

    /// Reconcile the loaded commands against the platform right away
    pub async fn reconcile(&self) -> KitResult<ReconcileReport> {
        let Some(registry) = self.handle.registry() else {
            return Ok(ReconcileReport::default());
        };
        let reconciler = Reconciler::new(self.client.clone(), self.handle.dev_guild_ids().to_vec());
        Ok(reconciler.run(registry).await?)
    }

    /// Route one interaction through validation to its command
    ///
    /// Returns `None` for interactions that are not commands, that name an
    /// unknown command, or that arrive before [`init`](Self::init).
    pub async fn dispatch(
        &self,
        interaction: Arc<dyn Interaction>,
    ) -> Result<Option<Dispatched>, DispatchError> {
        let Some(pipeline) = self.pipeline.get() else {
            return Ok(None);
        };
        dispatch(
            interaction,
            self.client.clone(),
            self.handle.clone(),
            pipeline,
        )
        .await
    }

    pub fn handle(&self) -> KitHandle {
        self.handle.clone()
    }

    pub fn client(&self) -> &Arc<dyn PlatformClient> {
        &self.client
    }

    /// Every loaded command, handlers stripped
    pub fn commands(&self) -> Vec<CommandInfo> {
        self.handle.commands()
    }

    pub fn commands_path(&self) -> Option<&Path> {
        self.handle.commands_path()
    }

    pub fn events_path(&self) -> Option<&Path> {
        self.handle.events_path()
    }

    pub fn validations_path(&self) -> Option<&Path> {
        self.handle.validations_path()
    }

    pub fn dev_user_ids(&self) -> &[String] {
        self.handle.dev_user_ids()
    }

    pub fn dev_guild_ids(&self) -> &[String] {
        self.handle.dev_guild_ids()
    }

    pub fn dev_role_ids(&self) -> &[String] {
        self.handle.dev_role_ids()
    }
}

impl fmt::Debug for CommandKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandKit")
            .field("handle", &self.handle)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

async fn dispatch(
    interaction: Arc<dyn Interaction>,
    client: Arc<dyn PlatformClient>,
    handle: KitHandle,
    pipeline: &ValidationPipeline,
) -> Result<Option<Dispatched>, DispatchError> {
    if !interaction.kind().is_command() {
        return Ok(None);
    }
    let Some(registry) = handle.registry() else {
        return Ok(None);
    };
    let Some(entry) = registry.get(interaction.command_name()) else {
        debug!(
            "No command named \"{}\", ignoring interaction",
            interaction.command_name()
        );
        return Ok(None);
    };

    let entry = entry.clone();
    pipeline
        .run(&entry, interaction, client, handle)
        .await
        .map(Some)
}

fn interaction_listener(
    client: Weak<dyn PlatformClient>,
    handle: KitHandle,
    pipeline: ValidationPipeline,
) -> InteractionListener {
    Arc::new(move |interaction: Arc<dyn Interaction>| {
        let client = client.upgrade();
        let handle = handle.clone();
        let pipeline = pipeline.clone();
        async move {
            let Some(client) = client else {
                return Ok(());
            };
            dispatch(interaction, client, handle, &pipeline)
                .await
                .map(|_| ())
        }
        .boxed()
    })
}

fn ready_listener(
    client: Weak<dyn PlatformClient>,
    handle: KitHandle,
    dev_guild_ids: Vec<String>,
) -> EventListener {
    Arc::new(move |_args: EventArgs| {
        let client = client.upgrade();
        let handle = handle.clone();
        let dev_guild_ids = dev_guild_ids.clone();
        async move {
            let (Some(client), Some(registry)) = (client, handle.registry()) else {
                return ListenerResult::Ok(());
            };
            match Reconciler::new(client, dev_guild_ids).run(registry).await {
                Ok(report) => debug!(
                    "Reconciled commands: {} created, {} edited, {} deleted, {} failed",
                    report.created(),
                    report.edited(),
                    report.deleted(),
                    report.failed()
                ),
                Err(e) => error!("Failed to fetch remote commands: {}", e),
            }
            Ok(())
        }
        .boxed()
    })
}
