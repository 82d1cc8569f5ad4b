//! Event handler chains
//!
//! Each directory directly below the events root names a platform event;
//! every module file inside it (at any depth) contributes one handler. On
//! each firing the handlers run one after another in load order, and a
//! handler answering [`Flow::Stop`] ends that firing's chain. The next firing
//! starts from the first handler again.

use crate::error::{DispatchError, ScanError};
use crate::handlers::{EventContext, EventHandler, Flow};
use crate::kit::KitHandle;
use crate::loader::{warn_skipped, ModuleLoader};
use crate::platform::{EventArgs, EventListener, PlatformClient};
use crate::scanner::PathScanner;
use futures::FutureExt;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// An event name and its ordered handlers
#[derive(Clone)]
pub struct EventBinding {
    name: String,
    handlers: Arc<[Arc<dyn EventHandler>]>,
}

impl EventBinding {
    pub fn new(name: impl Into<String>, handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self {
            name: name.into(),
            handlers: handlers.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain once
    ///
    /// Returns [`Flow::Stop`] when a handler cut the chain short. A handler
    /// error ends the firing and is returned as-is.
    pub async fn fire(&self, ctx: &EventContext) -> Result<Flow, DispatchError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            let flow = handler
                .handle(ctx)
                .await
                .map_err(|source| DispatchError::Event {
                    event: self.name.clone(),
                    source,
                })?;

            if flow.is_stop() {
                debug!(
                    "Event \"{}\" chain stopped after handler {} of {}",
                    self.name,
                    index + 1,
                    self.handlers.len()
                );
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Every event binding found below the events root
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    bindings: Vec<EventBinding>,
}

impl EventDispatcher {
    pub async fn build(
        events_path: &Path,
        scanner: &dyn PathScanner,
        loader: &ModuleLoader,
    ) -> Result<Self, ScanError> {
        let mut bindings = Vec::new();

        for folder in scanner.folders(events_path, false)? {
            let Some(name) = folder.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };

            let mut handlers = Vec::new();
            for path in scanner
                .files(&folder, true)?
                .into_iter()
                .filter(|p| loader.accepts(p))
            {
                match loader.load_event_handler(&path).await {
                    Ok(handler) => handlers.push(handler),
                    Err(e) => warn_skipped("Event", &path, &e),
                }
            }

            debug!("Event \"{}\": {} handlers", name, handlers.len());
            bindings.push(EventBinding::new(name, handlers));
        }

        info!(
            "Loaded {} events from {}",
            bindings.len(),
            events_path.display()
        );

        Ok(Self { bindings })
    }

    pub fn from_bindings(bindings: Vec<EventBinding>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &[EventBinding] {
        &self.bindings
    }

    pub fn get(&self, name: &str) -> Option<&EventBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Subscribe every binding to its event on `client`, once each
    pub fn subscribe(&self, client: &Arc<dyn PlatformClient>, kit: &KitHandle) {
        for binding in &self.bindings {
            client.on(
                binding.name(),
                listener(binding.clone(), Arc::downgrade(client), kit.clone()),
            );
        }
    }
}

/// The client owns its listeners, so they only hold it weakly
fn listener(binding: EventBinding, client: Weak<dyn PlatformClient>, kit: KitHandle) -> EventListener {
    Arc::new(move |args: EventArgs| {
        let binding = binding.clone();
        let client = client.upgrade();
        let kit = kit.clone();
        async move {
            let Some(client) = client else {
                return Ok(());
            };
            let ctx = EventContext {
                event: binding.name().to_string(),
                args,
                client,
                kit,
            };
            binding.fire(&ctx).await.map(|_| ())
        }
        .boxed()
    })
}
