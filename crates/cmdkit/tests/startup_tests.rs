use cmdkit::testing::{MockCall, MockInteraction, MockPlatform};
use cmdkit::{
    command_fn, event_fn, validation_fn, CommandKit, Flow, Handlers, Interaction,
    InteractionReply, KitConfig, KitOptions, RemoteCommand, Scope,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_test::traced_test;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small bot tree: two commands, one ready handler, one validation
fn create_bot(root: &Path) {
    write(
        &root.join("commands/ping.toml"),
        r#"
run = "ping"

[data]
name = "ping"
description = "Replies with Pong!"
"#,
    );
    write(
        &root.join("commands/admin/reload.yaml"),
        r#"
run: reload
data:
  name: reload
  description: Reload everything
options:
  devOnly: true
"#,
    );
    write(
        &root.join("commands/admin/broken.json"),
        r#"{ "run": "ping" }"#,
    );
    write(&root.join("events/ready/announce.toml"), "handler = \"announce\"\n");
    write(
        &root.join("validations/maintenance.json"),
        r#"{ "default": { "handler": "maintenance" } }"#,
    );
    write(
        &root.join("cmdkit.toml"),
        r#"
commandsPath = "commands"
eventsPath = "events"
validationsPath = "validations"
devGuildIds = ["10"]
devUserIds = ["owner"]
"#,
    );
}

/// Paths in the config file are relative to the bot root
async fn load_config(root: &Path) -> KitConfig {
    let config = KitConfig::load(root.join("cmdkit.toml")).await.unwrap();
    KitConfig {
        commands_path: config.commands_path.map(|p| root.join(p)),
        events_path: config.events_path.map(|p| root.join(p)),
        validations_path: config.validations_path.map(|p| root.join(p)),
        ..config
    }
}

struct Counters {
    ping: Arc<AtomicUsize>,
    announce: Arc<AtomicUsize>,
    maintenance: Arc<Mutex<bool>>,
}

fn handlers() -> (Handlers, Counters) {
    let counters = Counters {
        ping: Arc::new(AtomicUsize::new(0)),
        announce: Arc::new(AtomicUsize::new(0)),
        maintenance: Arc::new(Mutex::new(false)),
    };

    let ping = counters.ping.clone();
    let announce = counters.announce.clone();
    let maintenance = counters.maintenance.clone();

    let handlers = Handlers::builder()
        .command(
            "ping",
            command_fn(move |ctx| {
                let ping = ping.clone();
                async move {
                    ping.fetch_add(1, Ordering::SeqCst);
                    ctx.interaction
                        .reply(InteractionReply::ephemeral("Pong!"))
                        .await?;
                    Ok(())
                }
            }),
        )
        .command("reload", command_fn(|_ctx| async { anyhow::Ok(()) }))
        .event(
            "announce",
            event_fn(move |ctx| {
                let announce = announce.clone();
                async move {
                    assert_eq!(ctx.kit.commands().len(), 2);
                    announce.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(Flow::Continue)
                }
            }),
        )
        .validation(
            "maintenance",
            validation_fn(move |ctx| {
                let maintenance = maintenance.clone();
                async move {
                    let down = *maintenance.lock().unwrap();
                    if down {
                        ctx.interaction
                            .reply(InteractionReply::ephemeral("Down for maintenance"))
                            .await?;
                    }
                    anyhow::Ok(Flow::from(down))
                }
            }),
        )
        .build();

    (handlers, counters)
}

async fn start(root: &Path, platform: &Arc<MockPlatform>) -> (CommandKit, Counters) {
    let (handlers, counters) = handlers();
    let kit = CommandKit::new(
        KitOptions::new()
            .client(platform.clone())
            .config(load_config(root).await)
            .handlers(handlers),
    )
    .unwrap();
    kit.init().await.unwrap();
    (kit, counters)
}

#[tokio::test]
#[traced_test]
async fn test_startup_loads_tree_and_skips_broken_modules() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev Server"));

    let (kit, _counters) = start(temp.path(), &platform).await;

    let names: Vec<_> = kit.commands().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["reload", "ping"]);
    assert_eq!(
        kit.commands()[0].category.as_deref(),
        Some("admin"),
        "reload lives under commands/admin"
    );
    assert_eq!(kit.commands()[1].category, None);
    assert_eq!(kit.dev_guild_ids(), ["10".to_string()]);

    assert!(logs_contain("does not export \"data\"."));
    assert_eq!(platform.listener_count("ready"), 2);
    assert_eq!(platform.interaction_listener_count(), 1);
}

#[tokio::test]
async fn test_ready_reconciles_and_runs_event_chain() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev Server"));
    let (_kit, counters) = start(temp.path(), &platform).await;

    platform.emit("ready", Vec::new()).await.unwrap();

    assert_eq!(counters.announce.load(Ordering::SeqCst), 1);
    assert_eq!(
        platform.calls(),
        vec![
            MockCall::Create {
                scope: platform.guild_scope("10"),
                name: "reload".into(),
            },
            MockCall::Create {
                scope: Scope::Global,
                name: "ping".into(),
            },
        ]
    );

    // Reconciliation is one-shot; the event chain is not
    platform.clear_calls();
    platform.emit("ready", Vec::new()).await.unwrap();
    assert!(platform.calls().is_empty());
    assert_eq!(counters.announce.load(Ordering::SeqCst), 2);
    assert_eq!(platform.listener_count("ready"), 1);
}

#[tokio::test]
async fn test_restart_against_converged_platform_is_quiet() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev Server"));

    let (first, _) = start(temp.path(), &platform).await;
    let report = first.reconcile().await.unwrap();
    assert_eq!(report.created(), 2);

    platform.clear_calls();
    let (second, _) = start(temp.path(), &platform).await;
    let report = second.reconcile().await.unwrap();
    assert!(report.is_noop());
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_stale_remote_definition_is_edited() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_remote(
        Scope::Global,
        RemoteCommand {
            id: "1".into(),
            name: "ping".into(),
            description: Some("Old description".into()),
            option_count: 0,
        },
    ));
    let (kit, _) = start(temp.path(), &platform).await;

    let report = kit.reconcile().await.unwrap();

    assert_eq!(report.edited(), 1);
    assert_eq!(
        platform.global_commands()[0].description.as_deref(),
        Some("Replies with Pong!")
    );
}

#[tokio::test]
async fn test_interactions_flow_through_validations() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev Server"));
    let (_kit, counters) = start(temp.path(), &platform).await;

    let ping = Arc::new(MockInteraction::chat_input("ping", "someone"));
    platform.interact(ping.clone() as Arc<dyn Interaction>).await.unwrap();
    assert_eq!(counters.ping.load(Ordering::SeqCst), 1);
    assert_eq!(ping.replies(), vec![InteractionReply::ephemeral("Pong!")]);

    *counters.maintenance.lock().unwrap() = true;
    let blocked = Arc::new(MockInteraction::chat_input("ping", "someone"));
    platform
        .interact(blocked.clone() as Arc<dyn Interaction>)
        .await
        .unwrap();
    assert_eq!(counters.ping.load(Ordering::SeqCst), 1);
    assert_eq!(
        blocked.replies(),
        vec![InteractionReply::ephemeral("Down for maintenance")]
    );
}

#[tokio::test]
async fn test_dev_only_command_rejects_non_developers() {
    let temp = TempDir::new().unwrap();
    create_bot(temp.path());
    let platform = Arc::new(MockPlatform::new().with_guild("10", "Dev Server"));
    let (_kit, _) = start(temp.path(), &platform).await;

    let outsider = Arc::new(MockInteraction::chat_input("reload", "someone").in_guild("10"));
    platform
        .interact(outsider.clone() as Arc<dyn Interaction>)
        .await
        .unwrap();
    assert_eq!(
        outsider.replies(),
        vec![InteractionReply::ephemeral(
            "❌ This command can only be used by developers."
        )]
    );

    let wrong_guild = Arc::new(MockInteraction::chat_input("reload", "owner").in_guild("99"));
    platform
        .interact(wrong_guild.clone() as Arc<dyn Interaction>)
        .await
        .unwrap();
    assert_eq!(
        wrong_guild.replies(),
        vec![InteractionReply::ephemeral(
            "❌ This command can only be used inside development servers."
        )]
    );

    let owner = Arc::new(MockInteraction::chat_input("reload", "owner").in_guild("10"));
    platform
        .interact(owner.clone() as Arc<dyn Interaction>)
        .await
        .unwrap();
    assert!(owner.replies().is_empty());
}
