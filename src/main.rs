use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use topicbind::codec::{self, Value};
use topicbind::config::DriverConfig;
use topicbind::dispatch::{Dispatcher, DispatcherConfig, Transport};
use topicbind::host::{ChangeBatch, MemoryStore, ParamStore};
use topicbind::mqtt::MqttSession;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const LOG_ENV: &str = "TOPICBIND_LOG";
const CHANGE_FEED_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config().await?;
    let (store, changes) = MemoryStore::with_listener(CHANGE_FEED_CAPACITY);

    let session = MqttSession::create(config.mqtt.clone())
        .map_err(|e| eyre!("Failed to set up MQTT session: {}", e))?;
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig::from(&config.driver),
        session.transport(),
        store,
    ));

    for binding in &config.binding {
        match dispatcher
            .bind_directive(&binding.name, &binding.selector, &binding.args, binding.mask)
            .await
        {
            Ok(id) => info!(variable = %binding.name, "Bound {} to '{}'", id, binding.args),
            Err(e) => error!(variable = %binding.name, "Binding rejected: {}", e),
        }
    }
    info!(
        "{} of {} binding(s) active",
        dispatcher.binding_count().await,
        config.binding.len()
    );

    let session = session
        .connect()
        .await
        .map_err(|e| eyre!("Failed to connect to broker: {}", e))?;
    dispatcher.subscribe_all().await;

    let cancel = CancellationToken::new();
    tokio::spawn(monitor_changes(changes));
    tokio::spawn(console_writes(dispatcher.clone(), cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    let status = session.run(dispatcher, cancel).await;
    info!(
        "Session ended: {} received, {} sent, {} error(s)",
        status.messages_received,
        status.messages_sent,
        status.error_messages.len()
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn load_config() -> Result<DriverConfig> {
    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = DriverConfig::default_path();
            if DriverConfig::ensure_template(&path).await? {
                return Err(eyre!(
                    "No configuration found, a template was written to {}. Add bindings and restart.",
                    path.display()
                ));
            }
            path
        }
    };
    DriverConfig::load(&path).await
}

async fn monitor_changes(mut changes: mpsc::Receiver<ChangeBatch>) {
    while let Some(batch) = changes.recv().await {
        for (id, value) in &batch.changes {
            info!("{} {} = {}", batch.timestamp.format("%H:%M:%S%.3f"), id, value);
        }
    }
    debug!("Change feed closed");
}

/// Reads `NAME VALUE` lines from stdin and writes them through the dispatcher.
async fn console_writes<T, H>(dispatcher: Arc<Dispatcher<T, H>>, cancel: CancellationToken)
where
    T: Transport,
    H: ParamStore,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, raw)) = line.split_once(char::is_whitespace) else {
            warn!("Expected 'NAME VALUE', got '{}'", line);
            continue;
        };

        let Some((id, kind)) = dispatcher.lookup(name).await else {
            warn!(variable = %name, "No such variable");
            continue;
        };
        let value: Value = match codec::decode(kind, raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                warn!(variable = %name, "Invalid {} value: {}", kind, e);
                continue;
            }
        };
        match dispatcher.write(id, value).await {
            Ok(()) => info!(variable = %name, "Write requested"),
            Err(e) => warn!(variable = %name, "Write failed: {}", e),
        }
    }
    debug!("Console closed");
}
