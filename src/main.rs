use anyhow::Context;
use clap::Parser;
use sensor_session::domain::profiles::ServiceKind;
use sensor_session::domain::settings::SettingsService;
use sensor_session::infrastructure::bluetooth::notification::StreamEvent;
use sensor_session::infrastructure::bluetooth::transport::ServiceHandle;
use sensor_session::infrastructure::bluetooth::{
    BtleplugTransport, SessionConfig, SessionController, SessionOutcome,
};
use sensor_session::infrastructure::logging;
use sensor_session::presentation::console::{ConsolePresenter, OutputFormat};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// sensor service: heart-rate, running, cycling, battery or thermometer
    /// (defaults to the last one used)
    #[arg(short, long)]
    service: Option<ServiceKind>,

    /// how long to look for a peripheral, in milliseconds
    #[arg(long)]
    scan_timeout_ms: Option<u64>,

    /// log level, overrides the settings file
    #[arg(long)]
    log_level: Option<String>,

    /// measurement output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = SettingsService::new()?;

    let mut log_settings = settings.get().log_settings.clone();
    if let Some(level) = &args.log_level {
        log_settings.level = level.clone();
    }
    let _logging_guard = logging::init_logger(&log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    let kind = args
        .service
        .or(settings.get().last_service)
        .unwrap_or(ServiceKind::HeartRate);
    let scan_timeout = args
        .scan_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.get().scan_timeout());
    info!("Starting sensor session for {}", kind);

    let transport = BtleplugTransport::connect_first(kind, scan_timeout)
        .await
        .with_context(|| format!("cannot connect to a {} sensor", kind))?;
    if let Err(e) = settings.remember_service(kind) {
        warn!("Could not save settings to {}: {}", settings.path().display(), e);
    }

    let presenter = ConsolePresenter::new(kind, args.format);
    let mut controller =
        SessionController::new(transport, kind, SessionConfig::from(settings.get()));

    let outcome = controller
        .start(&ServiceHandle::new(kind.profile().service_uuid))
        .await;
    if presenter.show_outcome(&outcome, controller.sensor_location()) {
        if let Some(events) = controller.take_events() {
            stream(&presenter, events).await?;
        }
    }

    if let Err(e) = controller.shutdown().await {
        warn!("Failed to disable notifications: {}", e);
    }
    controller.into_transport().disconnect().await?;

    match outcome {
        SessionOutcome::Ready(_) => Ok(()),
        SessionOutcome::CriticalError(e) => Err(e.into()),
    }
}

/// Print events until the session ends or the user interrupts
async fn stream(
    presenter: &ConsolePresenter,
    mut events: mpsc::Receiver<StreamEvent>,
) -> anyhow::Result<()> {
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            result = &mut interrupted => {
                if let Err(e) = result {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, shutting down");
                return Ok(());
            }
            event = events.recv() => match event {
                Some(event) => {
                    if !presenter.show_event(&event)? {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            }
        }
    }
}
