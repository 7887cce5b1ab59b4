use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use vhid_bridge::haptics::HapticError;
use vhid_bridge::{BridgeConfig, HapticRegistry, HapticTarget, InputManager};

/// Stand-in haptic target that only logs what a physical device would receive
struct LoggingHapticTarget {
    serial: String,
}

impl HapticTarget for LoggingHapticTarget {
    fn trigger_haptics(&self, left: u8, right: u8) -> Result<(), HapticError> {
        info!(serial = %self.serial, left, right, "Rumble");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => BridgeConfig::default_path()?,
    };
    let config = BridgeConfig::load_or_create(&config_path).await?;

    let registry = Arc::new(HapticRegistry::new());
    if let Some(serial) = config.haptic_serial() {
        registry.register(
            serial.clone(),
            Arc::new(LoggingHapticTarget { serial }),
        );
    } else {
        warn!("No haptic serial configured, rumble will not be forwarded");
    }

    let manager = InputManager::new(config.clone(), registry);

    if config.gamepad.enabled {
        manager
            .enable_gamepad()
            .map_err(|e| eyre!("Failed to enable gamepad: {}", e))?;
    }
    if config.mouse.enabled {
        manager
            .enable_mouse()
            .map_err(|e| eyre!("Failed to enable mouse: {}", e))?;
    }

    info!("Virtual devices ready, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    manager.shutdown();
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
