//! # Telemetria Node
//!
//! Amostra os sensores a cada período e transmite cada registro pela
//! serial com entrega store-and-forward: sem ACK, o registro vai para o
//! backlog e é retransmitido quando o link voltar.
//!
//! ## Uso
//! ```bash
//! telemetry_node                          # config.toml ao lado do executável
//! telemetry_node --config /etc/node.toml  # config explícita
//! ```
//!
//! Enter no console aciona o reset manual (volta para `Connecting`).

mod panel;
mod sensors;
mod serial;

use panel::{ConsoleButton, LogIndicator};
use sensors::{SimulatedSensors, SystemClock};
use serial::SerialTransport;
use std::path::PathBuf;
use std::process::ExitCode;
use telemetry_core::acquisition::{Acquisition, spawn_acquisition_thread};
use telemetry_core::config::AppConfig;
use telemetry_core::protocol::FRAME_SIZE;
use telemetry_core::{BacklogBuffer, DeliveryController, DeliveryLink, sample_channel};
use tracing::{error, info, warn};

/// Ciclos de aquecimento do sensor de gás simulado.
const GAS_WARMUP_CYCLES: u32 = 30;

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = config_path_from_args().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    let node_cfg = &config.node;

    // ── Serial ──
    let transport = match SerialTransport::open(&node_cfg.serial_port, node_cfg.baud_rate) {
        Ok(t) => t,
        Err(e) => {
            error!("Falha ao abrir {}: {e}", node_cfg.serial_port);
            return ExitCode::FAILURE;
        }
    };

    // ── Aquisição ──
    let (tx, rx) = sample_channel(node_cfg.channel_capacity);
    let acquisition = Acquisition::new(SystemClock, SimulatedSensors::new(GAS_WARMUP_CYCLES), tx);
    if let Err(e) = spawn_acquisition_thread(acquisition, node_cfg.sample_interval()) {
        error!("Falha ao criar thread de aquisição: {e}");
        return ExitCode::FAILURE;
    }

    // ── Painel ──
    let reset = match ConsoleButton::spawn() {
        Ok(b) => b,
        Err(e) => {
            error!("Falha ao criar thread do botão: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ TELEMETRIA NODE – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Porta:      {} @ {} baud", node_cfg.serial_port, node_cfg.baud_rate);
    println!("  Intervalo:  {} ms", node_cfg.sample_interval_ms);
    println!("  Frame:      {FRAME_SIZE} bytes");
    println!("  Backlog:    {} registros", node_cfg.backlog_capacity);
    println!("  Reset:      Enter");
    println!("══════════════════════════════════════════════");
    println!();

    // ── Controlador ──
    let timings = node_cfg.timings.delivery_timings();
    let link = DeliveryLink::new(transport, timings.ack_poll_interval);
    let controller = DeliveryController::new(
        link,
        rx,
        BacklogBuffer::new(node_cfg.backlog_capacity),
        LogIndicator::default(),
        reset,
        timings,
    );

    info!("Controlador de entrega pronto");
    let err = controller.run();
    error!("Controlador encerrado: {err}");
    ExitCode::FAILURE
}

/// Lê `--config <caminho>` da linha de comando.
fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
