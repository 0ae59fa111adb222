//! # Telemetria Receiver
//!
//! Ponta receptora do link serial: ressincroniza o fluxo de bytes em
//! frames, confirma cada frame com `'A'` e registra as leituras.
//!
//! Reconecta sozinho se a porta cair.

mod serial_thread;
mod warmup;

use serial_thread::{ReceiverEvent, spawn_serial_thread};
use std::path::PathBuf;
use std::process::ExitCode;
use telemetry_core::config::AppConfig;
use tracing::{error, info, warn};
use warmup::{SampleStatus, WarmupFilter};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = config_path_from_args().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

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

    let recv_cfg = config.receiver;
    let rx = match spawn_serial_thread(recv_cfg.clone()) {
        Ok(rx) => rx,
        Err(e) => {
            error!("Falha ao criar thread serial: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Aguardando frames em {} @ {} baud",
        recv_cfg.serial_port, recv_cfg.baud_rate
    );

    let mut filter = WarmupFilter::new();
    let mut received: u64 = 0;

    // ── Loop principal ──
    while let Ok(event) = rx.recv() {
        match event {
            ReceiverEvent::Connected { port } => info!("Link ativo em {port}"),
            ReceiverEvent::Sample(record) => {
                received += 1;
                let (shown, status) = filter.apply(record);
                let m = &shown.measurements;
                match status {
                    SampleStatus::WarmingUp => info!(
                        "← #{received} {} | P {:.0} Pa | T {:.1}°C | Alt {:.1} m | gás aquecendo",
                        shown.timestamp, m.pressure, m.temperature, m.altitude
                    ),
                    SampleStatus::Streaming => info!(
                        "← #{received} {} | P {:.0} Pa | T {:.1}°C | Alt {:.1} m | IAQ {:.2} | TVOC {:.2} | eCO₂ {:.0} | EtOH {:.2}",
                        shown.timestamp,
                        m.pressure,
                        m.temperature,
                        m.altitude,
                        m.iaq,
                        m.tvoc,
                        m.eco2,
                        m.etoh
                    ),
                }
            }
            ReceiverEvent::Disconnected { at } => warn!("Link desconectado em {at}"),
        }
    }

    error!("Thread serial encerrada");
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
