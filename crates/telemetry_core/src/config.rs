//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, com seções `[node]`,
//! `[node.timings]` e `[receiver]`. Campos ausentes assumem o padrão.

use crate::controller::DeliveryTimings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros ao gravar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao serializar TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Prazos e pausas da máquina de entrega (milissegundos).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Espera de ACK da sonda em `Connecting`
    pub ack_probe_ms: u64,
    /// Espera de ACK de amostra ao vivo
    pub ack_live_ms: u64,
    /// Espera de ACK de registro do backlog
    pub ack_backlog_ms: u64,
    /// Unidade de consulta durante a espera de ACK
    pub ack_poll_ms: u64,
    pub connect_idle_ms: u64,
    /// Pausa após entrega ao vivo
    pub stream_pacing_ms: u64,
    pub buffering_retry_ms: u64,
    pub error_hold_ms: u64,
    pub debounce_ms: u64,
    pub reset_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ack_probe_ms: 100,
            ack_live_ms: 50,
            ack_backlog_ms: 100,
            ack_poll_ms: 1,
            connect_idle_ms: 100,
            stream_pacing_ms: 1000,
            buffering_retry_ms: 1000,
            error_hold_ms: 1000,
            debounce_ms: 50,
            reset_settle_ms: 200,
        }
    }
}

impl TimingConfig {
    /// Converte para as temporizações do controlador.
    ///
    /// Prazos de ACK viram número de consultas de `ack_poll_ms` cada.
    pub fn delivery_timings(&self) -> DeliveryTimings {
        let poll = self.ack_poll_ms.max(1);
        let polls = |ms: u64| u32::try_from(ms / poll).unwrap_or(u32::MAX);

        DeliveryTimings {
            ack_poll_interval: Duration::from_millis(poll),
            ack_probe_polls: polls(self.ack_probe_ms),
            ack_live_polls: polls(self.ack_live_ms),
            ack_backlog_polls: polls(self.ack_backlog_ms),
            connect_idle: Duration::from_millis(self.connect_idle_ms),
            stream_pacing: Duration::from_millis(self.stream_pacing_ms),
            buffering_retry: Duration::from_millis(self.buffering_retry_ms),
            error_hold: Duration::from_millis(self.error_hold_ms),
            debounce: Duration::from_millis(self.debounce_ms),
            reset_settle: Duration::from_millis(self.reset_settle_ms),
        }
    }
}

/// Configuração do nó de telemetria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Porta serial (ex: "/dev/ttyUSB0", "COM3")
    pub serial_port: String,
    pub baud_rate: u32,
    /// Período de amostragem
    pub sample_interval_ms: u64,
    /// Capacidade do canal de amostras ao vivo
    pub channel_capacity: usize,
    /// Capacidade do backlog
    pub backlog_capacity: usize,
    pub timings: TimingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
            sample_interval_ms: 1000,
            channel_capacity: crate::channel::DEFAULT_CHANNEL_CAPACITY,
            backlog_capacity: crate::backlog::DEFAULT_BACKLOG_CAPACITY,
            timings: TimingConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Configuração do receptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    /// Timeout interno de leitura da porta
    pub read_timeout_ms: u64,
    /// Espera entre tentativas de reconexão (segundos)
    pub reconnect_delay_secs: f64,
    /// Intervalo entre leituras quando não há bytes
    pub poll_interval_ms: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".into(),
            baud_rate: 9600,
            read_timeout_ms: 100,
            reconnect_delay_secs: 2.0,
            poll_interval_ms: 5,
        }
    }
}

/// Configuração raiz do aplicativo (unifica nó e receptor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub receiver: ReceiverConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let node = &self.node;
        let timings = &node.timings;

        if node.serial_port.is_empty() {
            errors.push("Porta serial do nó não pode ser vazia".into());
        }
        if node.baud_rate == 0 {
            errors.push("Baud rate do nó não pode ser 0".into());
        }
        if node.sample_interval_ms < 100 || node.sample_interval_ms > 60_000 {
            errors.push(format!(
                "Intervalo de amostragem inválido: {} ms (100–60000)",
                node.sample_interval_ms
            ));
        }
        if node.channel_capacity == 0 {
            errors.push("Capacidade do canal não pode ser 0".into());
        }
        if node.backlog_capacity == 0 {
            errors.push("Capacidade do backlog não pode ser 0".into());
        }
        if timings.ack_poll_ms == 0 {
            errors.push("ack_poll_ms não pode ser 0".into());
        }
        for (name, value) in [
            ("ack_probe_ms", timings.ack_probe_ms),
            ("ack_live_ms", timings.ack_live_ms),
            ("ack_backlog_ms", timings.ack_backlog_ms),
        ] {
            if value < timings.ack_poll_ms.max(1) {
                errors.push(format!(
                    "{name} ({value} ms) menor que ack_poll_ms ({} ms)",
                    timings.ack_poll_ms
                ));
            }
        }

        if self.receiver.serial_port.is_empty() {
            errors.push("Porta serial do receptor não pode ser vazia".into());
        }
        if self.receiver.baud_rate == 0 {
            errors.push("Baud rate do receptor não pode ser 0".into());
        }
        if self.receiver.reconnect_delay_secs < 0.1 || self.receiver.reconnect_delay_secs > 60.0 {
            errors.push(format!(
                "Intervalo de reconexão inválido: {} (0.1–60.0)",
                self.receiver.reconnect_delay_secs
            ));
        }

        errors
    }
}
