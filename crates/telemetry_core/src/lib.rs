//! # Telemetry Core
//!
//! Crate compartilhada do nó de telemetria com entrega store-and-forward
//! sobre link serial.
//!
//! ## Módulos
//! - [`types`] – Registro de amostra (carimbo de tempo + medições)
//! - [`protocol`] – Enquadramento `0xAA … 0x55`, ACK `'A'` e decodificador de fluxo
//! - [`backlog`] – Buffer circular de registros não entregues
//! - [`channel`] – Canal limitado de amostras ao vivo (descarta no cheio)
//! - [`link`] – Envio enquadrado e espera de ACK com prazo
//! - [`controller`] – Máquina de estados de entrega confiável
//! - [`acquisition`] – Tarefa de amostragem periódica
//! - [`config`] – Configuração unificada via TOML

pub mod acquisition;
pub mod backlog;
pub mod channel;
pub mod config;
pub mod controller;
pub mod link;
pub mod protocol;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports convenientes
pub use backlog::BacklogBuffer;
pub use channel::{SampleReceiver, SampleSender, sample_channel};
pub use config::{AppConfig, NodeConfig, ReceiverConfig};
pub use controller::{DeliveryController, DeliveryState, DeliveryTimings};
pub use link::{DeliveryLink, Transport};
pub use protocol::{FrameDecoder, decode_frame, encode_frame};
pub use types::SampleRecord;
