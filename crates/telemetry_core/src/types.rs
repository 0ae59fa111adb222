//! Definição do registro de amostra transmitido pelo nó.
//!
//! O registro é um valor `Copy` de tamanho fixo: carimbo de tempo do RTC
//! seguido das medições dos sensores de pressão (ICP10101) e de qualidade
//! do ar (ZMOD4410). A ordem dos campos é a ordem no fio.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Valor reportado pelo sensor de gás enquanto ainda está aquecendo.
///
/// O controlador repassa esse valor sem filtrar; quem decide o que fazer
/// com ele é o receptor.
pub const NOT_READY: f32 = -1.0;

/// Tamanho exato do registro serializado (2 + 5 + 7 × 4 bytes).
pub const RECORD_SIZE: usize = 35;

// ──────────────────────────────────────────────
// Carimbo de tempo
// ──────────────────────────────────────────────

/// Data e hora lidas do RTC no momento da amostragem.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// ──────────────────────────────────────────────
// Medições
// ──────────────────────────────────────────────

/// Conjunto fixo de medições de um ciclo de amostragem.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurements {
    /// Pressão atmosférica (Pa)
    pub pressure: f32,
    /// Temperatura (°C)
    pub temperature: f32,
    /// Altitude estimada (m)
    pub altitude: f32,
    /// Índice de qualidade do ar
    pub iaq: f32,
    /// Compostos orgânicos voláteis totais (mg/m³)
    pub tvoc: f32,
    /// CO₂ equivalente (ppm)
    pub eco2: f32,
    /// Etanol (ppm)
    pub etoh: f32,
}

impl Measurements {
    /// `true` quando o sensor de gás já terminou o aquecimento.
    pub fn gas_ready(&self) -> bool {
        self.iaq >= 0.0
    }

    /// Padrões de bits dos campos, na ordem do fio.
    pub fn to_bits(&self) -> [u32; 7] {
        [
            self.pressure.to_bits(),
            self.temperature.to_bits(),
            self.altitude.to_bits(),
            self.iaq.to_bits(),
            self.tvoc.to_bits(),
            self.eco2.to_bits(),
            self.etoh.to_bits(),
        ]
    }
}

// ──────────────────────────────────────────────
// Registro completo
// ──────────────────────────────────────────────

/// Unidade de dado que atravessa o sistema: canal, backlog e protocolo.
///
/// Nunca é modificado depois de criado; todos os consumidores recebem cópias.
/// A igualdade compara bytes: `NaN` é igual a si mesmo e `-0.0` difere de
/// `0.0`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: Timestamp,
    pub measurements: Measurements,
}

impl SampleRecord {
    pub fn new(timestamp: Timestamp, measurements: Measurements) -> Self {
        Self {
            timestamp,
            measurements,
        }
    }
}

impl PartialEq for SampleRecord {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.measurements.to_bits() == other.measurements.to_bits()
    }
}

impl Eq for SampleRecord {}
