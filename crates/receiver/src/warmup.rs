//! Tratamento do aquecimento do sensor de gás no lado receptor.
//!
//! O nó repassa os valores sentinela (negativos) sem filtrar. Aqui:
//! - antes da primeira leitura válida, a amostra é marcada `WarmingUp`;
//! - depois dela, leituras negativas são substituídas pelos últimos
//!   valores válidos e a amostra segue como `Streaming`.

use telemetry_core::types::{Measurements, SampleRecord};

/// Situação da amostra apresentada ao usuário.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Streaming,
    WarmingUp,
}

/// Últimos valores válidos do sensor de gás.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GasReading {
    iaq: f32,
    tvoc: f32,
    eco2: f32,
    etoh: f32,
}

impl GasReading {
    fn from_measurements(m: &Measurements) -> Self {
        Self {
            iaq: m.iaq,
            tvoc: m.tvoc,
            eco2: m.eco2,
            etoh: m.etoh,
        }
    }

    fn apply_to(&self, m: &mut Measurements) {
        m.iaq = self.iaq;
        m.tvoc = self.tvoc;
        m.eco2 = self.eco2;
        m.etoh = self.etoh;
    }
}

/// Filtro com memória da última leitura válida.
#[derive(Debug, Default)]
pub struct WarmupFilter {
    last_valid: Option<GasReading>,
}

impl WarmupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna o registro a exibir e sua situação.
    pub fn apply(&mut self, mut record: SampleRecord) -> (SampleRecord, SampleStatus) {
        if record.measurements.gas_ready() {
            self.last_valid = Some(GasReading::from_measurements(&record.measurements));
            return (record, SampleStatus::Streaming);
        }

        match self.last_valid {
            Some(last) => {
                last.apply_to(&mut record.measurements);
                (record, SampleStatus::Streaming)
            }
            None => (record, SampleStatus::WarmingUp),
        }
    }
}
