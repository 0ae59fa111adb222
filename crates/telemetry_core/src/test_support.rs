//! Colaboradores falsos usados pelos testes do crate.

use crate::acquisition::{Clock, SensorSuite};
use crate::controller::{Indicator, IndicatorLevel, ResetInput};
use crate::link::Transport;
use crate::protocol::{ACK_BYTE, decode_frame};
use crate::types::{Measurements, SampleRecord, Timestamp};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transporte em memória que responde (ou não) com ACK a cada envio.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub sent: Vec<Vec<u8>>,
    pub polls: usize,
    pub line_error_clears: usize,
    pub fail_sends: bool,
    /// Bytes que chegam antes da resposta a cada envio
    pub noise: Vec<u8>,
    /// Bytes jogados fora por `discard_input`
    pub discarded: usize,
    rx: VecDeque<u8>,
    ack_plan: VecDeque<bool>,
    default_ack: bool,
}

impl FakeTransport {
    pub fn acking() -> Self {
        Self {
            default_ack: true,
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    /// Resposta por envio; depois do roteiro, vale o padrão (sem ACK).
    pub fn scripted(plan: &[bool]) -> Self {
        Self {
            ack_plan: plan.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn set_default_ack(&mut self, ack: bool) {
        self.default_ack = ack;
    }

    /// Coloca bytes na fila de recepção agora (ex.: ACK atrasado).
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Registros decodificados de todos os frames enviados.
    pub fn records(&self) -> Vec<SampleRecord> {
        self.sent
            .iter()
            .map(|frame| decode_frame(frame).expect("frame válido"))
            .collect()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.fail_sends {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "porta fechada",
            ));
        }
        self.sent.push(bytes.to_vec());
        self.rx.extend(self.noise.iter().copied());
        if self.ack_plan.pop_front().unwrap_or(self.default_ack) {
            self.rx.push_back(ACK_BYTE);
        }
        Ok(())
    }

    fn try_recv_byte(&mut self) -> Option<u8> {
        self.polls += 1;
        self.rx.pop_front()
    }

    fn clear_line_errors(&mut self) {
        self.line_error_clears += 1;
    }

    fn discard_input(&mut self) {
        self.discarded += self.rx.len();
        self.rx.clear();
    }
}

/// Indicador que grava todo nível aplicado.
#[derive(Debug, Default)]
pub(crate) struct RecordingIndicator {
    pub history: Vec<IndicatorLevel>,
}

impl RecordingIndicator {
    pub fn last(&self) -> Option<IndicatorLevel> {
        self.history.last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn set_indicator(&mut self, level: IndicatorLevel) {
        self.history.push(level);
    }
}

/// Botão controlado pelo teste. Um roteiro opcional simula bounce.
#[derive(Debug, Default)]
pub(crate) struct FakeButton {
    pressed: Arc<AtomicBool>,
    script: VecDeque<bool>,
}

impl FakeButton {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let pressed = Arc::new(AtomicBool::new(false));
        (
            Self {
                pressed: Arc::clone(&pressed),
                script: VecDeque::new(),
            },
            pressed,
        )
    }

    pub fn scripted(readings: &[bool]) -> Self {
        Self {
            pressed: Arc::new(AtomicBool::new(false)),
            script: readings.iter().copied().collect(),
        }
    }
}

impl ResetInput for FakeButton {
    fn is_triggered(&mut self) -> bool {
        self.script
            .pop_front()
            .unwrap_or_else(|| self.pressed.load(Ordering::SeqCst))
    }
}

/// Relógio que avança um segundo por leitura.
#[derive(Debug, Default)]
pub(crate) struct TickingClock {
    pub seconds: u8,
}

impl Clock for TickingClock {
    fn now(&mut self) -> Timestamp {
        let ts = Timestamp::new(2025, 11, 28, 13, 0, self.seconds % 60);
        self.seconds = self.seconds.wrapping_add(1);
        ts
    }
}

/// Sensores com leituras constantes.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ConstantSensors {
    pub reading: Measurements,
}

impl SensorSuite for ConstantSensors {
    fn read_all(&mut self) -> Measurements {
        self.reading
    }
}

/// Registro identificado pelo campo `second`.
pub(crate) fn record(n: u8) -> SampleRecord {
    SampleRecord {
        timestamp: Timestamp::new(2025, 11, 28, 13, 0, n),
        ..Default::default()
    }
}
