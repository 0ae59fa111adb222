//! Controlador de entrega confiável (store-and-forward).
//!
//! Máquina de estados que decide, a cada ciclo, entre transmitir ao vivo,
//! guardar no backlog ou retransmitir o backlog:
//!
//! - `Connecting`: link já saudável ou sonda confirmada → `Streaming`;
//!   sonda sem ACK → `Buffering`.
//! - `Streaming`: ACK perdido → amostra vai para o backlog, `Buffering`.
//! - `Buffering`: drena o canal no backlog (cheio → `Error`) e tenta o
//!   registro mais antigo; confirmado → `Retransmitting`.
//! - `Retransmitting`: drena o backlog até esvaziar (→ `Streaming`); ACK
//!   perdido → `Buffering`.
//! - `Error`: permanece até o reset manual.
//!
//! O botão de reset manual tem prioridade sobre tudo e força `Connecting`.
//! O backlog sobrevive ao reset.

use crate::backlog::BacklogBuffer;
use crate::channel::{ChannelClosed, SampleReceiver};
use crate::link::{DeliveryLink, Transport};
use crate::types::SampleRecord;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

// ──────────────────────────────────────────────
// Estados e colaboradores
// ──────────────────────────────────────────────

/// Estado ativo do controlador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    Connecting,
    Streaming,
    Buffering,
    Retransmitting,
    /// Backlog esgotado. Só sai via reset manual.
    Error,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryState::Connecting => "connecting",
            DeliveryState::Streaming => "streaming",
            DeliveryState::Buffering => "buffering",
            DeliveryState::Retransmitting => "retransmitting",
            DeliveryState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Níveis mutuamente exclusivos do LED de estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorLevel {
    Off,
    /// Conectando / transmitindo ao vivo
    Blue,
    /// Retransmitindo backlog
    Green,
    /// Buffering, falha de entrega ou erro
    Red,
}

/// Sinalização visual. Não realimenta a lógica de controle.
pub trait Indicator {
    fn set_indicator(&mut self, level: IndicatorLevel);
}

/// Entrada de reset manual (botão), consultada pelo controlador.
pub trait ResetInput {
    fn is_triggered(&mut self) -> bool;
}

// ──────────────────────────────────────────────
// Temporizações
// ──────────────────────────────────────────────

/// Prazos de ACK (em consultas ao transporte) e pausas fixas entre ciclos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTimings {
    /// Intervalo entre consultas durante a espera de ACK
    pub ack_poll_interval: Duration,
    /// Consultas para a sonda em `Connecting`
    pub ack_probe_polls: u32,
    /// Consultas para amostras ao vivo em `Streaming`
    pub ack_live_polls: u32,
    /// Consultas para registros do backlog
    pub ack_backlog_polls: u32,
    pub connect_idle: Duration,
    /// Pausa após cada entrega ao vivo bem-sucedida
    pub stream_pacing: Duration,
    pub buffering_retry: Duration,
    pub error_hold: Duration,
    /// Intervalo entre as duas leituras do botão
    pub debounce: Duration,
    pub reset_settle: Duration,
}

impl DeliveryTimings {
    /// Sem pausas; prazos curtos em número de consultas. Útil em testes e
    /// simulações.
    pub fn immediate() -> Self {
        Self {
            ack_poll_interval: Duration::ZERO,
            ack_probe_polls: 3,
            ack_live_polls: 3,
            ack_backlog_polls: 3,
            connect_idle: Duration::ZERO,
            stream_pacing: Duration::ZERO,
            buffering_retry: Duration::ZERO,
            error_hold: Duration::ZERO,
            debounce: Duration::ZERO,
            reset_settle: Duration::ZERO,
        }
    }
}

impl Default for DeliveryTimings {
    fn default() -> Self {
        Self {
            ack_poll_interval: Duration::from_millis(1),
            ack_probe_polls: 100,
            ack_live_polls: 50,
            ack_backlog_polls: 100,
            connect_idle: Duration::from_millis(100),
            stream_pacing: Duration::from_millis(1000),
            buffering_retry: Duration::from_millis(1000),
            error_hold: Duration::from_millis(1000),
            debounce: Duration::from_millis(50),
            reset_settle: Duration::from_millis(200),
        }
    }
}

// ──────────────────────────────────────────────
// Estatísticas e erros
// ──────────────────────────────────────────────

/// Contadores acumulados desde a criação do controlador.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Amostras entregues ao vivo em `Streaming`
    pub live_delivered: u64,
    /// Registros do backlog confirmados pelo receptor
    pub retransmitted: u64,
    /// Registros aceitos no backlog
    pub backlogged: u64,
    /// Registros perdidos por backlog cheio
    pub lost: u64,
    pub manual_resets: u64,
}

/// Condições que encerram o laço do controlador.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Tarefa de aquisição encerrada: {0}")]
    AcquisitionGone(#[from] ChannelClosed),
}

// ──────────────────────────────────────────────
// Controlador
// ──────────────────────────────────────────────

/// Dono único do backlog, do link e do lado consumidor do canal.
pub struct DeliveryController<T, I, R> {
    state: DeliveryState,
    link: DeliveryLink<T>,
    samples: SampleReceiver,
    backlog: BacklogBuffer,
    indicator: I,
    reset: R,
    timings: DeliveryTimings,
    blink_on: bool,
    stats: DeliveryStats,
}

impl<T: Transport, I: Indicator, R: ResetInput> DeliveryController<T, I, R> {
    /// Cria o controlador já em `Connecting` (bring-up concluído).
    pub fn new(
        link: DeliveryLink<T>,
        samples: SampleReceiver,
        backlog: BacklogBuffer,
        mut indicator: I,
        reset: R,
        timings: DeliveryTimings,
    ) -> Self {
        indicator.set_indicator(IndicatorLevel::Blue);
        Self {
            state: DeliveryState::Connecting,
            link,
            samples,
            backlog,
            indicator,
            reset,
            timings,
            blink_on: false,
            stats: DeliveryStats::default(),
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn backlog(&self) -> &BacklogBuffer {
        &self.backlog
    }

    pub fn link(&self) -> &DeliveryLink<T> {
        &self.link
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// Executa ciclos indefinidamente.
    ///
    /// Só retorna se a aquisição for encerrada; nenhum resultado de protocolo
    /// interrompe o laço.
    pub fn run(mut self) -> ControllerError {
        info!("Controlador de entrega iniciado em {}", self.state);
        loop {
            if let Err(e) = self.step() {
                return e;
            }
        }
    }

    /// Executa um ciclo da máquina de estados e retorna o novo estado.
    pub fn step(&mut self) -> Result<DeliveryState, ControllerError> {
        if self.reset_confirmed() {
            self.manual_reset();
        }

        let next = match self.state {
            DeliveryState::Connecting => self.connecting(),
            DeliveryState::Streaming => self.streaming()?,
            DeliveryState::Buffering => self.buffering(),
            DeliveryState::Retransmitting => self.retransmitting(),
            DeliveryState::Error => self.holding_error(),
        };

        self.transition(next);
        Ok(self.state)
    }

    // ── Estados ──

    fn connecting(&mut self) -> DeliveryState {
        self.indicator.set_indicator(IndicatorLevel::Blue);

        if self.link.is_link_healthy() {
            return DeliveryState::Streaming;
        }

        // Sonda com peek: a amostra continua no canal para o Streaming
        let mut next = DeliveryState::Connecting;
        if let Some(probe) = self.samples.peek() {
            next = if self.deliver(&probe, self.timings.ack_probe_polls) {
                DeliveryState::Streaming
            } else {
                DeliveryState::Buffering
            };
        }

        pause(self.timings.connect_idle);
        next
    }

    fn streaming(&mut self) -> Result<DeliveryState, ChannelClosed> {
        let record = self.samples.dequeue_blocking()?;

        if self.deliver(&record, self.timings.ack_live_polls) {
            self.stats.live_delivered += 1;
            self.toggle(IndicatorLevel::Blue);
            pause(self.timings.stream_pacing);
            return Ok(DeliveryState::Streaming);
        }

        self.indicator.set_indicator(IndicatorLevel::Red);
        warn!("ACK não recebido para amostra {}, guardando no backlog", record.timestamp);
        self.store(record);
        Ok(DeliveryState::Buffering)
    }

    fn buffering(&mut self) -> DeliveryState {
        self.indicator.set_indicator(IndicatorLevel::Red);

        // Esvazia o canal inteiro antes de disputar o link com o backlog
        while let Some(record) = self.samples.try_dequeue() {
            if !self.store(record) {
                return DeliveryState::Error;
            }
        }

        if let Some(oldest) = self.backlog.read_oldest() {
            if self.deliver(&oldest, self.timings.ack_backlog_polls) {
                self.backlog.mark_oldest_sent();
                self.stats.retransmitted += 1;
                return DeliveryState::Retransmitting;
            }
        }

        pause(self.timings.buffering_retry);
        DeliveryState::Buffering
    }

    fn retransmitting(&mut self) -> DeliveryState {
        self.toggle(IndicatorLevel::Green);

        let Some(oldest) = self.backlog.read_oldest() else {
            info!("Backlog drenado ({} retransmitidos)", self.stats.retransmitted);
            return DeliveryState::Streaming;
        };

        if self.deliver(&oldest, self.timings.ack_backlog_polls) {
            self.backlog.mark_oldest_sent();
            self.stats.retransmitted += 1;
            DeliveryState::Retransmitting
        } else {
            DeliveryState::Buffering
        }
    }

    fn holding_error(&mut self) -> DeliveryState {
        self.indicator.set_indicator(IndicatorLevel::Red);
        pause(self.timings.error_hold);
        DeliveryState::Error
    }

    // ── Auxiliares ──

    /// Envia o frame e espera o ACK. Falha de envio conta como ACK perdido.
    fn deliver(&mut self, record: &SampleRecord, polls: u32) -> bool {
        if let Err(e) = self.link.send_framed(record) {
            warn!("Falha ao enviar frame: {e}");
            self.link.mark_unhealthy();
            return false;
        }
        self.link.wait_ack(polls)
    }

    /// Guarda no backlog; registra a perda se estiver cheio.
    fn store(&mut self, record: SampleRecord) -> bool {
        if self.backlog.save(record) {
            self.stats.backlogged += 1;
            debug!(
                "Amostra {} no backlog ({}/{})",
                record.timestamp,
                self.backlog.len(),
                self.backlog.capacity()
            );
            true
        } else {
            self.stats.lost += 1;
            warn!(
                "Backlog cheio ({} registros), amostra {} perdida",
                self.backlog.capacity(),
                record.timestamp
            );
            false
        }
    }

    fn reset_confirmed(&mut self) -> bool {
        if !self.reset.is_triggered() {
            return false;
        }
        pause(self.timings.debounce);
        self.reset.is_triggered()
    }

    fn manual_reset(&mut self) {
        info!(
            "Reset manual em {} (backlog com {} registros preservado)",
            self.state,
            self.backlog.len()
        );
        self.stats.manual_resets += 1;
        self.indicator.set_indicator(IndicatorLevel::Off);
        self.blink_on = false;
        pause(self.timings.reset_settle);
        self.transition(DeliveryState::Connecting);
    }

    fn toggle(&mut self, level: IndicatorLevel) {
        self.blink_on = !self.blink_on;
        let applied = if self.blink_on {
            level
        } else {
            IndicatorLevel::Off
        };
        self.indicator.set_indicator(applied);
    }

    fn transition(&mut self, next: DeliveryState) {
        if next == self.state {
            return;
        }
        info!(
            "Estado {} → {} | backlog {}/{} | ao vivo {} | retransmitidos {} | perdidos {}",
            self.state,
            next,
            self.backlog.len(),
            self.backlog.capacity(),
            self.stats.live_delivered,
            self.stats.retransmitted,
            self.stats.lost
        );
        self.state = next;
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{SampleSender, sample_channel};
    use crate::test_support::{FakeButton, FakeTransport, RecordingIndicator, record};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    type TestController = DeliveryController<FakeTransport, RecordingIndicator, FakeButton>;

    struct Harness {
        ctrl: TestController,
        tx: SampleSender,
        button: Arc<AtomicBool>,
    }

    fn harness(transport: FakeTransport, backlog_capacity: usize) -> Harness {
        let (tx, rx) = sample_channel(20);
        let (reset, button) = FakeButton::new();
        let ctrl = DeliveryController::new(
            DeliveryLink::new(transport, Duration::ZERO),
            rx,
            BacklogBuffer::new(backlog_capacity),
            RecordingIndicator::default(),
            reset,
            DeliveryTimings::immediate(),
        );
        Harness { ctrl, tx, button }
    }

    /// Leva o controlador a `Buffering` com uma sonda que não recebe ACK.
    fn into_buffering(h: &mut Harness) {
        h.tx.try_enqueue(record(0));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
    }

    fn drain_backlog(backlog: &BacklogBuffer) -> Vec<u8> {
        let mut copy = backlog.clone();
        let mut out = Vec::new();
        while let Some(r) = copy.read_oldest() {
            out.push(r.timestamp.second);
            copy.mark_oldest_sent();
        }
        out
    }

    #[test]
    fn starts_connecting_with_blue_indicator() {
        let h = harness(FakeTransport::acking(), 4);
        assert_eq!(h.ctrl.state(), DeliveryState::Connecting);
        assert_eq!(h.ctrl.indicator().last(), Some(IndicatorLevel::Blue));
    }

    #[test]
    fn connecting_idles_while_channel_empty() {
        let mut h = harness(FakeTransport::acking(), 4);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Connecting);
        assert!(h.ctrl.link().transport().sent.is_empty());
    }

    #[test]
    fn healthy_link_reaches_streaming_and_toggles_indicator() {
        let mut h = harness(FakeTransport::acking(), 4);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Connecting);

        h.tx.try_enqueue(record(1));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);
        assert_eq!(h.ctrl.backlog().len(), 0);

        let mut levels = Vec::new();
        for n in 2..6 {
            h.tx.try_enqueue(record(n));
            assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);
            levels.push(h.ctrl.indicator().last().unwrap());
        }
        // A sonda usa peek: o primeiro ciclo de streaming reenvia a amostra 1
        assert_eq!(
            levels,
            vec![
                IndicatorLevel::Blue,
                IndicatorLevel::Off,
                IndicatorLevel::Blue,
                IndicatorLevel::Off
            ]
        );

        let seconds: Vec<u8> = h
            .ctrl
            .link()
            .transport()
            .records()
            .iter()
            .map(|r| r.timestamp.second)
            .collect();
        assert_eq!(seconds, vec![1, 1, 2, 3, 4]);
        assert_eq!(h.ctrl.stats().live_delivered, 4);
    }

    #[test]
    fn probe_failure_leaves_sample_in_channel() {
        let mut h = harness(FakeTransport::silent(), 4);
        into_buffering(&mut h);
        assert!(h.ctrl.backlog().is_empty());

        // O ciclo de buffering drena a amostra sondada
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(drain_backlog(h.ctrl.backlog()), vec![0]);
    }

    #[test]
    fn streaming_failure_saves_in_flight_sample() {
        // sonda ok, depois silêncio
        let mut h = harness(FakeTransport::scripted(&[true]), 4);
        h.tx.try_enqueue(record(1));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(h.ctrl.backlog().read_oldest(), Some(record(1)));
        assert_eq!(h.ctrl.backlog().len(), 1);
        assert_eq!(h.ctrl.stats().backlogged, 1);
        assert_eq!(h.ctrl.indicator().last(), Some(IndicatorLevel::Red));
        assert!(!h.ctrl.link().is_link_healthy());
    }

    #[test]
    fn streaming_send_error_counts_as_failed_delivery() {
        let mut h = harness(FakeTransport::acking(), 4);
        h.tx.try_enqueue(record(1));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);

        h.ctrl.link.transport_mut().fail_sends = true;
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(h.ctrl.backlog().read_oldest(), Some(record(1)));
        assert!(!h.ctrl.link().is_link_healthy());
    }

    #[test]
    fn buffering_drains_channel_after_existing_backlog() {
        let mut h = harness(FakeTransport::silent(), 10);
        into_buffering(&mut h);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);

        for n in 1..4 {
            h.tx.try_enqueue(record(n));
        }
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert!(h.tx.is_empty());
        assert_eq!(drain_backlog(h.ctrl.backlog()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn buffering_retransmits_oldest_and_moves_on() {
        // sonda falha, depois tudo confirmado
        let mut h = harness(FakeTransport::scripted(&[false]), 4);
        into_buffering(&mut h);
        h.ctrl.link.transport_mut().set_default_ack(true);

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert!(h.ctrl.backlog().is_empty());
        assert_eq!(h.ctrl.stats().retransmitted, 1);

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);
    }

    #[test]
    fn late_ack_does_not_release_backlog_record() {
        let mut h = harness(FakeTransport::silent(), 4);
        into_buffering(&mut h);

        // 'A' atrasado da sonda, já fora do prazo
        h.ctrl.link.transport_mut().inject(&[crate::protocol::ACK_BYTE]);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(drain_backlog(h.ctrl.backlog()), vec![0]);
        assert_eq!(h.ctrl.stats().retransmitted, 0);
    }

    #[test]
    fn retransmitting_drains_backlog_in_order() {
        let mut h = harness(FakeTransport::scripted(&[false]), 10);
        into_buffering(&mut h);
        for n in 1..4 {
            h.tx.try_enqueue(record(n));
        }
        h.ctrl.link.transport_mut().set_default_ack(true);

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);

        let sent: Vec<u8> = h
            .ctrl
            .link()
            .transport()
            .records()
            .iter()
            .map(|r| r.timestamp.second)
            .collect();
        // sonda que falhou + backlog em ordem de chegada
        assert_eq!(sent, vec![0, 0, 1, 2, 3]);
        assert_eq!(h.ctrl.stats().retransmitted, 4);
    }

    #[test]
    fn retransmit_failure_returns_to_buffering() {
        let mut h = harness(FakeTransport::scripted(&[false, true, false]), 10);
        into_buffering(&mut h);
        h.tx.try_enqueue(record(1));

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Retransmitting);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(drain_backlog(h.ctrl.backlog()), vec![1]);
    }

    #[test]
    fn backlog_exhaustion_enters_error_until_manual_reset() {
        let mut h = harness(FakeTransport::silent(), 3);
        into_buffering(&mut h);
        h.tx.try_enqueue(record(1));
        h.tx.try_enqueue(record(2));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Buffering);
        assert!(h.ctrl.backlog().is_full());

        h.tx.try_enqueue(record(3));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Error);
        assert_eq!(h.ctrl.stats().lost, 1);

        for _ in 0..3 {
            assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Error);
            assert_eq!(h.ctrl.indicator().last(), Some(IndicatorLevel::Red));
        }

        h.button.store(true, Ordering::SeqCst);
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Connecting);
        h.button.store(false, Ordering::SeqCst);

        assert_eq!(h.ctrl.stats().manual_resets, 1);
        // Reset não apaga o backlog
        assert_eq!(drain_backlog(h.ctrl.backlog()), vec![0, 1, 2]);
    }

    #[test]
    fn error_stops_draining_at_first_rejection() {
        let mut h = harness(FakeTransport::silent(), 1);
        into_buffering(&mut h);
        h.tx.try_enqueue(record(1));
        h.tx.try_enqueue(record(2));

        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Error);
        assert_eq!(h.ctrl.stats().lost, 1);
        // A amostra 2 ficou no canal, sujeita ao descarte por fila cheia
        assert_eq!(h.tx.len(), 1);
    }

    #[test]
    fn manual_reset_overrides_any_state() {
        let mut h = harness(FakeTransport::acking(), 4);
        h.tx.try_enqueue(record(1));
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);

        h.button.store(true, Ordering::SeqCst);
        // Link saudável: Connecting segue direto para Streaming no mesmo ciclo
        assert_eq!(h.ctrl.step().unwrap(), DeliveryState::Streaming);
        assert!(h.ctrl.indicator().history.contains(&IndicatorLevel::Off));
        assert_eq!(h.ctrl.stats().manual_resets, 1);
    }

    #[test]
    fn bouncing_button_is_ignored() {
        let (tx, rx) = sample_channel(4);
        let mut ctrl = DeliveryController::new(
            DeliveryLink::new(FakeTransport::silent(), Duration::ZERO),
            rx,
            BacklogBuffer::new(4),
            RecordingIndicator::default(),
            FakeButton::scripted(&[true, false]),
            DeliveryTimings::immediate(),
        );
        tx.try_enqueue(record(0));
        assert_eq!(ctrl.step().unwrap(), DeliveryState::Buffering);
        assert_eq!(ctrl.stats().manual_resets, 0);
    }

    #[test]
    fn run_returns_when_acquisition_hangs_up() {
        let h = harness(FakeTransport::acking(), 4);
        let Harness { mut ctrl, tx, .. } = h;
        tx.try_enqueue(record(1));
        assert_eq!(ctrl.step().unwrap(), DeliveryState::Streaming);
        drop(tx);

        assert!(matches!(ctrl.run(), ControllerError::AcquisitionGone(_)));
    }
}
