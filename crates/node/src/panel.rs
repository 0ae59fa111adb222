//! Painel do nó sem hardware: LED via log e botão de reset via console.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use telemetry_core::controller::{Indicator, IndicatorLevel, ResetInput};
use tracing::{debug, info};

/// Leituras "pressionado" geradas por Enter: as duas do debounce.
const READS_PER_PRESS: u8 = 2;

/// LED de estado reportado no log (só nas mudanças).
#[derive(Debug, Default)]
pub struct LogIndicator {
    current: Option<IndicatorLevel>,
}

impl Indicator for LogIndicator {
    fn set_indicator(&mut self, level: IndicatorLevel) {
        if self.current != Some(level) {
            debug!("LED: {:?}", level);
            self.current = Some(level);
        }
    }
}

/// Botão de reset acionado por Enter na entrada padrão.
///
/// O toque fica travado até o controlador consultá-lo, então não se perde
/// enquanto o laço está bloqueado esperando amostra ou em pausa.
#[derive(Debug, Clone, Default)]
pub struct ConsoleButton {
    pending_reads: Arc<AtomicU8>,
}

impl ConsoleButton {
    /// Inicia a thread que lê o console.
    pub fn spawn() -> std::io::Result<Self> {
        let button = Self::default();
        let handle = button.clone();

        std::thread::Builder::new()
            .name("reset-button".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    if line.is_err() {
                        break;
                    }
                    info!("Botão de reset pressionado");
                    handle.press();
                }
                debug!("Console fechado, botão de reset desativado");
            })?;

        Ok(button)
    }

    fn press(&self) {
        self.pending_reads.store(READS_PER_PRESS, Ordering::SeqCst);
    }
}

impl ResetInput for ConsoleButton {
    fn is_triggered(&mut self) -> bool {
        self.pending_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
