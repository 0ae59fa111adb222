//! Tarefa de aquisição: relógio + sensores → canal de amostras.
//!
//! Roda em cadência fixa baseada em prazo (o próximo instante é calculado a
//! partir do anterior, não do fim do ciclo), para não acumular deriva.

use crate::channel::{ChannelClosed, SampleSender};
use crate::types::{Measurements, SampleRecord, Timestamp};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Relógio de tempo real.
pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

/// Leitura de todos os sensores de um ciclo.
///
/// Durante o aquecimento pode devolver valores sentinela
/// ([`NOT_READY`](crate::types::NOT_READY)); eles seguem sem filtro.
pub trait SensorSuite {
    fn read_all(&mut self) -> Measurements;
}

/// Produtor de amostras. Só toca no lado produtor do canal.
pub struct Acquisition<C, S> {
    clock: C,
    sensors: S,
    samples: SampleSender,
    produced: u64,
    dropped: u64,
}

impl<C: Clock, S: SensorSuite> Acquisition<C, S> {
    pub fn new(clock: C, sensors: S, samples: SampleSender) -> Self {
        Self {
            clock,
            sensors,
            samples,
            produced: 0,
            dropped: 0,
        }
    }

    /// Monta um registro com o horário atual e as leituras dos sensores.
    pub fn sample(&mut self) -> SampleRecord {
        let timestamp = self.clock.now();
        SampleRecord::new(timestamp, self.sensors.read_all())
    }

    /// Amostra uma vez e enfileira. `Ok(false)` se o canal descartou a
    /// amostra por estar cheio.
    pub fn acquire_once(&mut self) -> Result<bool, ChannelClosed> {
        let record = self.sample();
        self.produced += 1;

        let queued = self.samples.offer(record)?;
        if !queued {
            self.dropped += 1;
            debug!(
                "Canal cheio, amostra {} descartada ({} no total)",
                record.timestamp, self.dropped
            );
        }
        Ok(queued)
    }

    /// Laço com período fixo até o controlador soltar o canal.
    pub fn run(mut self, period: Duration) -> ChannelClosed {
        info!("Aquisição iniciada (período {:?})", period);
        let mut next_wake = Instant::now() + period;

        loop {
            let now = Instant::now();
            if next_wake > now {
                std::thread::sleep(next_wake - now);
            } else if now - next_wake > period {
                warn!("Aquisição atrasada {:?}, realinhando cadência", now - next_wake);
                next_wake = now;
            }

            if let Err(closed) = self.acquire_once() {
                info!(
                    "Aquisição encerrada após {} amostras ({} descartadas): {closed}",
                    self.produced, self.dropped
                );
                return closed;
            }
            next_wake += period;
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Inicia a aquisição numa thread dedicada.
pub fn spawn_acquisition_thread<C, S>(
    acquisition: Acquisition<C, S>,
    period: Duration,
) -> std::io::Result<JoinHandle<ChannelClosed>>
where
    C: Clock + Send + 'static,
    S: SensorSuite + Send + 'static,
{
    std::thread::Builder::new()
        .name("acquisition".into())
        .spawn(move || acquisition.run(period))
}
