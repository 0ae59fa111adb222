//! Canal de amostras ao vivo entre a aquisição e o controlador.
//!
//! Fila limitada SPSC sobre `crossbeam-channel`:
//! - o produtor nunca bloqueia; com a fila cheia, a amostra mais nova é
//!   descartada;
//! - o consumidor pode bloquear até chegar uma amostra, ou consultar sem
//!   bloquear.
//!
//! `crossbeam` não oferece `peek`, então o lado consumidor guarda um slot de
//! lookahead: `peek` move a próxima amostra para esse slot e as leituras
//! seguintes o esvaziam primeiro, preservando a ordem FIFO. O slot ocupado
//! conta contra a capacidade, então nunca há mais de `capacity` amostras
//! pendentes.

use crate::types::SampleRecord;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Capacidade padrão do canal (20 amostras).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 20;

/// A outra ponta do canal foi encerrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Canal de amostras fechado")]
pub struct ChannelClosed;

/// Cria o par produtor/consumidor com a capacidade dada (mínimo 1).
///
/// A capacidade é o total de amostras pendentes, somando a fila e o slot de
/// lookahead do consumidor.
pub fn sample_channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = bounded(capacity);
    let lookahead_full = Arc::new(AtomicBool::new(false));
    (
        SampleSender {
            tx,
            capacity,
            lookahead_full: Arc::clone(&lookahead_full),
        },
        SampleReceiver {
            rx,
            lookahead: None,
            lookahead_full,
        },
    )
}

/// Lado produtor (tarefa de aquisição).
#[derive(Debug)]
pub struct SampleSender {
    tx: Sender<SampleRecord>,
    capacity: usize,
    lookahead_full: Arc<AtomicBool>,
}

impl SampleSender {
    /// Enfileira sem bloquear. Retorna `false` se a amostra foi descartada.
    pub fn try_enqueue(&self, record: SampleRecord) -> bool {
        matches!(self.offer(record), Ok(true))
    }

    /// Como [`try_enqueue`](Self::try_enqueue), mas distingue fila cheia
    /// (`Ok(false)`) de consumidor encerrado.
    pub fn offer(&self, record: SampleRecord) -> Result<bool, ChannelClosed> {
        // O consumidor é o único outro dono do flag
        if Arc::strong_count(&self.lookahead_full) < 2 {
            return Err(ChannelClosed);
        }
        if self.len() >= self.capacity {
            return Ok(false);
        }
        match self.tx.try_send(record) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(ChannelClosed),
        }
    }

    /// Amostras pendentes (incluindo a que estiver no lookahead).
    pub fn len(&self) -> usize {
        self.tx.len() + usize::from(self.lookahead_full.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Lado consumidor (controlador de entrega).
#[derive(Debug)]
pub struct SampleReceiver {
    rx: Receiver<SampleRecord>,
    lookahead: Option<SampleRecord>,
    lookahead_full: Arc<AtomicBool>,
}

impl SampleReceiver {
    /// Bloqueia até haver uma amostra.
    ///
    /// Só retorna erro quando o produtor foi descartado e a fila esvaziou.
    pub fn dequeue_blocking(&mut self) -> Result<SampleRecord, ChannelClosed> {
        if let Some(record) = self.take_lookahead() {
            return Ok(record);
        }
        self.rx.recv().map_err(|_| ChannelClosed)
    }

    /// Retira a próxima amostra, se houver, sem bloquear.
    pub fn try_dequeue(&mut self) -> Option<SampleRecord> {
        self.take_lookahead().or_else(|| self.rx.try_recv().ok())
    }

    /// Cópia da próxima amostra sem retirá-la da fila.
    pub fn peek(&mut self) -> Option<SampleRecord> {
        if self.lookahead.is_none() {
            // Marca antes de retirar: o produtor nunca vê uma vaga a mais
            self.lookahead_full.store(true, Ordering::Release);
            self.lookahead = self.rx.try_recv().ok();
            if self.lookahead.is_none() {
                self.lookahead_full.store(false, Ordering::Release);
            }
        }
        self.lookahead
    }

    /// Amostras pendentes (incluindo a que estiver no lookahead).
    pub fn len(&self) -> usize {
        self.rx.len() + usize::from(self.lookahead.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_lookahead(&mut self) -> Option<SampleRecord> {
        let record = self.lookahead.take();
        if record.is_some() {
            self.lookahead_full.store(false, Ordering::Release);
        }
        record
    }
}
