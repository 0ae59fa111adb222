//! Backlog circular de registros não entregues.
//!
//! Armazenamento de capacidade fixa, pré-alocado, com cursor de escrita,
//! cursor de leitura e flag `full` para distinguir vazio (cursores iguais)
//! de cheio (cursores iguais depois de dar a volta).
//!
//! Diferente de um ring buffer de histórico, aqui **nunca** se sobrescreve o
//! registro mais antigo: inserir com o buffer cheio é rejeitado e o chamador
//! precisa tratar a rejeição.

use crate::types::SampleRecord;

/// Capacidade padrão (100 registros ≈ 100 s a 1 Hz).
pub const DEFAULT_BACKLOG_CAPACITY: usize = 100;

/// Buffer FIFO de registros que falharam na entrega ao vivo.
///
/// Pertence exclusivamente ao controlador; não há travas internas.
#[derive(Debug, Clone)]
pub struct BacklogBuffer {
    slots: Box<[SampleRecord]>,
    write: usize,
    read: usize,
    full: bool,
}

impl BacklogBuffer {
    /// Cria um backlog vazio. Capacidade zero é promovida para 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SampleRecord::default(); capacity.max(1)].into_boxed_slice(),
            write: 0,
            read: 0,
            full: false,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BACKLOG_CAPACITY)
    }

    /// Acrescenta um registro no cursor de escrita.
    ///
    /// Retorna `false`, sem alterar nada, se o buffer já estiver cheio.
    pub fn save(&mut self, record: SampleRecord) -> bool {
        if self.full {
            return false;
        }
        self.slots[self.write] = record;
        self.write = (self.write + 1) % self.capacity();
        if self.write == self.read {
            self.full = true;
        }
        true
    }

    /// Cópia do registro mais antigo, sem removê-lo.
    pub fn read_oldest(&self) -> Option<SampleRecord> {
        if self.is_empty() {
            None
        } else {
            Some(self.slots[self.read])
        }
    }

    /// Descarta o registro mais antigo após entrega confirmada.
    pub fn mark_oldest_sent(&mut self) {
        if self.is_empty() {
            return;
        }
        self.read = (self.read + 1) % self.capacity();
        self.full = false;
    }

    pub fn is_empty(&self) -> bool {
        self.write == self.read && !self.full
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Número de registros pendentes.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            (self.write + self.capacity() - self.read) % self.capacity()
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for BacklogBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
