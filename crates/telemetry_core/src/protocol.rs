//! Protocolo de enquadramento e confirmação sobre a serial.
//!
//! Formato do frame:
//!
//! ```text
//! ┌──────────┬──────────────────────┬────────┐
//! │ 0xAA (1) │ SampleRecord (35 LE) │ 0x55(1)│
//! └──────────┴──────────────────────┴────────┘
//! ```
//!
//! - Os marcadores de início/fim permitem ao receptor ressincronizar depois
//!   de um frame corrompido, sem prefixo de tamanho.
//! - O registro é serializado com bincode (inteiros fixos, little-endian,
//!   sem padding), que reproduz exatamente o layout empacotado do firmware.
//! - O receptor confirma cada frame com um único byte `'A'`.

use crate::types::{RECORD_SIZE, SampleRecord};
use tracing::debug;

/// Marcador de início de frame.
pub const START_BYTE: u8 = 0xAA;

/// Marcador de fim de frame.
pub const END_BYTE: u8 = 0x55;

/// Byte de confirmação enviado pelo receptor.
pub const ACK_BYTE: u8 = b'A';

/// Tamanho total do frame (início + registro + fim).
pub const FRAME_SIZE: usize = RECORD_SIZE + 2;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame muito curto ({0} bytes, mínimo {FRAME_SIZE})")]
    TooShort(usize),

    #[error("Marcador de início inválido: 0x{0:02X} (esperado 0x{START_BYTE:02X})")]
    InvalidStart(u8),

    #[error("Marcador de fim inválido: 0x{0:02X} (esperado 0x{END_BYTE:02X})")]
    InvalidEnd(u8),

    #[error("Registro com tamanho inesperado: {0} bytes (esperado {RECORD_SIZE})")]
    SizeMismatch(usize),

    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Erro de deserialização: {0}")]
    Deserialize(String),
}

/// Serializa o registro no layout exato do fio.
pub fn encode_record(record: &SampleRecord) -> Result<[u8; RECORD_SIZE], ProtocolError> {
    let body = bincode::serialize(record).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    <[u8; RECORD_SIZE]>::try_from(body.as_slice())
        .map_err(|_| ProtocolError::SizeMismatch(body.len()))
}

/// Reconstrói um registro a partir dos seus bytes crus.
pub fn decode_record(bytes: &[u8]) -> Result<SampleRecord, ProtocolError> {
    if bytes.len() != RECORD_SIZE {
        return Err(ProtocolError::SizeMismatch(bytes.len()));
    }
    bincode::deserialize(bytes).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

/// Monta o frame completo de um registro.
///
/// Retorna bytes no formato: `[START][registro...][END]`
pub fn encode_frame(record: &SampleRecord) -> Result<Vec<u8>, ProtocolError> {
    let body = encode_record(record)?;

    let mut frame = Vec::with_capacity(FRAME_SIZE);
    frame.push(START_BYTE);
    frame.extend_from_slice(&body);
    frame.push(END_BYTE);

    Ok(frame)
}

/// Decodifica um frame completo (já alinhado no marcador de início).
pub fn decode_frame(data: &[u8]) -> Result<SampleRecord, ProtocolError> {
    if data.len() < FRAME_SIZE {
        return Err(ProtocolError::TooShort(data.len()));
    }

    let start = data[0];
    if start != START_BYTE {
        return Err(ProtocolError::InvalidStart(start));
    }

    let end = data[FRAME_SIZE - 1];
    if end != END_BYTE {
        return Err(ProtocolError::InvalidEnd(end));
    }

    decode_record(&data[1..FRAME_SIZE - 1])
}

// ──────────────────────────────────────────────
// Decodificador de fluxo (lado receptor)
// ──────────────────────────────────────────────

/// Extrai frames de um fluxo de bytes arbitrariamente fatiado.
///
/// Descarta bytes até encontrar `START_BYTE`; aceita a janela de
/// `FRAME_SIZE` bytes se o último for `END_BYTE`, senão desliza um byte e
/// tenta de novo.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    discarded: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acrescenta bytes recebidos ao buffer interno.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Retorna o próximo registro completo, se houver.
    pub fn next_record(&mut self) -> Option<SampleRecord> {
        while self.buf.len() >= FRAME_SIZE {
            if self.buf[0] != START_BYTE || self.buf[FRAME_SIZE - 1] != END_BYTE {
                self.skip(1);
                continue;
            }

            let decoded = decode_record(&self.buf[1..FRAME_SIZE - 1]);
            match decoded {
                Ok(record) => {
                    self.buf.drain(..FRAME_SIZE);
                    return Some(record);
                }
                Err(e) => {
                    debug!("Frame descartado: {e}");
                    self.skip(FRAME_SIZE);
                }
            }
        }
        None
    }

    /// Bytes descartados durante ressincronização desde a criação.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Bytes aguardando completar um frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Esvazia o buffer (usado ao reconectar a porta).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn skip(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
        self.discarded += n as u64;
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
