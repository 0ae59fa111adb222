//! Transporte serial sobre `serialport`.
//!
//! Implementa o contrato de [`Transport`]: escrita bloqueante de todos os
//! bytes, consulta de um byte sem bloquear, limpeza de erros de linha e
//! descarte da recepção pendente antes de cada frame.

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use telemetry_core::Transport;
use tracing::{debug, info};

/// Porta serial 8N1 usada pelo nó.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    /// Erro de leitura pendente, tratado como ruído de linha
    line_fault: bool,
    line_faults: u64,
}

impl SerialTransport {
    /// Abre a porta e descarta lixo pendente na recepção.
    pub fn open(path: &str, baud_rate: u32) -> serialport::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(1))
            .open()?;
        port.clear(ClearBuffer::Input)?;

        info!("Porta {path} aberta a {baud_rate} baud (8N1)");
        Ok(Self {
            port,
            line_fault: false,
            line_faults: 0,
        })
    }

    fn note_fault(&mut self, e: impl std::fmt::Display) {
        debug!("Erro de leitura na serial: {e}");
        self.line_fault = true;
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn try_recv_byte(&mut self) -> Option<u8> {
        match self.port.bytes_to_read() {
            Ok(0) => None,
            Ok(_) => {
                let mut byte = [0u8; 1];
                match self.port.read(&mut byte) {
                    Ok(1) => Some(byte[0]),
                    Ok(_) => None,
                    Err(e) => {
                        self.note_fault(e);
                        None
                    }
                }
            }
            Err(e) => {
                self.note_fault(e);
                None
            }
        }
    }

    fn clear_line_errors(&mut self) {
        if !self.line_fault {
            return;
        }
        self.line_fault = false;
        self.line_faults += 1;
        debug!("Limpando erro de linha ({} desde a abertura)", self.line_faults);
        if let Err(e) = self.port.clear(ClearBuffer::Input) {
            debug!("Falha ao limpar buffer de recepção: {e}");
        }
    }

    fn discard_input(&mut self) {
        match self.port.bytes_to_read() {
            Ok(0) => {}
            Ok(n) => {
                debug!("Descartando {n} bytes pendentes (ACK atrasado ou ruído)");
                if let Err(e) = self.port.clear(ClearBuffer::Input) {
                    debug!("Falha ao limpar buffer de recepção: {e}");
                }
            }
            Err(e) => self.note_fault(e),
        }
    }
}
