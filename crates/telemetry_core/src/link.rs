//! Camada de entrega: envio enquadrado + espera de ACK com prazo.
//!
//! Construída sobre um [`Transport`] que só sabe enviar bytes, consultar um
//! byte recebido sem bloquear e limpar erros de linha. A espera de ACK é um
//! laço de consulta com prazo: sem crédito parcial e sem fila de ACKs
//! atrasados. Um `'A'` que chegue depois do prazo é descartado antes do
//! próximo frame, para não confirmar o registro errado.

use crate::protocol::{ACK_BYTE, ProtocolError, encode_frame};
use crate::types::SampleRecord;
use std::time::Duration;
use tracing::debug;

/// Erros do envio de frames.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Erro de protocolo: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Erro de transporte: {0}")]
    Transport(#[from] std::io::Error),
}

/// Colaborador de transporte (UART, porta serial, fake de teste…).
pub trait Transport {
    /// Envia todos os bytes, bloqueando até o fim.
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Consulta um byte recebido, sem bloquear.
    fn try_recv_byte(&mut self) -> Option<u8>;

    /// Descarta indicações de erro de linha (overrun, framing, paridade).
    fn clear_line_errors(&mut self);

    /// Joga fora todo byte já recebido e ainda não lido.
    fn discard_input(&mut self);
}

/// Protocolo de entrega sobre um transporte.
///
/// Só o controlador possui um `DeliveryLink`, o que garante que nenhum
/// outro remetente intercala bytes no meio de um frame.
#[derive(Debug)]
pub struct DeliveryLink<T> {
    transport: T,
    poll_interval: Duration,
    link_healthy: bool,
}

impl<T: Transport> DeliveryLink<T> {
    /// `poll_interval` é a unidade de tempo de [`wait_ack`](Self::wait_ack).
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
            link_healthy: false,
        }
    }

    /// Envia `[START][registro][END]` numa única escrita.
    ///
    /// A recepção é esvaziada antes: só um ACK chegado depois deste envio
    /// confirma este frame.
    pub fn send_framed(&mut self, record: &SampleRecord) -> Result<(), LinkError> {
        let frame = encode_frame(record)?;
        self.transport.discard_input();
        self.transport.send(&frame)?;
        Ok(())
    }

    /// Espera o byte de ACK por até `polls` unidades de tempo.
    ///
    /// Cada consulta limpa primeiro os erros de linha e depois olha um byte.
    /// Atualiza o estado de saúde do link com o resultado.
    pub fn wait_ack(&mut self, polls: u32) -> bool {
        for _ in 0..polls {
            self.transport.clear_line_errors();

            if let Some(byte) = self.transport.try_recv_byte() {
                if byte == ACK_BYTE {
                    self.link_healthy = true;
                    return true;
                }
                debug!("Byte ignorado aguardando ACK: 0x{byte:02X}");
            }

            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }

        self.link_healthy = false;
        false
    }

    /// Resultado da última espera de ACK.
    pub fn is_link_healthy(&self) -> bool {
        self.link_healthy
    }

    /// Usado quando o envio falhou antes mesmo de esperar o ACK.
    pub(crate) fn mark_unhealthy(&mut self) {
        self.link_healthy = false;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
