//! Thread serial que decodifica frames, confirma com ACK e repassa os
//! registros para a thread principal via channel.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serialport::ClearBuffer;
use std::io::{Read, Write};
use std::time::Duration;
use telemetry_core::config::ReceiverConfig;
use telemetry_core::protocol::{ACK_BYTE, FrameDecoder};
use telemetry_core::types::SampleRecord;
use tracing::{debug, error, info, warn};

/// Mensagem enviada da thread serial para a thread principal.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    Connected { port: String },
    Sample(SampleRecord),
    Disconnected { at: String },
}

/// Inicia a thread serial. Retorna o receiver do channel.
pub fn spawn_serial_thread(config: ReceiverConfig) -> std::io::Result<Receiver<ReceiverEvent>> {
    let (tx, rx) = bounded::<ReceiverEvent>(64); // Buffer de 64 mensagens

    std::thread::Builder::new()
        .name("serial-receiver".into())
        .spawn(move || {
            receiver_loop(&tx, &config);
        })?;

    Ok(rx)
}

fn receiver_loop(tx: &Sender<ReceiverEvent>, config: &ReceiverConfig) {
    let reconnect_delay = Duration::from_secs_f64(config.reconnect_delay_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut decoder = FrameDecoder::new();

    loop {
        match serialport::new(&config.serial_port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
        {
            Ok(mut port) => {
                if let Err(e) = port.clear(ClearBuffer::Input) {
                    debug!("Falha ao limpar buffer de entrada: {e}");
                }
                decoder.reset();
                info!("Receptor conectado em {}", config.serial_port);
                forward(
                    tx,
                    ReceiverEvent::Connected {
                        port: config.serial_port.clone(),
                    },
                );

                if let Err(e) = serve_port(port.as_mut(), &mut decoder, tx, poll_interval) {
                    warn!(
                        "Conexão perdida: {e}. Tentando novamente em {:.1}s...",
                        config.reconnect_delay_secs
                    );
                }

                forward(
                    tx,
                    ReceiverEvent::Disconnected {
                        at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    },
                );
            }
            Err(e) => {
                error!(
                    "Falha ao abrir {}: {e}. Tentando novamente em {:.1}s...",
                    config.serial_port, config.reconnect_delay_secs
                );
            }
        }

        std::thread::sleep(reconnect_delay);
    }
}

/// Lê a porta até um erro de E/S.
///
/// Cada frame decodificado é confirmado antes de ser repassado; se o ACK
/// não puder ser escrito, a conexão é considerada perdida.
pub(crate) fn serve_port<P>(
    port: &mut P,
    decoder: &mut FrameDecoder,
    tx: &Sender<ReceiverEvent>,
    poll_interval: Duration,
) -> std::io::Result<()>
where
    P: Read + Write + ?Sized,
{
    let mut buf = [0u8; 256];
    loop {
        match port.read(&mut buf) {
            Ok(0) => std::thread::sleep(poll_interval),
            Ok(n) => {
                decoder.push(&buf[..n]);
                while let Some(record) = decoder.next_record() {
                    port.write_all(&[ACK_BYTE])?;
                    port.flush()?;
                    forward(tx, ReceiverEvent::Sample(record));
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                // Timeout normal, continua
            }
            Err(e) => return Err(e),
        }
    }
}

// Non-blocking send: se a thread principal está lenta, descarta
fn forward(tx: &Sender<ReceiverEvent>, event: ReceiverEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => debug!("Channel cheio, descartando evento"),
        Err(TrySendError::Disconnected(_)) => debug!("Thread principal encerrada"),
    }
}
