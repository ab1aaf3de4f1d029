//! Destinos do blackboard de cada ciclo
//!
//! Cada mensagem é um objeto JSON `{"timestamp": <unix ms>, ...blackboard}`
//! numa linha. Uma chave `timestamp` no próprio blackboard prevalece sobre a
//! gerada.

use std::io::{self, Stdout, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use sensa_core::Blackboard;

use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};

/// Publicador de mensagens
pub trait MessageSink {
    fn publish(&mut self, board: &Blackboard) -> SinkResult<()>;
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn publish(&mut self, board: &Blackboard) -> SinkResult<()> {
        (**self).publish(board)
    }
}

/// Milissegundos desde a época Unix
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monta o objeto publicado
pub fn payload(board: &Blackboard, timestamp_ms: u64) -> SinkResult<Map<String, JsonValue>> {
    let mut message = Map::new();
    message.insert("timestamp".into(), JsonValue::from(timestamp_ms));
    if let JsonValue::Object(entries) = serde_json::to_value(board)? {
        message.extend(entries);
    }
    Ok(message)
}

fn encode_line(board: &Blackboard) -> SinkResult<Vec<u8>> {
    let mut line = serde_json::to_vec(&payload(board, unix_millis())?)?;
    line.push(b'\n');
    Ok(line)
}

/// Constrói o sink configurado
pub fn from_config(config: &SinkConfig) -> Box<dyn MessageSink> {
    match config {
        SinkConfig::Stdout => Box::new(JsonLinesSink::stdout()),
        SinkConfig::Tcp {
            address,
            connect_timeout_secs,
        } => Box::new(TcpJsonSink::new(
            address.clone(),
            Duration::from_secs_f64(*connect_timeout_secs),
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON LINES
// ═══════════════════════════════════════════════════════════════════════════════

/// Uma linha JSON por mensagem em qualquer [`Write`]
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageSink for JsonLinesSink<W> {
    fn publish(&mut self, board: &Blackboard) -> SinkResult<()> {
        self.writer.write_all(&encode_line(board)?)?;
        self.writer.flush()?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TCP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Connection {
    Disconnected,
    Connected(TcpStream),
}

/// Linhas JSON num socket TCP, reconectando após falhas
///
/// ```text
/// Disconnected ──publish (conecta)──▶ Connected
/// Connected ──falha de escrita──▶ Disconnected
/// ```
///
/// A mensagem que encontra o socket quebrado é perdida; a próxima tenta
/// reconectar.
#[derive(Debug)]
pub struct TcpJsonSink {
    address: String,
    connect_timeout: Duration,
    connection: Connection,
}

impl TcpJsonSink {
    /// Não conecta: a conexão acontece na primeira publicação
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            connection: Connection::Disconnected,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected(_))
    }

    /// Conecta se necessário
    pub fn connect(&mut self) -> SinkResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        let mut last_error = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!(address = %self.address, "sink connected");
                    self.connection = Connection::Connected(stream);
                    return Ok(());
                }
                Err(err) => last_error = Some(err),
            }
        }
        Err(match last_error {
            Some(err) => SinkError::Io(err),
            None => SinkError::Disconnected(self.address.clone()),
        })
    }

    /// Fecha a conexão atual
    pub fn disconnect(&mut self) {
        if let Connection::Connected(stream) = std::mem::replace(&mut self.connection, Connection::Disconnected) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!(address = %self.address, "sink disconnected");
        }
    }
}

impl MessageSink for TcpJsonSink {
    fn publish(&mut self, board: &Blackboard) -> SinkResult<()> {
        let line = encode_line(board)?;
        self.connect()?;
        let Connection::Connected(stream) = &mut self.connection else {
            return Err(SinkError::Disconnected(self.address.clone()));
        };
        if let Err(err) = stream.write_all(&line).and_then(|()| stream.flush()) {
            warn!(address = %self.address, error = %err, "sink write failed, will reconnect");
            self.connection = Connection::Disconnected;
            return Err(SinkError::Io(err));
        }
        Ok(())
    }
}

impl Drop for TcpJsonSink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
