//! Modbus RTU sobre TCP
//!
//! Quadros RTU (com CRC-16) transportados num socket TCP, como fazem os
//! conversores serial↔Ethernet. Só a função 0x04 (read input registers) é
//! necessária para os medidores suportados.
//!
//! ```text
//! pedido:   [slave, 0x04, addr_hi, addr_lo, count_hi, count_lo, crc_lo, crc_hi]
//! resposta: [slave, 0x04, n_bytes, data..., crc_lo, crc_hi]
//! exceção:  [slave, 0x84, código, crc_lo, crc_hi]
//! ```

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use sensa_core::bus::{AsyncModbusBus, ModbusBus};
use sensa_core::error::{BusError, BusResult};

pub const READ_INPUT_REGISTERS: u8 = 0x04;
const EXCEPTION_FLAG: u8 = 0x80;

// ═══════════════════════════════════════════════════════════════════════════════
// ENQUADRAMENTO RTU
// ═══════════════════════════════════════════════════════════════════════════════

/// CRC-16/MODBUS (polinômio 0xA001 refletido, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
    }
    crc
}

fn push_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Quadro de pedido da função 0x04
pub fn encode_read_input_registers(slave: u8, address: u16, count: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave);
    frame.push(READ_INPUT_REGISTERS);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    push_crc(&mut frame);
    frame
}

/// Quadro de resposta da função 0x04 (usado por servidores de teste)
pub fn encode_input_registers_response(slave: u8, registers: &[u16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + registers.len() * 2);
    frame.push(slave);
    frame.push(READ_INPUT_REGISTERS);
    frame.push((registers.len() * 2) as u8);
    for reg in registers {
        frame.extend_from_slice(&reg.to_be_bytes());
    }
    push_crc(&mut frame);
    frame
}

/// Tamanho total da resposta a partir dos 3 primeiros bytes
pub fn response_len(header: [u8; 3]) -> usize {
    if header[1] & EXCEPTION_FLAG != 0 {
        5
    } else {
        3 + header[2] as usize + 2
    }
}

/// Decodifica a resposta completa da função 0x04
pub fn decode_read_input_registers(slave: u8, frame: &[u8]) -> BusResult<Vec<u16>> {
    if frame.len() < 5 {
        return Err(BusError::Frame(format!("response too short ({} bytes)", frame.len())));
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    let received = u16::from_le_bytes([crc[0], crc[1]]);
    let computed = crc16(body);
    if received != computed {
        return Err(BusError::Frame(format!(
            "CRC mismatch (received 0x{:04X}, computed 0x{:04X})",
            received, computed
        )));
    }
    if body[0] != slave {
        return Err(BusError::Frame(format!("response from slave {}, expected {}", body[0], slave)));
    }
    if body[1] == READ_INPUT_REGISTERS | EXCEPTION_FLAG {
        return Err(BusError::Modbus { slave, code: body[2] });
    }
    if body[1] != READ_INPUT_REGISTERS {
        return Err(BusError::Frame(format!("unexpected function 0x{:02X}", body[1])));
    }
    let byte_count = body[2] as usize;
    let data = &body[3..];
    if data.len() != byte_count || byte_count % 2 != 0 {
        return Err(BusError::Frame(format!(
            "byte count {} does not match payload of {} bytes",
            byte_count,
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]))
        .collect())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENTE ASSÍNCRONO
// ═══════════════════════════════════════════════════════════════════════════════

/// Cliente Modbus RTU-sobre-TCP (tokio)
#[derive(Debug)]
pub struct ModbusTcpClient {
    stream: TcpStream,
    timeout: Duration,
}

impl ModbusTcpClient {
    /// Conecta em `address` (`host:porta`)
    pub async fn connect(address: &str, timeout: Duration) -> BusResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| BusError::Transport(format!("connect to {} timed out", address)))??;
        stream.set_nodelay(true)?;
        debug!(address, "Modbus TCP connected");
        Ok(Self { stream, timeout })
    }

    async fn exchange(&mut self, request: &[u8]) -> BusResult<Vec<u8>> {
        self.stream.write_all(request).await?;

        let mut header = [0u8; 3];
        self.stream.read_exact(&mut header).await?;
        let mut frame = header.to_vec();
        frame.resize(response_len(header), 0);
        self.stream.read_exact(&mut frame[3..]).await?;
        Ok(frame)
    }
}

impl AsyncModbusBus for ModbusTcpClient {
    async fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>> {
        let request = encode_read_input_registers(slave, address, count);
        let frame = tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| BusError::Transport("Modbus response timed out".into()))??;
        let registers = decode_read_input_registers(slave, &frame)?;
        if registers.len() != count as usize {
            return Err(BusError::ShortRead {
                expected: count as usize,
                actual: registers.len(),
            });
        }
        Ok(registers)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENTE SÍNCRONO
// ═══════════════════════════════════════════════════════════════════════════════

/// Cliente síncrono sobre [`ModbusTcpClient`]
///
/// Mantém um runtime de thread única. Conecta sob demanda e descarta a
/// conexão após erro de transporte ou de enquadramento (o socket pode ter
/// ficado com bytes de uma resposta anterior); a próxima leitura reconecta.
#[derive(Debug)]
pub struct BlockingModbusClient {
    address: String,
    timeout: Duration,
    runtime: Runtime,
    client: Option<ModbusTcpClient>,
}

impl BlockingModbusClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> BusResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            address: address.into(),
            timeout,
            runtime,
            client: None,
        })
    }

    /// Conectado no momento?
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

impl ModbusBus for BlockingModbusClient {
    fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>> {
        let mut client = match self.client.take() {
            Some(client) => client,
            None => {
                let client = self
                    .runtime
                    .block_on(ModbusTcpClient::connect(&self.address, self.timeout))?;
                info!(address = %self.address, "Modbus client connected");
                client
            }
        };

        let result = self
            .runtime
            .block_on(client.read_input_registers(slave, address, count));
        match &result {
            Err(BusError::Transport(reason)) => {
                warn!(address = %self.address, %reason, "Modbus transport failed, dropping connection");
            }
            Err(BusError::Frame(reason)) => {
                warn!(address = %self.address, %reason, "Modbus stream out of sync, dropping connection");
            }
            _ => self.client = Some(client),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_crc16_known_frame() {
        assert_eq!(crc16(&[0x01, 0x04, 0x00, 0x00, 0x00, 0x01]), 0xCA31);
        let frame = encode_read_input_registers(1, 0x0000, 1);
        assert_eq!(frame, vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x01, 0x31, 0xCA]);
    }

    #[test]
    fn test_decode_response() {
        let frame = encode_input_registers_response(3, &[0x1234, 0xABCD]);
        assert_eq!(response_len([frame[0], frame[1], frame[2]]), frame.len());
        assert_eq!(decode_read_input_registers(3, &frame).unwrap(), vec![0x1234, 0xABCD]);
    }

    #[test]
    fn test_decode_exception() {
        let mut frame = vec![0x01, 0x84, 0x02];
        push_crc(&mut frame);
        assert_eq!(response_len([0x01, 0x84, 0x02]), 5);
        assert_eq!(
            decode_read_input_registers(1, &frame),
            Err(BusError::Modbus { slave: 1, code: 0x02 })
        );
    }

    #[test]
    fn test_decode_rejects_bad_crc() {
        let mut frame = encode_input_registers_response(1, &[0x0001]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode_read_input_registers(1, &frame), Err(BusError::Frame(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_slave() {
        let frame = encode_input_registers_response(2, &[0x0001]);
        assert!(matches!(decode_read_input_registers(1, &frame), Err(BusError::Frame(_))));
    }

    #[tokio::test]
    async fn test_async_client_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 8];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(request, encode_read_input_registers(7, 0x0006, 2).as_slice());
            socket
                .write_all(&encode_input_registers_response(7, &[0x0000, 0x4366]))
                .await
                .unwrap();
        });

        let mut client = ModbusTcpClient::connect(&address, Duration::from_secs(2))
            .await
            .unwrap();
        let regs = client.read_input_registers(7, 0x0006, 2).await.unwrap();
        assert_eq!(regs, vec![0x0000, 0x4366]);
        server.await.unwrap();
    }

    #[test]
    fn test_blocking_client_reconnects_after_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            // Primeira conexão: fecha sem responder
            let (socket, _) = listener.accept().unwrap();
            drop(socket);

            // Segunda conexão: responde normalmente
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 8];
            socket.read_exact(&mut request).unwrap();
            socket
                .write_all(&encode_input_registers_response(1, &[42]))
                .unwrap();
        });

        let mut client = BlockingModbusClient::new(address, Duration::from_secs(2)).unwrap();
        assert!(client.read_input_registers(1, 0, 1).is_err());
        assert!(!client.is_connected());

        assert_eq!(client.read_input_registers(1, 0, 1).unwrap(), vec![42]);
        assert!(client.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn test_blocking_client_reconnects_after_bad_byte_count() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            // Primeira conexão: byte count 2 para um payload de 4 bytes
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 8];
            socket.read_exact(&mut request).unwrap();
            let mut frame = encode_input_registers_response(1, &[0x1234, 0x5678]);
            frame[2] = 2;
            socket.write_all(&frame).unwrap();

            // Segunda conexão: resposta correta
            let (mut fresh, _) = listener.accept().unwrap();
            fresh.read_exact(&mut request).unwrap();
            fresh
                .write_all(&encode_input_registers_response(1, &[0x1234, 0x5678]))
                .unwrap();
            drop(socket);
        });

        let mut client = BlockingModbusClient::new(address, Duration::from_secs(2)).unwrap();
        assert!(matches!(client.read_input_registers(1, 0, 2), Err(BusError::Frame(_))));
        assert!(!client.is_connected());

        assert_eq!(client.read_input_registers(1, 0, 2).unwrap(), vec![0x1234, 0x5678]);
        server.join().unwrap();
    }
}
