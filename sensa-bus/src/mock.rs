//! Barramentos roteirizados
//!
//! Respondem a partir de um mapa de registradores (persistente) ou de filas
//! (consumidas em ordem) e registram toda escrita, para que testes verifiquem
//! tanto a decodificação quanto os bytes enviados ao chip.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use tracing::trace;

use sensa_core::bus::{I2cBus, ModbusBus, OneWireBus, SpiBus, SpiMode};
use sensa_core::error::{BusError, BusResult};

// ═══════════════════════════════════════════════════════════════════════════════
// I2C
// ═══════════════════════════════════════════════════════════════════════════════

/// Transação I2C registrada
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cTransaction {
    Write { address: u8, data: Vec<u8> },
    Read { address: u8, len: usize },
    WriteRead { address: u8, write: Vec<u8>, len: usize },
}

/// I2C roteirizado
///
/// A resposta de uma leitura é escolhida pelos últimos bytes escritos ao
/// endereço (o registrador ou comando). Endereços sem dispositivo falham com
/// `NoAcknowledge`; registradores sem roteiro retornam zeros.
#[derive(Debug, Default)]
pub struct MockI2c {
    devices: HashSet<u8>,
    registers: HashMap<(u8, Vec<u8>), Vec<u8>>,
    queued: HashMap<(u8, Vec<u8>), VecDeque<Vec<u8>>>,
    last_write: HashMap<u8, Vec<u8>>,
    log: Vec<I2cTransaction>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embrulha para compartilhar com um [`BusHandle`](sensa_core::BusHandle)
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Dispositivo presente, sem registradores roteirizados
    pub fn with_device(mut self, address: u8) -> Self {
        self.devices.insert(address);
        self
    }

    /// Resposta persistente para `register`
    pub fn with_register(mut self, address: u8, register: &[u8], response: &[u8]) -> Self {
        self.set_register(address, register, response);
        self
    }

    /// Respostas consumidas em ordem antes da persistente
    pub fn with_queue(mut self, address: u8, register: &[u8], responses: &[&[u8]]) -> Self {
        self.devices.insert(address);
        self.queued
            .entry((address, register.to_vec()))
            .or_default()
            .extend(responses.iter().map(|r| r.to_vec()));
        self
    }

    pub fn set_register(&mut self, address: u8, register: &[u8], response: &[u8]) {
        self.devices.insert(address);
        self.registers.insert((address, register.to_vec()), response.to_vec());
    }

    /// Todas as transações, em ordem
    pub fn transactions(&self) -> &[I2cTransaction] {
        &self.log
    }

    /// Apenas os quadros escritos com `write` (sem os `write_read`)
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter_map(|t| match t {
                I2cTransaction::Write { address: a, data } if *a == address => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    fn ack(&self, address: u8) -> BusResult<()> {
        if self.devices.contains(&address) {
            Ok(())
        } else {
            Err(BusError::NoAcknowledge { address })
        }
    }

    fn respond(&mut self, address: u8, key: Vec<u8>, len: usize) -> BusResult<Vec<u8>> {
        let key = (address, key);
        let response = self
            .queued
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.registers.get(&key).cloned());

        let Some(mut response) = response else {
            trace!(address, register = ?key.1, "unscripted register, returning zeros");
            return Ok(vec![0; len]);
        };
        if response.len() < len {
            return Err(BusError::ShortRead {
                expected: len,
                actual: response.len(),
            });
        }
        response.truncate(len);
        Ok(response)
    }
}

impl I2cBus for MockI2c {
    fn read(&mut self, address: u8, len: usize) -> BusResult<Vec<u8>> {
        self.ack(address)?;
        self.log.push(I2cTransaction::Read { address, len });
        let key = self.last_write.get(&address).cloned().unwrap_or_default();
        self.respond(address, key, len)
    }

    fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
        self.ack(address)?;
        self.log.push(I2cTransaction::Write {
            address,
            data: data.to_vec(),
        });
        self.last_write.insert(address, data.to_vec());
        Ok(())
    }

    fn write_read(&mut self, address: u8, write: &[u8], len: usize) -> BusResult<Vec<u8>> {
        self.ack(address)?;
        self.log.push(I2cTransaction::WriteRead {
            address,
            write: write.to_vec(),
            len,
        });
        self.respond(address, write.to_vec(), len)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPI
// ═══════════════════════════════════════════════════════════════════════════════

/// SPI roteirizado: cada `transfer` consome uma resposta da fila
///
/// A resposta é completada com zeros (ou truncada) até o tamanho enviado;
/// fila vazia responde zeros. `transfer_on` usa a mesma fila e registra a
/// linha de chip select.
#[derive(Debug, Default)]
pub struct MockSpi {
    responses: VecDeque<Vec<u8>>,
    transfers: Vec<(Vec<u8>, Option<SpiMode>)>,
    chip_selects: Vec<Option<u8>>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn with_response(mut self, response: &[u8]) -> Self {
        self.push_response(response);
        self
    }

    pub fn push_response(&mut self, response: &[u8]) {
        self.responses.push_back(response.to_vec());
    }

    /// Palavras enviadas e modo pedido, por transferência
    pub fn transfers(&self) -> &[(Vec<u8>, Option<SpiMode>)] {
        &self.transfers
    }

    /// Chip select de cada transferência (`None` = linha padrão)
    pub fn chip_selects(&self) -> &[Option<u8>] {
        &self.chip_selects
    }

    fn respond(&mut self, chip_select: Option<u8>, words: &[u8], mode: Option<SpiMode>) -> Vec<u8> {
        self.transfers.push((words.to_vec(), mode));
        self.chip_selects.push(chip_select);
        let mut response = self.responses.pop_front().unwrap_or_default();
        response.resize(words.len(), 0);
        response
    }
}

impl SpiBus for MockSpi {
    fn transfer(&mut self, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        Ok(self.respond(None, words, mode))
    }

    fn transfer_on(&mut self, chip_select: u8, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        trace!(chip_select, "mock SPI transfer");
        Ok(self.respond(Some(chip_select), words, mode))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ONE-WIRE
// ═══════════════════════════════════════════════════════════════════════════════

/// One-wire em memória: ID → linhas de `w1_slave`
#[derive(Debug, Default)]
pub struct MockOneWire {
    devices: BTreeMap<String, Vec<String>>,
    reads: Vec<String>,
}

impl MockOneWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn with_device(mut self, id: &str, lines: &[&str]) -> Self {
        self.devices
            .insert(id.to_string(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// IDs lidos, em ordem
    pub fn reads(&self) -> &[String] {
        &self.reads
    }
}

impl OneWireBus for MockOneWire {
    fn list_devices(&mut self) -> BusResult<Vec<String>> {
        Ok(self.devices.keys().cloned().collect())
    }

    fn read_raw(&mut self, id: &str) -> BusResult<Vec<String>> {
        self.reads.push(id.to_string());
        self.devices
            .get(id)
            .cloned()
            .ok_or_else(|| BusError::DeviceNotFound(id.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODBUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Modbus em memória: (slave, registrador) → valor
///
/// Registrador ausente responde a exceção 0x02 (endereço ilegal).
#[derive(Debug, Default)]
pub struct MockModbus {
    registers: HashMap<(u8, u16), u16>,
    requests: Vec<(u8, u16, u16)>,
}

impl MockModbus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Registradores consecutivos a partir de `address`
    pub fn with_registers(mut self, slave: u8, address: u16, values: &[u16]) -> Self {
        for (offset, value) in values.iter().enumerate() {
            self.registers.insert((slave, address + offset as u16), *value);
        }
        self
    }

    /// `(slave, endereço, quantidade)` de cada leitura
    pub fn requests(&self) -> &[(u8, u16, u16)] {
        &self.requests
    }

    /// Leitura sem registrar o pedido (compartilhada com a versão assíncrona)
    fn lookup(&self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>> {
        (0..count)
            .map(|i| {
                self.registers
                    .get(&(slave, address + i))
                    .copied()
                    .ok_or(BusError::Modbus { slave, code: 0x02 })
            })
            .collect()
    }
}

impl ModbusBus for MockModbus {
    fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>> {
        self.requests.push((slave, address, count));
        self.lookup(slave, address, count)
    }
}

impl sensa_core::bus::AsyncModbusBus for MockModbus {
    async fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>> {
        self.requests.push((slave, address, count));
        self.lookup(slave, address, count)
    }
}
