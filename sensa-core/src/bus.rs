//! Capacidades de barramento
//!
//! Cada tipo de barramento é um trait com as operações de bytes brutos que
//! ele suporta. Nenhuma lógica de decodificação vive aqui.
//!
//! | Trait | Operações |
//! |:------|:----------|
//! | [`I2cBus`] | `read`, `write`, `write_read`, `read_register`, `write_register` |
//! | [`SpiBus`] | `transfer`, `transfer_on`, `read`, `write` |
//! | [`OneWireBus`] | `list_devices`, `read_raw` |
//! | [`ModbusBus`] / [`AsyncModbusBus`] | `read_input_registers` |
//!
//! Uma mesma instância de barramento pode ser compartilhada por vários
//! dispositivos via [`Bus`]. O acesso é assumido sequencial (um único
//! chamador), sem travas internas.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, BusResult, DeviceError, DeviceResult};

// ═══════════════════════════════════════════════════════════════════════════════
// TIPOS COMUNS
// ═══════════════════════════════════════════════════════════════════════════════

/// Endereço de registrador (um ou mais bytes, MSB primeiro)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterAddress(Vec<u8>);

impl RegisterAddress {
    /// Endereço a partir de bytes já ordenados (MSB primeiro)
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Bytes do endereço, na ordem de transmissão
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Número de bytes do endereço
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Endereço vazio?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<u8> for RegisterAddress {
    fn from(reg: u8) -> Self {
        Self(vec![reg])
    }
}

impl From<u16> for RegisterAddress {
    fn from(reg: u16) -> Self {
        Self(reg.to_be_bytes().to_vec())
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in &self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// Opções de leitura de registrador
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Emite STOP entre a escrita do endereço e a leitura dos dados
    pub stop: bool,
    /// Espera entre escrita e leitura (só se aplica com `stop`)
    pub delay: Option<Duration>,
}

impl ReadOptions {
    /// Transação combinada (repeated start)
    pub const COMBINED: ReadOptions = ReadOptions {
        stop: false,
        delay: None,
    };

    /// Duas transações separadas por STOP
    pub fn with_stop() -> Self {
        Self {
            stop: true,
            delay: None,
        }
    }

    /// STOP seguido de espera antes da leitura
    pub fn stop_then_wait(delay: Duration) -> Self {
        Self {
            stop: true,
            delay: Some(delay),
        }
    }
}

/// Modo SPI: `(CPOL << 1) | CPHA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpiMode(u8);

impl SpiMode {
    pub const MODE_0: SpiMode = SpiMode(0);
    pub const MODE_1: SpiMode = SpiMode(1);
    pub const MODE_2: SpiMode = SpiMode(2);
    pub const MODE_3: SpiMode = SpiMode(3);

    /// Cria modo a partir do valor de 2 bits
    pub fn new(bits: u8) -> Option<Self> {
        (bits <= 3).then_some(SpiMode(bits))
    }

    /// Polaridade do clock
    pub fn cpol(&self) -> bool {
        self.0 & 0b10 != 0
    }

    /// Fase do clock
    pub fn cpha(&self) -> bool {
        self.0 & 0b01 != 0
    }

    /// Valor de 2 bits
    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Tipo de barramento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    I2c,
    Spi,
    OneWire,
    Modbus,
    /// Dispositivos sem barramento (mock, constantes)
    None,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusKind::I2c => "I2C",
            BusKind::Spi => "SPI",
            BusKind::OneWire => "one-wire",
            BusKind::Modbus => "Modbus",
            BusKind::None => "no",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAITS DE BARRAMENTO
// ═══════════════════════════════════════════════════════════════════════════════

/// Barramento I2C
///
/// Implementações fornecem as três transações primitivas; as operações de
/// registrador são derivadas delas.
pub trait I2cBus {
    /// Lê `len` bytes do dispositivo
    fn read(&mut self, address: u8, len: usize) -> BusResult<Vec<u8>>;

    /// Escreve bytes no dispositivo
    fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()>;

    /// Escreve e lê numa única transação (repeated start, sem STOP)
    fn write_read(&mut self, address: u8, write: &[u8], len: usize) -> BusResult<Vec<u8>>;

    /// Lê `len` bytes a partir de `register`
    fn read_register(
        &mut self,
        address: u8,
        register: &RegisterAddress,
        len: usize,
        options: ReadOptions,
    ) -> BusResult<Vec<u8>> {
        if options.stop {
            self.write(address, register.as_bytes())?;
            if let Some(delay) = options.delay {
                std::thread::sleep(delay);
            }
            self.read(address, len)
        } else {
            self.write_read(address, register.as_bytes(), len)
        }
    }

    /// Escreve `data` a partir de `register` numa única transação
    fn write_register(&mut self, address: u8, register: &RegisterAddress, data: &[u8]) -> BusResult<()> {
        let mut frame = Vec::with_capacity(register.len() + data.len());
        frame.extend_from_slice(register.as_bytes());
        frame.extend_from_slice(data);
        self.write(address, &frame)
    }
}

/// Barramento SPI
pub trait SpiBus {
    /// Transfere `words` e retorna as palavras recebidas (mesmo tamanho)
    ///
    /// `mode` sobrescreve o modo padrão do barramento para esta transação.
    fn transfer(&mut self, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>>;

    /// Transfere com outra linha de chip select do mesmo barramento
    ///
    /// Placas com vários chips atrás de um único barramento (ex.: dois ADCs
    /// em CE0/CE1) usam este método. Barramentos ligados a um único
    /// dispositivo respondem `Unsupported`.
    fn transfer_on(&mut self, chip_select: u8, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        let _ = (words, mode);
        Err(BusError::Unsupported(format!(
            "chip select {} on a single-device SPI bus",
            chip_select
        )))
    }

    /// Envia `register` e depois lê `len` palavras
    ///
    /// A primeira palavra recebida é descartada: foi capturada enquanto o
    /// endereço ainda estava sendo enviado.
    fn read(&mut self, register: &[u8], len: usize, mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        let mut words = Vec::with_capacity(register.len() + len);
        words.extend_from_slice(register);
        words.resize(register.len() + len, 0);
        let received = self.transfer(&words, mode)?;
        Ok(received.into_iter().skip(1).collect())
    }

    /// Envia `register` seguido de `data`
    fn write(&mut self, register: &[u8], data: &[u8], mode: Option<SpiMode>) -> BusResult<()> {
        let mut words = Vec::with_capacity(register.len() + data.len());
        words.extend_from_slice(register);
        words.extend_from_slice(data);
        self.transfer(&words, mode).map(|_| ())
    }
}

/// Barramento one-wire (interface de arquivos do kernel)
pub trait OneWireBus {
    /// IDs dos dispositivos presentes (sem o mestre do barramento)
    fn list_devices(&mut self) -> BusResult<Vec<String>>;

    /// Linhas de texto expostas pelo dispositivo
    fn read_raw(&mut self, id: &str) -> BusResult<Vec<String>>;
}

/// Cliente Modbus síncrono
pub trait ModbusBus {
    /// Lê `count` registradores de entrada (função 0x04)
    fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>>;
}

/// Cliente Modbus assíncrono
///
/// A suspensão só acontece na leitura; a decodificação continua síncrona e
/// pura sobre os registradores retornados.
#[allow(async_fn_in_trait)]
pub trait AsyncModbusBus {
    /// Lê `count` registradores de entrada (função 0x04)
    async fn read_input_registers(&mut self, slave: u8, address: u16, count: u16) -> BusResult<Vec<u16>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLES COMPARTILHADOS
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle compartilhado para um barramento
///
/// Clonar o handle compartilha a mesma instância.
pub struct Bus<T: ?Sized>(Rc<RefCell<T>>);

impl<T: ?Sized> Bus<T> {
    /// Envolve um barramento já compartilhado
    pub fn from_shared(inner: Rc<RefCell<T>>) -> Self {
        Self(inner)
    }

    /// Acesso mutável ao barramento
    ///
    /// Acesso é sequencial: nunca mantenha o empréstimo entre transações.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }
}

impl<T: ?Sized> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("handles", &Rc::strong_count(&self.0))
            .finish()
    }
}

/// Barramento entregue a [`Device::initialise`](crate::traits::Device::initialise)
#[derive(Debug, Clone)]
pub enum BusHandle {
    I2c(Bus<dyn I2cBus>),
    Spi(Bus<dyn SpiBus>),
    OneWire(Bus<dyn OneWireBus>),
    Modbus(Bus<dyn ModbusBus>),
    None,
}

impl BusHandle {
    /// Envolve um barramento I2C exclusivo
    pub fn i2c(bus: impl I2cBus + 'static) -> Self {
        Self::shared_i2c(Rc::new(RefCell::new(bus)))
    }

    /// Envolve um barramento I2C compartilhado
    pub fn shared_i2c(bus: Rc<RefCell<dyn I2cBus>>) -> Self {
        BusHandle::I2c(Bus::from_shared(bus))
    }

    /// Envolve um barramento SPI exclusivo
    pub fn spi(bus: impl SpiBus + 'static) -> Self {
        Self::shared_spi(Rc::new(RefCell::new(bus)))
    }

    /// Envolve um barramento SPI compartilhado
    pub fn shared_spi(bus: Rc<RefCell<dyn SpiBus>>) -> Self {
        BusHandle::Spi(Bus::from_shared(bus))
    }

    /// Envolve um barramento one-wire exclusivo
    pub fn one_wire(bus: impl OneWireBus + 'static) -> Self {
        Self::shared_one_wire(Rc::new(RefCell::new(bus)))
    }

    /// Envolve um barramento one-wire compartilhado
    pub fn shared_one_wire(bus: Rc<RefCell<dyn OneWireBus>>) -> Self {
        BusHandle::OneWire(Bus::from_shared(bus))
    }

    /// Envolve um cliente Modbus exclusivo
    pub fn modbus(bus: impl ModbusBus + 'static) -> Self {
        Self::shared_modbus(Rc::new(RefCell::new(bus)))
    }

    /// Envolve um cliente Modbus compartilhado
    pub fn shared_modbus(bus: Rc<RefCell<dyn ModbusBus>>) -> Self {
        BusHandle::Modbus(Bus::from_shared(bus))
    }

    /// Tipo deste barramento
    pub fn kind(&self) -> BusKind {
        match self {
            BusHandle::I2c(_) => BusKind::I2c,
            BusHandle::Spi(_) => BusKind::Spi,
            BusHandle::OneWire(_) => BusKind::OneWire,
            BusHandle::Modbus(_) => BusKind::Modbus,
            BusHandle::None => BusKind::None,
        }
    }

    /// Extrai o barramento I2C ou falha com `WrongInterface`
    pub fn into_i2c(self, device: &str) -> DeviceResult<Bus<dyn I2cBus>> {
        match self {
            BusHandle::I2c(bus) => Ok(bus),
            other => Err(wrong_interface(device, BusKind::I2c, other.kind())),
        }
    }

    /// Extrai o barramento SPI ou falha com `WrongInterface`
    pub fn into_spi(self, device: &str) -> DeviceResult<Bus<dyn SpiBus>> {
        match self {
            BusHandle::Spi(bus) => Ok(bus),
            other => Err(wrong_interface(device, BusKind::Spi, other.kind())),
        }
    }

    /// Extrai o barramento one-wire ou falha com `WrongInterface`
    pub fn into_one_wire(self, device: &str) -> DeviceResult<Bus<dyn OneWireBus>> {
        match self {
            BusHandle::OneWire(bus) => Ok(bus),
            other => Err(wrong_interface(device, BusKind::OneWire, other.kind())),
        }
    }

    /// Extrai o cliente Modbus ou falha com `WrongInterface`
    pub fn into_modbus(self, device: &str) -> DeviceResult<Bus<dyn ModbusBus>> {
        match self {
            BusHandle::Modbus(bus) => Ok(bus),
            other => Err(wrong_interface(device, BusKind::Modbus, other.kind())),
        }
    }
}

fn wrong_interface(device: &str, expected: BusKind, found: BusKind) -> DeviceError {
    DeviceError::WrongInterface {
        device: device.to_string(),
        expected,
        found,
    }
}
