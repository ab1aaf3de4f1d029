//! Adaptadores `embedded-hal` 1.0
//!
//! Qualquer periférico que implemente `embedded_hal::i2c::I2c` ou
//! `embedded_hal::spi::SpiDevice` vira um barramento Sensa.

use embedded_hal::i2c::{self, Error as _};
use embedded_hal::spi::{self, Error as _};
use tracing::debug;

use sensa_core::bus::{I2cBus, SpiBus, SpiMode};
use sensa_core::error::{BusError, BusResult};

/// Barramento I2C sobre `embedded_hal::i2c::I2c`
#[derive(Debug)]
pub struct HalI2c<T> {
    inner: T,
}

impl<T: i2c::I2c> HalI2c<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn i2c_error(address: u8, kind: i2c::ErrorKind) -> BusError {
    match kind {
        i2c::ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge { address },
        other => BusError::Transport(format!("I2C: {:?}", other)),
    }
}

impl<T: i2c::I2c> I2cBus for HalI2c<T> {
    fn read(&mut self, address: u8, len: usize) -> BusResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner
            .read(address, &mut buf)
            .map_err(|e| i2c_error(address, e.kind()))?;
        Ok(buf)
    }

    fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
        self.inner
            .write(address, data)
            .map_err(|e| i2c_error(address, e.kind()))
    }

    fn write_read(&mut self, address: u8, write: &[u8], len: usize) -> BusResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner
            .write_read(address, write, &mut buf)
            .map_err(|e| i2c_error(address, e.kind()))?;
        Ok(buf)
    }
}

/// Barramento SPI sobre `embedded_hal::spi::SpiDevice`
///
/// O modo é fixado quando o dispositivo SPI é aberto; pedidos de outro modo
/// são apenas registrados.
#[derive(Debug)]
pub struct HalSpi<T> {
    inner: T,
    mode: SpiMode,
}

impl<T: spi::SpiDevice> HalSpi<T> {
    /// `mode` é o modo com que `inner` foi configurado
    pub fn new(inner: T, mode: SpiMode) -> Self {
        Self { inner, mode }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: spi::SpiDevice> SpiBus for HalSpi<T> {
    fn transfer(&mut self, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        if let Some(requested) = mode
            && requested != self.mode
        {
            debug!(
                requested = requested.bits(),
                configured = self.mode.bits(),
                "SPI mode override ignored"
            );
        }
        let mut buf = words.to_vec();
        self.inner
            .transfer_in_place(&mut buf)
            .map_err(|e| BusError::Transport(format!("SPI: {:?}", e.kind())))?;
        Ok(buf)
    }
}
