//! # 🔌 Sensa-Bus — Interfaces de Barramento
//!
//! Implementações concretas dos traits de barramento de `sensa-core`.
//!
//! | Módulo | Barramento | Backend |
//! |:-------|:-----------|:--------|
//! | [`hal`] | I2C, SPI | qualquer `embedded-hal` 1.0 |
//! | [`linux`] | I2C, SPI | `/dev/i2c-*`, `/dev/spidev*` (feature `linux`) |
//! | [`one_wire`] | one-wire | `/sys/bus/w1/devices` |
//! | [`modbus`] | Modbus RTU sobre TCP | `tokio` |
//! | [`mock`] | todos | respostas roteirizadas, para testes |
//!
//! Abrir e fechar o transporte é responsabilidade de quem monta o barramento;
//! os dispositivos recebem a interface já aberta.

pub mod hal;
#[cfg(feature = "linux")]
pub mod linux;
pub mod mock;
pub mod modbus;
pub mod one_wire;

pub use hal::{HalI2c, HalSpi};
pub use mock::{MockI2c, MockModbus, MockOneWire, MockSpi};
pub use modbus::{BlockingModbusClient, ModbusTcpClient};
pub use one_wire::SysfsOneWire;

pub use sensa_core::bus::*;
