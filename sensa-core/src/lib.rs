//! # 🧭 Sensa-Core
//!
//! Núcleo do sistema de amostragem Sensa: o contrato entre transferências de
//! bytes no barramento, a decodificação de registradores por dispositivo e a
//! composição em pipelines que alimentam um único *blackboard*.
//!
//! ## Fluxo de dados
//!
//! ```text
//! Bus Interface → Device → (blackboard parcial) → Pipeline → Sensing Stack → sink
//! ```
//!
//! ## Módulos
//!
//! - [`blackboard`]: [`Blackboard`] e [`Value`] — mapa nome → valor de um ciclo
//! - [`bus`]: capacidades de barramento (I2C, SPI, one-wire, Modbus) e [`BusHandle`]
//! - [`traits`]: [`Device`] e [`CalculationModule`]
//! - [`codec`]: montagem de registradores, CRC-8, escala e validação de canal
//! - [`error`]: taxonomia de erros
//!
//! ## Exemplo
//!
//! ```
//! use sensa_core::prelude::*;
//!
//! let mut board = Blackboard::new();
//! board.insert("x", 5);
//! board.insert("y", 2.5);
//!
//! let prefixed = board.prefixed("s1_");
//! assert_eq!(prefixed.get_f64("s1_y"), Some(2.5));
//!
//! assert_eq!(codec::u16_be(0x12, 0x34), 0x1234);
//! ```

pub mod blackboard;
pub mod bus;
pub mod codec;
pub mod error;
pub mod traits;
pub mod prelude;

pub use blackboard::{Blackboard, Value, Variables, variable_or};
pub use bus::{
    AsyncModbusBus, Bus, BusHandle, BusKind, I2cBus, ModbusBus, OneWireBus, ReadOptions,
    RegisterAddress, SpiBus, SpiMode,
};
pub use codec::{ByteOrder, ChannelRange, ChannelValue, ChecksumPolicy};
pub use error::{
    BusError, BusResult, CalculationError, CalculationResult, ChannelError, DeviceError,
    DeviceResult,
};
pub use traits::{CalculationModule, Device};
