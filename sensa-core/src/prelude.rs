//! # Prelude — Re-exportações Convenientes
//!
//! ```
//! use sensa_core::prelude::*;
//! ```

pub use crate::blackboard::{Blackboard, Value, Variables, variable_or};
pub use crate::bus::{
    AsyncModbusBus, Bus, BusHandle, BusKind, I2cBus, ModbusBus, OneWireBus, ReadOptions,
    RegisterAddress, SpiBus, SpiMode,
};
pub use crate::codec::{self, ByteOrder, ChannelRange, ChannelValue, ChecksumPolicy};
pub use crate::error::{
    BusError, BusResult, CalculationError, CalculationResult, ChannelError, DeviceError,
    DeviceResult,
};
pub use crate::traits::{CalculationModule, Device};
