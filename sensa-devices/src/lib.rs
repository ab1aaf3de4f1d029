//! # 🌡️ Sensa-Devices — Módulos de Dispositivo
//!
//! Um módulo por chip: transações de barramento no `sample`, decodificação em
//! funções puras sobre buffers de bytes.
//!
//! | Dispositivo | Barramento | Grandezas |
//! |:------------|:-----------|:----------|
//! | [`Bmp280`] | I2C | pressão, temperatura |
//! | [`Sht4x`] | I2C | temperatura, umidade |
//! | [`Max31865`] | SPI | resistência RTD |
//! | [`Mcp300x`] | SPI | tensão (MCP3008/MCP3004) |
//! | [`GroveAdcHat`] | I2C | tensão |
//! | [`Ads1115`] | I2C | tensão (PGA) |
//! | [`BcRoboticsAdc16`] | SPI (CE0/CE1) | tensão, 16 canais |
//! | [`SequentAdc16`], [`SequentRtd8`], [`SequentDigitalInputs`] | I2C | tensão, resistência, entradas digitais |
//! | [`OneWireThermometer`] | one-wire | temperatura (família DS18x20) |
//! | [`Mlx90614`] | I2C | temperatura IR |
//! | [`Ens160`] | I2C | AQI, TVOC, eCO2 |
//! | [`Sen55`] | I2C | PM, VOC, NOx, T, RH |
//! | [`ModbusMeter`] | Modbus | tensão, corrente, THD |
//! | [`MockDevice`] | nenhum | valor fixo |
//!
//! ## Exemplo
//!
//! ```
//! use sensa_devices::{DeviceKind, Variables};
//! use sensa_core::prelude::*;
//!
//! let vars: Variables = [("variable".to_string(), "x".to_string())].into_iter().collect();
//! let config: toml::Table = toml::from_str("value = 5").unwrap();
//! let mut device = DeviceKind::Mock.build(config, &vars).unwrap();
//! device.initialise(BusHandle::None).unwrap();
//! assert_eq!(device.sample().unwrap().get("x"), Some(Value::Int(5)));
//! ```

pub mod ads1115;
pub mod bc_robotics;
pub mod bmp280;
pub mod common;
pub mod ens160;
pub mod grove_adc;
pub mod max31865;
pub mod mcp300x;
pub mod mlx90614;
pub mod mock;
pub mod modbus_meter;
pub mod one_wire_thermo;
pub mod registry;
pub mod sen55;
pub mod sequent;
pub mod sht4x;

pub use ads1115::{Ads1115, Ads1115Config};
pub use bc_robotics::{BcRoboticsAdc16, BcRoboticsAdcConfig};
pub use bmp280::{Bmp280, Bmp280Config};
pub use common::{Variables, required_variable, validate_channel, variable_or};
pub use ens160::{Ens160, Ens160Config};
pub use grove_adc::{GroveAdcConfig, GroveAdcHat};
pub use max31865::{Max31865, Max31865Config};
pub use mcp300x::{Mcp300x, Mcp300xConfig, Mcp300xVariant};
pub use mlx90614::{Mlx90614, Mlx90614Config};
pub use mock::{MockDevice, MockDeviceConfig};
pub use modbus_meter::{ModbusMeter, ModbusMeterConfig};
pub use one_wire_thermo::{OneWireThermometer, OneWireThermometerConfig, ThermometerFamily};
pub use registry::DeviceKind;
pub use sen55::{Sen55, Sen55Config};
pub use sequent::{
    DigitalInputBoard, SequentAdc16, SequentAdcConfig, SequentDigitalInputs,
    SequentDigitalInputsConfig, SequentRtd8, SequentRtdConfig,
};
pub use sht4x::{Sht4x, Sht4xConfig};
