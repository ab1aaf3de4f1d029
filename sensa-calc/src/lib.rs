//! # 🧮 Sensa-Calc — Módulos de Cálculo
//!
//! Transformações puras sobre o [`Blackboard`](sensa_core::Blackboard), sem
//! I/O. Entrada ausente é [`CalculationError::InputMissing`] e o blackboard
//! fica intacto.
//!
//! | Módulo | Nome na configuração | Fórmula |
//! |:-------|:---------------------|:--------|
//! | [`PtRtd`] | `pt_rtd` | polinômio de 5ª ordem (Horner) |
//! | [`PeakToRms`] | `peak_to_rms` | `pico / √2` |
//! | [`CurrentToPower`] | `current_to_power` | `fases · I · V` |
//! | [`VoltageToCurrent`] | `voltage_to_current` | `ganho · (V − offset)` |
//! | [`DefaultConstant`] | `default_constant` | valor se ausente |
//! | [`FixedConstant`] | `fixed_constant` | valor sempre |
//!
//! [`CalculationError::InputMissing`]: sensa_core::CalculationError::InputMissing

pub mod common;
pub mod constants;
pub mod electrical;
pub mod registry;
pub mod rtd;

pub use constants::{ConstantConfig, DefaultConstant, FixedConstant};
pub use electrical::{
    CurrentToPower, CurrentToPowerConfig, PeakToRms, VoltageToCurrent, VoltageToCurrentConfig,
};
pub use registry::CalculationKind;
pub use rtd::{PtRtd, PtRtdConfig, temperature_from_resistance};
