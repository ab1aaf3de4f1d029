//! Conversões elétricas: pico → RMS, corrente → potência, tensão → corrente
//!
//! Os papéis seguem o modelo físico: `*_in` é a grandeza que entra no
//! hardware modelado (escrita), `*_out` a que sai dele (lida).

use std::f64::consts::FRAC_1_SQRT_2;

use serde::Deserialize;

use sensa_core::error::{CalculationError, CalculationResult};
use sensa_core::{Blackboard, CalculationModule, Variables};

use crate::common::{input, required_variable, variable_or};

// ═══════════════════════════════════════════════════════════════════════════════
// PICO → RMS
// ═══════════════════════════════════════════════════════════════════════════════

/// `rms = pico / √2` (senoide)
#[derive(Debug, Clone)]
pub struct PeakToRms {
    peak_variable: String,
    rms_variable: String,
}

impl PeakToRms {
    pub const NAME: &'static str = "PeakToRms";

    /// Papéis: `var_out` (pico, lido) e `var_in` (RMS, escrito)
    pub fn new(variables: &Variables) -> CalculationResult<Self> {
        Ok(Self {
            peak_variable: required_variable(variables, "var_out", Self::NAME)?,
            rms_variable: required_variable(variables, "var_in", Self::NAME)?,
        })
    }
}

impl CalculationModule for PeakToRms {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        let peak = input(board, Self::NAME, &self.peak_variable)?;
        board.insert(self.rms_variable.as_str(), peak * FRAC_1_SQRT_2);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CORRENTE → POTÊNCIA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurrentToPowerConfig {
    pub line_voltage: f64,
    pub phases: u32,
}

impl Default for CurrentToPowerConfig {
    fn default() -> Self {
        Self {
            line_voltage: 230.0,
            phases: 1,
        }
    }
}

/// `potência = fases · I_rms · V_linha`
#[derive(Debug, Clone)]
pub struct CurrentToPower {
    config: CurrentToPowerConfig,
    current_variable: String,
    power_variable: String,
}

impl CurrentToPower {
    pub const NAME: &'static str = "CurrentToPower";

    /// Papéis: `rms_current_out` (lido) e `power_in` (escrito)
    pub fn new(config: CurrentToPowerConfig, variables: &Variables) -> CalculationResult<Self> {
        if config.phases == 0 {
            return Err(CalculationError::InvalidInput {
                module: Self::NAME.into(),
                variable: "phases".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(Self {
            config,
            current_variable: required_variable(variables, "rms_current_out", Self::NAME)?,
            power_variable: required_variable(variables, "power_in", Self::NAME)?,
        })
    }
}

impl CalculationModule for CurrentToPower {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        let current = input(board, Self::NAME, &self.current_variable)?;
        let power = f64::from(self.config.phases) * current * self.config.line_voltage;
        board.insert(self.power_variable.as_str(), power);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TENSÃO → CORRENTE (transformador de corrente)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoltageToCurrentConfig {
    /// Ampères por volt
    pub gain: f64,
    /// Tensão com 0 A circulando
    pub offset: f64,
}

impl Default for VoltageToCurrentConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
        }
    }
}

/// `I = ganho · (V − offset)`
#[derive(Debug, Clone)]
pub struct VoltageToCurrent {
    config: VoltageToCurrentConfig,
    voltage_variable: String,
    current_variable: String,
}

impl VoltageToCurrent {
    pub const NAME: &'static str = "VoltageToCurrent";

    pub fn new(config: VoltageToCurrentConfig, variables: &Variables) -> CalculationResult<Self> {
        Ok(Self {
            config,
            voltage_variable: variable_or(variables, "voltage", "voltage"),
            current_variable: variable_or(variables, "current", "current"),
        })
    }
}

impl CalculationModule for VoltageToCurrent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        let voltage = input(board, Self::NAME, &self.voltage_variable)?;
        let current = self.config.gain * (voltage - self.config.offset);
        board.insert(self.current_variable.as_str(), current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_peak_to_rms() {
        let module = PeakToRms::new(&vars(&[("var_out", "peak"), ("var_in", "rms")])).unwrap();
        let mut board = Blackboard::new();
        board.insert("peak", 2.0f64.sqrt() * 10.0);
        module.calculate(&mut board).unwrap();
        assert!((board.get_f64("rms").unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_current_to_power_three_phase() {
        let config = CurrentToPowerConfig {
            line_voltage: 400.0,
            phases: 3,
        };
        let module =
            CurrentToPower::new(config, &vars(&[("rms_current_out", "i"), ("power_in", "p")])).unwrap();
        let mut board = Blackboard::new();
        board.insert("i", 2.5);
        module.calculate(&mut board).unwrap();
        assert_eq!(board.get_f64("p"), Some(3000.0));
    }

    #[test]
    fn test_current_to_power_defaults() {
        let config: CurrentToPowerConfig = toml::from_str("").unwrap();
        assert_eq!(config.line_voltage, 230.0);
        assert_eq!(config.phases, 1);
    }

    #[test]
    fn test_voltage_to_current_offset() {
        let config = VoltageToCurrentConfig {
            gain: 20.0,
            offset: 1.65,
        };
        let module = VoltageToCurrent::new(config, &Variables::new()).unwrap();
        let mut board = Blackboard::new();
        board.insert("voltage", 1.65);
        module.calculate(&mut board).unwrap();
        assert_eq!(board.get_f64("current"), Some(0.0));

        board.insert("voltage", 2.15);
        module.calculate(&mut board).unwrap();
        assert!((board.get_f64("current").unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_roles_and_inputs() {
        assert!(PeakToRms::new(&vars(&[("var_in", "rms")])).is_err());

        let module = PeakToRms::new(&vars(&[("var_out", "peak"), ("var_in", "rms")])).unwrap();
        let mut board = Blackboard::new();
        assert!(matches!(
            module.calculate(&mut board),
            Err(CalculationError::InputMissing { .. })
        ));
        assert!(board.is_empty());
    }
}
