//! Resistência de RTD de platina → temperatura
//!
//! Ajuste polinomial de 5ª ordem da temperatura em função da resistência,
//! válido de -200 °C a 660 °C para um sensor de 100 Ω a 0 °C. Sensores de
//! outra resistência nominal (PT500, PT1000) são reescalados para 100 Ω antes.
//!
//! ```text
//! T = ((((r·c5 + c4)·r + c3)·r + c2)·r + c1)·r + c0
//! ```

use serde::Deserialize;
use tracing::trace;

use sensa_core::error::{CalculationError, CalculationResult};
use sensa_core::{Blackboard, CalculationModule, Variables};

use crate::common::{input, variable_or};

const C5: f64 = -2.10678E-11;
const C4: f64 = 2.27311E-08;
const C3: f64 = -8.20888E-06;
const C2: f64 = 2.38589E-03;
const C1: f64 = 2.24745E+00;
const C0: f64 = -2.42522E+02;

/// Temperatura (°C) de uma resistência já na base de 100 Ω
///
/// A ordem de Horner é mantida operação por operação.
pub fn temperature_from_resistance(r: f64) -> f64 {
    let mut t = r * C5 + C4;
    t *= r;
    t += C3;
    t *= r;
    t += C2;
    t *= r;
    t += C1;
    t *= r;
    t += C0;
    t
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PtRtdConfig {
    /// Resistência a 0 °C (100 para PT100)
    pub nominal_resistance: f64,
}

impl Default for PtRtdConfig {
    fn default() -> Self {
        Self {
            nominal_resistance: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PtRtd {
    scale: f64,
    resistance_variable: String,
    temperature_variable: String,
}

impl PtRtd {
    pub const NAME: &'static str = "PtRtd";

    pub fn new(config: PtRtdConfig, variables: &Variables) -> CalculationResult<Self> {
        if !(config.nominal_resistance > 0.0) {
            return Err(CalculationError::InvalidInput {
                module: Self::NAME.into(),
                variable: "nominal_resistance".into(),
                reason: format!("must be positive, got {}", config.nominal_resistance),
            });
        }
        Ok(Self {
            scale: 100.0 / config.nominal_resistance,
            resistance_variable: variable_or(variables, "resistance", "resistance"),
            temperature_variable: variable_or(variables, "temperature", "temperature"),
        })
    }
}

impl CalculationModule for PtRtd {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        let resistance = input(board, Self::NAME, &self.resistance_variable)?;
        let temperature = temperature_from_resistance(resistance * self.scale);
        trace!(resistance, temperature, "RTD converted");
        board.insert(self.temperature_variable.as_str(), temperature);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(nominal: f64) -> PtRtd {
        PtRtd::new(PtRtdConfig { nominal_resistance: nominal }, &Variables::new()).unwrap()
    }

    #[test]
    fn test_polynomial_values() {
        let cases = [
            (100.0, -0.064_548),
            (138.5, 99.998_133_444),
            (18.52, -200.130_404_696),
        ];
        for (r, expected) in cases {
            let t = temperature_from_resistance(r);
            assert!((t - expected).abs() < 1e-6, "R={} Ω: got {}, expected {}", r, t, expected);
        }
    }

    #[test]
    fn test_fit_error_at_reference_points() {
        // desvio medido do ajuste em 0 °C: -0.0645 °C
        let t0 = temperature_from_resistance(100.0);
        assert!(t0.abs() < 0.065, "fit error at 0 °C is {} °C", t0);
        assert!((temperature_from_resistance(138.5) - 100.0).abs() < 0.5);
        assert!((temperature_from_resistance(18.52) + 200.0).abs() < 0.5);
    }

    #[test]
    fn test_nominal_rescale() {
        let mut pt100 = Blackboard::new();
        pt100.insert("resistance", 138.5);
        module(100.0).calculate(&mut pt100).unwrap();

        let mut pt1000 = Blackboard::new();
        pt1000.insert("resistance", 1385.0);
        module(1000.0).calculate(&mut pt1000).unwrap();

        let a = pt100.get_f64("temperature").unwrap();
        let b = pt1000.get_f64("temperature").unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_missing_input_leaves_board_untouched() {
        let mut board = Blackboard::new();
        board.insert("other", 1.0);
        let before = board.clone();
        assert!(matches!(
            module(100.0).calculate(&mut board),
            Err(CalculationError::InputMissing { .. })
        ));
        assert_eq!(board, before);
    }

    #[test]
    fn test_custom_variables() {
        let vars: Variables = [("resistance", "r_ch1"), ("temperature", "t_ch1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let rtd = PtRtd::new(PtRtdConfig::default(), &vars).unwrap();
        let mut board = Blackboard::new();
        board.insert("r_ch1", 100.0);
        rtd.calculate(&mut board).unwrap();
        assert!(board.contains_key("t_ch1"));
        assert!(!board.contains_key("temperature"));
    }

    #[test]
    fn test_rejects_zero_nominal() {
        assert!(PtRtd::new(PtRtdConfig { nominal_resistance: 0.0 }, &Variables::new()).is_err());
    }
}
