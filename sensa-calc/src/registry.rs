//! Nome configurado → módulo de cálculo

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;

use sensa_core::error::{CalculationError, CalculationResult};
use sensa_core::{CalculationModule, Variables};

use crate::constants::{DefaultConstant, FixedConstant};
use crate::electrical::{CurrentToPower, PeakToRms, VoltageToCurrent};
use crate::rtd::PtRtd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationKind {
    PtRtd,
    PeakToRms,
    CurrentToPower,
    VoltageToCurrent,
    DefaultConstant,
    FixedConstant,
}

impl CalculationKind {
    pub const ALL: [CalculationKind; 6] = [
        CalculationKind::PtRtd,
        CalculationKind::PeakToRms,
        CalculationKind::CurrentToPower,
        CalculationKind::VoltageToCurrent,
        CalculationKind::DefaultConstant,
        CalculationKind::FixedConstant,
    ];

    /// Nome usado no campo `module` da configuração
    pub fn module(&self) -> &'static str {
        match self {
            CalculationKind::PtRtd => "pt_rtd",
            CalculationKind::PeakToRms => "peak_to_rms",
            CalculationKind::CurrentToPower => "current_to_power",
            CalculationKind::VoltageToCurrent => "voltage_to_current",
            CalculationKind::DefaultConstant => "default_constant",
            CalculationKind::FixedConstant => "fixed_constant",
        }
    }

    pub fn build(
        &self,
        config: toml::Table,
        variables: &Variables,
    ) -> CalculationResult<Box<dyn CalculationModule>> {
        let name = self.module();
        let module: Box<dyn CalculationModule> = match self {
            CalculationKind::PtRtd => Box::new(PtRtd::new(parse(name, config)?, variables)?),
            CalculationKind::PeakToRms => Box::new(PeakToRms::new(variables)?),
            CalculationKind::CurrentToPower => Box::new(CurrentToPower::new(parse(name, config)?, variables)?),
            CalculationKind::VoltageToCurrent => {
                Box::new(VoltageToCurrent::new(parse(name, config)?, variables)?)
            }
            CalculationKind::DefaultConstant => Box::new(DefaultConstant::new(parse(name, config)?, variables)?),
            CalculationKind::FixedConstant => Box::new(FixedConstant::new(parse(name, config)?, variables)?),
        };
        Ok(module)
    }
}

fn parse<C: DeserializeOwned>(name: &str, config: toml::Table) -> CalculationResult<C> {
    toml::Value::Table(config).try_into().map_err(|e| CalculationError::InvalidInput {
        module: name.to_string(),
        variable: "config".into(),
        reason: e.to_string(),
    })
}

impl fmt::Display for CalculationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module())
    }
}

impl FromStr for CalculationKind {
    type Err = CalculationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        CalculationKind::ALL
            .into_iter()
            .find(|kind| kind.module() == lower)
            .ok_or_else(|| CalculationError::Failed(format!("unknown calculation module '{}'", s)))
    }
}
