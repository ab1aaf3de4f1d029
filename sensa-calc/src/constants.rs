//! Constantes injetadas no blackboard

use serde::Deserialize;

use sensa_core::error::CalculationResult;
use sensa_core::{Blackboard, CalculationModule, Value, Variables};

use crate::common::required_variable;

#[derive(Debug, Clone, Deserialize)]
pub struct ConstantConfig {
    pub value: Value,
}

/// Escreve o valor só se a chave ainda não existir
#[derive(Debug, Clone)]
pub struct DefaultConstant {
    variable: String,
    value: Value,
}

impl DefaultConstant {
    pub const NAME: &'static str = "DefaultConstant";

    pub fn new(config: ConstantConfig, variables: &Variables) -> CalculationResult<Self> {
        Ok(Self {
            variable: required_variable(variables, "variable", Self::NAME)?,
            value: config.value,
        })
    }
}

impl CalculationModule for DefaultConstant {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        board.insert_if_absent(self.variable.as_str(), self.value);
        Ok(())
    }
}

/// Sempre escreve o valor
#[derive(Debug, Clone)]
pub struct FixedConstant {
    variable: String,
    value: Value,
}

impl FixedConstant {
    pub const NAME: &'static str = "FixedConstant";

    pub fn new(config: ConstantConfig, variables: &Variables) -> CalculationResult<Self> {
        Ok(Self {
            variable: required_variable(variables, "variable", Self::NAME)?,
            value: config.value,
        })
    }
}

impl CalculationModule for FixedConstant {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        board.insert(self.variable.as_str(), self.value);
        Ok(())
    }
}
