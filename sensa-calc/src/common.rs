//! Leitura de entradas e papéis de variável dos módulos de cálculo

use sensa_core::error::{CalculationError, CalculationResult};
pub use sensa_core::variable_or;
use sensa_core::{Blackboard, Variables};

/// Chave obrigatória para `role`
pub fn required_variable(variables: &Variables, role: &str, module: &str) -> CalculationResult<String> {
    variables.get(role).cloned().ok_or_else(|| CalculationError::InvalidInput {
        module: module.to_string(),
        variable: role.to_string(),
        reason: "variable mapping is required".into(),
    })
}

/// Entrada numérica finita do blackboard
pub fn input(board: &Blackboard, module: &str, key: &str) -> CalculationResult<f64> {
    let value = board.get_f64(key).ok_or_else(|| CalculationError::InputMissing {
        module: module.to_string(),
        variable: key.to_string(),
    })?;
    if !value.is_finite() {
        return Err(CalculationError::InvalidInput {
            module: module.to_string(),
            variable: key.to_string(),
            reason: format!("non-finite value {}", value),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_missing_and_invalid() {
        let mut board = Blackboard::new();
        board.insert("nan", f64::NAN);
        board.insert("ok", 3);

        assert_eq!(input(&board, "M", "ok"), Ok(3.0));
        assert!(matches!(input(&board, "M", "x"), Err(CalculationError::InputMissing { .. })));
        assert!(matches!(input(&board, "M", "nan"), Err(CalculationError::InvalidInput { .. })));
    }

    #[test]
    fn test_required_variable() {
        let vars = Variables::new();
        assert!(required_variable(&vars, "variable", "FixedConstant").is_err());
    }
}
