//! # 🎯 Traits — Papéis do Sistema Sensa
//!
//! | Papel | Trait | Entrada | Saída |
//! |:------|:------|:--------|:------|
//! | Dispositivo | [`Device`] | barramento | blackboard parcial |
//! | Cálculo | [`CalculationModule`] | blackboard | mesmo blackboard, enriquecido |
//!
//! > *"Trait no core, implementação no módulo."*
//!
//! Os chips concretos vivem em `sensa-devices`, os cálculos em `sensa-calc`.

use std::fmt::Debug;

use crate::blackboard::Blackboard;
use crate::bus::{BusHandle, BusKind};
use crate::error::{CalculationResult, DeviceResult};

// ═══════════════════════════════════════════════════════════════════════════════
// DISPOSITIVO
// ═══════════════════════════════════════════════════════════════════════════════

/// Módulo de dispositivo: um por chip sensor
///
/// # Estados
///
/// ```text
/// Não inicializado ──initialise──▶ Inicializado ──sample──▶ (reentrante)
/// ```
///
/// `initialise` é chamado uma vez; `sample` antes dele falha com
/// [`DeviceError::NotInitialised`](crate::error::DeviceError::NotInitialised).
pub trait Device: Debug {
    /// Nome do dispositivo (para logs e erros)
    fn name(&self) -> &str;

    /// Tipo de barramento exigido
    fn interface(&self) -> BusKind;

    /// Vincula o barramento e executa a configuração inicial
    ///
    /// Deve validar que o chip conectado é o esperado quando houver registrador
    /// de identificação.
    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()>;

    /// Executa uma leitura completa e retorna as variáveis configuradas
    fn sample(&mut self) -> DeviceResult<Blackboard>;

    /// `initialise` já foi concluído?
    fn is_initialised(&self) -> bool;
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn interface(&self) -> BusKind {
        (**self).interface()
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        (**self).initialise(bus)
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        (**self).sample()
    }

    fn is_initialised(&self) -> bool {
        (**self).is_initialised()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CÁLCULO
// ═══════════════════════════════════════════════════════════════════════════════

/// Transformação pura sobre o blackboard
///
/// Lê variáveis de entrada e escreve a(s) variável(is) de saída. Sem I/O.
/// Se uma entrada obrigatória falta, retorna
/// [`CalculationError::InputMissing`](crate::error::CalculationError::InputMissing)
/// sem tocar no blackboard.
pub trait CalculationModule: Debug {
    /// Nome do módulo (para logs)
    fn name(&self) -> &str;

    /// Aplica a transformação
    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()>;
}

impl<C: CalculationModule + ?Sized> CalculationModule for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
        (**self).calculate(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CalculationError, DeviceError};

    #[derive(Debug, Default)]
    struct Constant {
        ready: bool,
    }

    impl Device for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn interface(&self) -> BusKind {
            BusKind::None
        }

        fn initialise(&mut self, _bus: BusHandle) -> DeviceResult<()> {
            self.ready = true;
            Ok(())
        }

        fn sample(&mut self) -> DeviceResult<Blackboard> {
            if !self.ready {
                return Err(DeviceError::NotInitialised(self.name().into()));
            }
            Ok([("x", 5)].into_iter().collect())
        }

        fn is_initialised(&self) -> bool {
            self.ready
        }
    }

    #[derive(Debug)]
    struct Double;

    impl CalculationModule for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn calculate(&self, board: &mut Blackboard) -> CalculationResult<()> {
            let x = board.get_f64("x").ok_or_else(|| CalculationError::InputMissing {
                module: self.name().into(),
                variable: "x".into(),
            })?;
            board.insert("y", x * 2.0);
            Ok(())
        }
    }

    #[test]
    fn test_boxed_device_lifecycle() {
        let mut device: Box<dyn Device> = Box::new(Constant::default());
        assert!(matches!(device.sample(), Err(DeviceError::NotInitialised(_))));
        device.initialise(BusHandle::None).unwrap();
        assert!(device.is_initialised());
        assert_eq!(device.sample().unwrap().get_f64("x"), Some(5.0));
    }

    #[test]
    fn test_boxed_calculation() {
        let module: Box<dyn CalculationModule> = Box::new(Double);
        let mut board: Blackboard = [("x", 4)].into_iter().collect();
        module.calculate(&mut board).unwrap();
        assert_eq!(board.get_f64("y"), Some(8.0));

        let mut empty = Blackboard::new();
        assert!(module.calculate(&mut empty).is_err());
        assert!(empty.is_empty());
    }
}
