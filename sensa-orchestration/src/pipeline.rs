//! Pipeline: sequência ordenada de módulos de cálculo
//!
//! Cada módulo roda sobre uma cópia do blackboard, que só substitui o
//! original se o módulo terminar sem erro. Uma falha vira no-op para aquele
//! módulo e o pipeline segue para o próximo.

use std::fmt;

use tracing::{error, trace, warn};

use sensa_core::{Blackboard, CalculationError, CalculationModule};

/// Módulo nomeado dentro do pipeline
struct Stage {
    name: String,
    module: Box<dyn CalculationModule>,
}

/// Pipeline de cálculo
#[derive(Default)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Cria pipeline vazio
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acrescenta um módulo ao final
    pub fn push(&mut self, name: impl Into<String>, module: Box<dyn CalculationModule>) {
        self.stages.push(Stage {
            name: name.into(),
            module,
        });
    }

    /// Builder de [`push`](Self::push)
    pub fn with(mut self, name: impl Into<String>, module: Box<dyn CalculationModule>) -> Self {
        self.push(name, module);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Nomes dos módulos na ordem de execução
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.name.as_str())
    }

    /// Aplica todos os módulos, em ordem, ao blackboard
    ///
    /// Nunca aborta: falhas são registradas e o blackboard segue inalterado
    /// para o próximo módulo. Retorna quantos módulos falharam.
    pub fn run(&self, board: &mut Blackboard) -> usize {
        let mut failures = 0;
        for stage in &self.stages {
            let mut candidate = board.clone();
            match stage.module.calculate(&mut candidate) {
                Ok(()) => {
                    trace!(pipeline = %self.name, module = %stage.name, "module applied");
                    *board = candidate;
                }
                Err(err @ CalculationError::InputMissing { .. }) => {
                    failures += 1;
                    warn!(pipeline = %self.name, module = %stage.name, error = %err, "module skipped");
                }
                Err(err) => {
                    failures += 1;
                    error!(pipeline = %self.name, module = %stage.name, error = %err, "module failed");
                }
            }
        }
        failures
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("modules", &self.module_names().collect::<Vec<_>>())
            .finish()
    }
}
