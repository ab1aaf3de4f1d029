//! Modos de amostragem sobre as pilhas configuradas
//!
//! | Modo | Pilhas por ciclo | Espera após o ciclo |
//! |:-----|:-----------------|:--------------------|
//! | `single` | só a primeira | período |
//! | `multi_merged` | todas, mescladas | período |
//! | `multi_individual` | uma, em rodízio | período só depois da última |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use sensa_core::Blackboard;

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::stack::SensingStack;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerMode {
    Single,
    #[default]
    MultiMerged,
    MultiIndividual,
}

/// Resultado de um ciclo
#[derive(Debug)]
pub struct Cycle {
    /// Blackboard a publicar (vazio se nenhuma pilha produziu dados)
    pub board: Blackboard,
    /// Espera até o próximo ciclo
    pub delay: Duration,
    /// Falhas contidas, uma por pilha
    pub failures: Vec<OrchestrationError>,
}

impl Cycle {
    /// Alguma pilha produziu dados?
    pub fn has_data(&self) -> bool {
        !self.board.is_empty()
    }
}

#[derive(Debug)]
pub struct Sampler {
    mode: SamplerMode,
    period: Duration,
    stacks: Vec<SensingStack>,
    next: usize,
}

impl Sampler {
    pub fn new(mode: SamplerMode, period: Duration, stacks: Vec<SensingStack>) -> OrchestrationResult<Self> {
        if stacks.is_empty() {
            return Err(OrchestrationError::NoStacks);
        }
        if mode == SamplerMode::Single && stacks.len() > 1 {
            warn!(
                configured = stacks.len(),
                used = stacks[0].name(),
                "single mode samples only the first stack"
            );
        }
        Ok(Self {
            mode,
            period,
            stacks,
            next: 0,
        })
    }

    pub fn mode(&self) -> SamplerMode {
        self.mode
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stacks(&self) -> &[SensingStack] {
        &self.stacks
    }

    pub fn stacks_mut(&mut self) -> &mut [SensingStack] {
        &mut self.stacks
    }

    /// Executa um ciclo conforme o modo
    pub fn cycle(&mut self) -> Cycle {
        let mut cycle = Cycle {
            board: Blackboard::new(),
            delay: self.period,
            failures: Vec::new(),
        };
        match self.mode {
            SamplerMode::Single => {
                self.run_stack(0, &mut cycle);
            }
            SamplerMode::MultiMerged => {
                for index in 0..self.stacks.len() {
                    self.run_stack(index, &mut cycle);
                }
            }
            SamplerMode::MultiIndividual => {
                let index = self.next;
                self.run_stack(index, &mut cycle);
                self.next = (index + 1) % self.stacks.len();
                if self.next != 0 {
                    cycle.delay = Duration::ZERO;
                }
            }
        }
        cycle
    }

    fn run_stack(&mut self, index: usize, cycle: &mut Cycle) {
        let stack = &mut self.stacks[index];
        match stack.execute() {
            Ok(board) => cycle.board.merge(board),
            Err(source) => {
                error!(stack = stack.name(), device = stack.device().name(), error = %source, "stack sample failed");
                cycle.failures.push(OrchestrationError::Device {
                    stack: stack.name().to_string(),
                    source,
                });
            }
        }
    }
}
