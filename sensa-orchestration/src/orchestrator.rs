//! Laço de amostragem: scheduler → sampler → sink

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::OrchestrationResult;
use crate::registry::{InterfaceOpener, Registry, SystemInterfaces};
use crate::sampler::Sampler;
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::sink::{self, MessageSink};

/// Contadores acumulados do laço
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub published: u64,
    /// Ciclos sem nenhum dado
    pub empty_cycles: u64,
    pub stack_failures: u64,
    pub sink_failures: u64,
}

/// Dono do sampler, do scheduler e do sink
pub struct Orchestrator {
    sampler: Sampler,
    scheduler: Scheduler,
    sink: Box<dyn MessageSink>,
    next_delay: Duration,
    summary: RunSummary,
}

impl Orchestrator {
    pub fn new(sampler: Sampler, scheduler: Scheduler, sink: Box<dyn MessageSink>) -> Self {
        Self {
            sampler,
            scheduler,
            sink,
            next_delay: Duration::ZERO,
            summary: RunSummary::default(),
        }
    }

    /// Monta, inicializa e conecta tudo a partir da configuração
    pub fn from_config(config: &Config) -> OrchestrationResult<Self> {
        Self::from_config_with(config, &mut SystemInterfaces, sink::from_config(&config.sink))
    }

    /// Como [`from_config`](Self::from_config), com interfaces e sink próprios
    pub fn from_config_with(
        config: &Config,
        opener: &mut dyn InterfaceOpener,
        sink: Box<dyn MessageSink>,
    ) -> OrchestrationResult<Self> {
        let mut registry = Registry::build_with(config, opener)?;
        registry.initialise()?;
        let sampler = registry.into_sampler()?;
        info!(
            mode = ?sampler.mode(),
            period_ms = sampler.period().as_millis() as u64,
            stacks = sampler.stacks().len(),
            "sampler ready"
        );
        Ok(Self::new(sampler, Scheduler::new(config.sampler.scheduler), sink))
    }

    /// Espera o intervalo pendente e executa um ciclo
    pub fn tick(&mut self) {
        self.scheduler.wait_for_next_tick(self.next_delay);

        let start = Instant::now();
        let cycle = self.sampler.cycle();
        self.next_delay = cycle.delay;

        self.summary.cycles += 1;
        self.summary.stack_failures += cycle.failures.len() as u64;

        if cycle.has_data() {
            match self.sink.publish(&cycle.board) {
                Ok(()) => {
                    self.summary.published += 1;
                    debug!(keys = cycle.board.len(), "cycle published");
                }
                Err(err) => {
                    self.summary.sink_failures += 1;
                    error!(error = %err, "failed to publish cycle");
                }
            }
        } else {
            self.summary.empty_cycles += 1;
            warn!(failures = cycle.failures.len(), "cycle produced no data");
        }

        self.scheduler.record_execution_time(start.elapsed());
    }

    /// Executa `cycles` ciclos
    pub fn run_cycles(&mut self, cycles: u64) -> &RunSummary {
        for _ in 0..cycles {
            self.tick();
        }
        &self.summary
    }

    /// Executa indefinidamente
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
            if self.scheduler.tick_count() % 100 == 0 {
                let stats = self.scheduler.stats();
                info!(
                    ticks = stats.tick_count,
                    missed = stats.missed_ticks,
                    rate_hz = stats.actual_rate_hz,
                    avg_us = stats.avg_execution_time.as_micros() as u64,
                    "scheduler stats"
                );
            }
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sampler", &self.sampler)
            .field("summary", &self.summary)
            .finish()
    }
}
