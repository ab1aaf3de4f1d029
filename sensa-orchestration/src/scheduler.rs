//! Scheduler do laço de amostragem
//!
//! O intervalo vem de cada [`Cycle`](crate::sampler::Cycle): o modo
//! `multi_individual` pede espera zero entre pilhas e o período só no fim
//! da volta.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Modo de execução do scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Intervalo medido de início a início de ciclo
    FixedRate,
    /// Intervalo inteiro após o fim de cada ciclo
    #[default]
    FixedDelay,
}

/// Scheduler de ciclos
#[derive(Debug)]
pub struct Scheduler {
    mode: SchedulerMode,
    started: Option<Instant>,
    last_tick: Option<Instant>,
    tick_count: u64,
    missed_ticks: u64,
    total_execution_time: Duration,
    min_execution_time: Option<Duration>,
    max_execution_time: Option<Duration>,
}

impl Scheduler {
    pub fn new(mode: SchedulerMode) -> Self {
        Self {
            mode,
            started: None,
            last_tick: None,
            tick_count: 0,
            missed_ticks: 0,
            total_execution_time: Duration::ZERO,
            min_execution_time: None,
            max_execution_time: None,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// Aguarda até o próximo tick
    ///
    /// O primeiro tick nunca espera.
    pub fn wait_for_next_tick(&mut self, interval: Duration) -> TickInfo {
        let now = Instant::now();
        let mut on_time = true;

        if let Some(last) = self.last_tick {
            match self.mode {
                SchedulerMode::FixedRate => {
                    let elapsed = now.duration_since(last);
                    if elapsed < interval {
                        std::thread::sleep(interval - elapsed);
                    } else if !interval.is_zero() && elapsed >= interval * 2 {
                        let missed = (elapsed.as_secs_f64() / interval.as_secs_f64()) as u64 - 1;
                        self.missed_ticks += missed;
                        on_time = false;
                        warn!(missed, elapsed_ms = elapsed.as_millis() as u64, "sampling overran its period");
                    }
                }
                SchedulerMode::FixedDelay => {
                    if !interval.is_zero() {
                        std::thread::sleep(interval);
                    }
                }
            }
        }

        let tick = Instant::now();
        self.started.get_or_insert(tick);
        self.last_tick = Some(tick);
        self.tick_count += 1;

        TickInfo {
            tick_number: self.tick_count,
            waited: tick.duration_since(now),
            on_time,
        }
    }

    /// Registra tempo de execução de um ciclo
    pub fn record_execution_time(&mut self, duration: Duration) {
        self.total_execution_time += duration;
        self.min_execution_time = Some(self.min_execution_time.map_or(duration, |min| min.min(duration)));
        self.max_execution_time = Some(self.max_execution_time.map_or(duration, |max| max.max(duration)));
    }

    pub fn stats(&self) -> SchedulerStats {
        let avg_execution_time = match u32::try_from(self.tick_count) {
            Ok(ticks) if ticks > 0 => self.total_execution_time / ticks,
            _ => Duration::ZERO,
        };

        let actual_rate_hz = match (self.started, self.last_tick) {
            (Some(start), Some(last)) if self.tick_count > 1 && last > start => {
                (self.tick_count - 1) as f64 / last.duration_since(start).as_secs_f64()
            }
            _ => 0.0,
        };

        SchedulerStats {
            tick_count: self.tick_count,
            missed_ticks: self.missed_ticks,
            actual_rate_hz,
            avg_execution_time,
            min_execution_time: self.min_execution_time.unwrap_or(Duration::ZERO),
            max_execution_time: self.max_execution_time.unwrap_or(Duration::ZERO),
        }
    }

    /// Reseta estatísticas
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn missed_ticks(&self) -> u64 {
        self.missed_ticks
    }

    /// Menos de 1% de ticks perdidos?
    pub fn is_on_time(&self) -> bool {
        if self.tick_count == 0 {
            return true;
        }
        (self.missed_ticks as f64 / self.tick_count as f64) < 0.01
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerMode::default())
    }
}

/// Informações sobre um tick
#[derive(Debug, Clone)]
pub struct TickInfo {
    pub tick_number: u64,
    /// Tempo efetivamente dormido antes do tick
    pub waited: Duration,
    /// `false` quando ticks inteiros foram perdidos
    pub on_time: bool,
}

/// Estatísticas do scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub tick_count: u64,
    pub missed_ticks: u64,
    /// Ticks por segundo desde o primeiro tick
    pub actual_rate_hz: f64,
    pub avg_execution_time: Duration,
    pub min_execution_time: Duration,
    pub max_execution_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::default();
        assert_eq!(scheduler.tick_count(), 0);
        assert_eq!(scheduler.missed_ticks(), 0);
        assert_eq!(scheduler.mode(), SchedulerMode::FixedDelay);
    }

    #[test]
    fn test_first_tick_does_not_wait() {
        let mut scheduler = Scheduler::new(SchedulerMode::FixedDelay);
        let start = Instant::now();
        let tick = scheduler.wait_for_next_tick(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(tick.tick_number, 1);
    }

    #[test]
    fn test_fixed_delay_sleeps_interval() {
        let mut scheduler = Scheduler::new(SchedulerMode::FixedDelay);
        scheduler.wait_for_next_tick(Duration::from_millis(5));
        let tick = scheduler.wait_for_next_tick(Duration::from_millis(5));
        assert!(tick.waited >= Duration::from_millis(5));
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[test]
    fn test_zero_interval_does_not_sleep() {
        let mut scheduler = Scheduler::new(SchedulerMode::FixedRate);
        let start = Instant::now();
        for _ in 0..10 {
            scheduler.wait_for_next_tick(Duration::ZERO);
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(scheduler.missed_ticks(), 0);
    }

    #[test]
    fn test_fixed_rate_counts_missed_ticks() {
        let mut scheduler = Scheduler::new(SchedulerMode::FixedRate);
        scheduler.wait_for_next_tick(Duration::from_millis(2));
        std::thread::sleep(Duration::from_millis(10));
        let tick = scheduler.wait_for_next_tick(Duration::from_millis(2));
        assert!(!tick.on_time);
        assert!(scheduler.missed_ticks() >= 3);
        assert!(!scheduler.is_on_time());
    }

    #[test]
    fn test_execution_time_recording() {
        let mut scheduler = Scheduler::default();
        scheduler.record_execution_time(Duration::from_millis(5));
        scheduler.record_execution_time(Duration::from_millis(10));
        scheduler.record_execution_time(Duration::from_millis(3));

        let stats = scheduler.stats();
        assert_eq!(stats.min_execution_time, Duration::from_millis(3));
        assert_eq!(stats.max_execution_time, Duration::from_millis(10));
    }

    #[test]
    fn test_scheduler_reset() {
        let mut scheduler = Scheduler::new(SchedulerMode::FixedRate);
        scheduler.wait_for_next_tick(Duration::ZERO);
        scheduler.record_execution_time(Duration::from_millis(1));
        scheduler.reset();
        assert_eq!(scheduler.tick_count(), 0);
        assert_eq!(scheduler.stats().max_execution_time, Duration::ZERO);
        assert_eq!(scheduler.mode(), SchedulerMode::FixedRate);
    }
}
