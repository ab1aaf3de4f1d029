//! # 🎭 Sensa-Orchestration — Composição e Laço de Amostragem
//!
//! Liga dispositivos e módulos de cálculo em pilhas de sensoriamento, amostra
//! as pilhas conforme o modo configurado e publica cada blackboard.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Orchestrator                        │
//! │  Scheduler ──tick──▶ Sampler ──blackboard──▶ MessageSink │
//! │                        │                                 │
//! │        ┌───────────────┼───────────────┐                 │
//! │   SensingStack    SensingStack    SensingStack           │
//! │   Device → Pipeline → constantes → prefixo               │
//! └──────────────────────────────────────────────────────────┘
//!            ▲
//!            │ Registry (Config TOML → objetos)
//! ```
//!
//! ## Exemplo
//!
//! ```
//! use sensa_orchestration::{Config, Registry};
//!
//! let config: Config = r#"
//!     [devices.m]
//!     model = "mock"
//!     config = { value = 5 }
//!     variables = { variable = "x" }
//!
//!     [stacks.s1]
//!     device = "m"
//!     prefix = "s1_"
//!     constants = { y = 10, z = 1 }
//! "#
//! .parse()
//! .unwrap();
//!
//! let mut registry = Registry::build(&config).unwrap();
//! registry.initialise().unwrap();
//! let mut sampler = registry.into_sampler().unwrap();
//! let cycle = sampler.cycle();
//! assert_eq!(cycle.board.get_f64("s1_y"), Some(10.0));
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod sampler;
pub mod scheduler;
pub mod sink;
pub mod stack;

pub use config::{
    CalculationConfig, Config, DeviceConfig, InterfaceConfig, PipelineConfig, SamplerConfig, SinkConfig,
    StackConfig,
};
pub use error::{
    ConfigError, ConfigResult, OrchestrationError, OrchestrationResult, SinkError, SinkResult,
};
pub use orchestrator::{Orchestrator, RunSummary};
pub use pipeline::Pipeline;
pub use registry::{InterfaceOpener, Registry, SystemInterfaces};
pub use sampler::{Cycle, Sampler, SamplerMode};
pub use scheduler::{Scheduler, SchedulerMode, SchedulerStats, TickInfo};
pub use sink::{JsonLinesSink, MessageSink, TcpJsonSink};
pub use stack::SensingStack;
