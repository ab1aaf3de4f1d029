//! Pilha de sensoriamento: dispositivo + pipeline + constantes + prefixo

use std::rc::Rc;

use tracing::debug;

use sensa_core::{Blackboard, BusHandle, Device, DeviceResult};

use crate::pipeline::Pipeline;

/// Liga um dispositivo a um pipeline
///
/// ```text
/// sample() → pipeline → {...constantes, ...saída} → prefixo
/// ```
///
/// O pipeline é compartilhável entre pilhas (módulos de cálculo não guardam
/// estado); o dispositivo é exclusivo.
#[derive(Debug)]
pub struct SensingStack {
    name: String,
    device: Box<dyn Device>,
    pipeline: Rc<Pipeline>,
    constants: Blackboard,
    prefix: Option<String>,
}

impl SensingStack {
    pub fn new(name: impl Into<String>, device: Box<dyn Device>, pipeline: Rc<Pipeline>) -> Self {
        Self {
            name: name.into(),
            device,
            pipeline,
            constants: Blackboard::new(),
            prefix: None,
        }
    }

    /// Constantes mescladas sob a saída do pipeline
    pub fn with_constants(mut self, constants: Blackboard) -> Self {
        self.constants = constants;
        self
    }

    /// Prefixo aplicado a todas as chaves de saída
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Entrega o barramento ao dispositivo
    pub fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        debug!(stack = %self.name, device = self.device.name(), bus = %bus.kind(), "initialising stack");
        self.device.initialise(bus)
    }

    /// Um ciclo completo da pilha
    pub fn execute(&mut self) -> DeviceResult<Blackboard> {
        let mut board = self.device.sample()?;
        self.pipeline.run(&mut board);
        board.merge_defaults(&self.constants);
        Ok(match &self.prefix {
            Some(prefix) => board.prefixed(prefix),
            None => board,
        })
    }
}
