//! Termômetros one-wire da família DS18x20
//!
//! O kernel expõe cada sensor como um arquivo `w1_slave` de duas linhas:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! A primeira linha traz o veredito do CRC; a segunda, a temperatura em
//! milésimos de grau.

use serde::Deserialize;
use tracing::{debug, warn};

use sensa_core::bus::{Bus, BusHandle, BusKind, OneWireBus};
use sensa_core::codec::{ChannelRange, ChannelValue, ChecksumPolicy};
use sensa_core::error::{BusError, DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, validate_channel, variable_or};

/// Modelo da família, identificado pelo prefixo do ID no barramento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermometerFamily {
    Ds18b20,
    Ds18s20,
    Ds1822,
    Ds1825,
    Ds28ea00,
}

impl ThermometerFamily {
    pub const ALL: [ThermometerFamily; 5] = [
        ThermometerFamily::Ds18b20,
        ThermometerFamily::Ds18s20,
        ThermometerFamily::Ds1822,
        ThermometerFamily::Ds1825,
        ThermometerFamily::Ds28ea00,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ThermometerFamily::Ds18b20 => "28",
            ThermometerFamily::Ds18s20 => "10",
            ThermometerFamily::Ds1822 => "22",
            ThermometerFamily::Ds1825 => "3B",
            ThermometerFamily::Ds28ea00 => "42",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThermometerFamily::Ds18b20 => "DS18B20",
            ThermometerFamily::Ds18s20 => "DS18S20",
            ThermometerFamily::Ds1822 => "DS1822",
            ThermometerFamily::Ds1825 => "DS1825",
            ThermometerFamily::Ds28ea00 => "DS28EA00",
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        id.to_ascii_uppercase().starts_with(self.prefix())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OneWireThermometerConfig {
    /// Índice (a partir de 1) entre os sensores da família no barramento
    pub channel: ChannelValue,
    /// ID explícito; tem precedência sobre `channel`
    pub sensor_id: Option<String>,
    pub checksum: ChecksumPolicy,
}

impl Default for OneWireThermometerConfig {
    fn default() -> Self {
        Self {
            channel: ChannelValue::Integer(1),
            sensor_id: None,
            checksum: ChecksumPolicy::Reject,
        }
    }
}

/// CRC-8 Dallas/Maxim (polinômio 0x31 refletido, init 0x00)
pub fn maxim_crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8C } else { crc >> 1 };
        }
        crc
    })
}

fn scratchpad(line: &str) -> Vec<u8> {
    line.split(':')
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|hex| u8::from_str_radix(hex, 16).ok())
        .collect()
}

/// Temperatura em °C a partir das linhas de `w1_slave`
pub fn decode_w1_slave(device: &str, lines: &[String], policy: ChecksumPolicy) -> DeviceResult<f64> {
    let [status, data, ..] = lines else {
        return Err(DeviceError::Decode(format!(
            "{}: expected 2 lines, got {}",
            device,
            lines.len()
        )));
    };

    if policy != ChecksumPolicy::Ignore && !status.trim_end().ends_with("YES") {
        let bytes = scratchpad(status);
        let (payload, received) = match bytes.split_last() {
            Some((crc, payload)) => (payload, *crc),
            None => (&[][..], 0),
        };
        let computed = maxim_crc8(payload);
        if policy == ChecksumPolicy::Reject {
            return Err(DeviceError::ChecksumMismatch {
                device: device.to_string(),
                field: "scratchpad".into(),
                received,
                computed,
            });
        }
        warn!(device, received, computed, "one-wire CRC failure, keeping value");
    }

    let millis = data
        .trim()
        .rsplit_once("t=")
        .and_then(|(_, t)| t.parse::<i64>().ok())
        .ok_or_else(|| DeviceError::Decode(format!("{}: no temperature in {:?}", device, data)))?;
    Ok(millis as f64 / 1000.0)
}

#[derive(Debug)]
pub struct OneWireThermometer {
    family: ThermometerFamily,
    config: OneWireThermometerConfig,
    temperature_variable: String,
    sensor_id: Option<String>,
    bus: Option<Bus<dyn OneWireBus>>,
}

impl OneWireThermometer {
    pub fn new(
        family: ThermometerFamily,
        config: OneWireThermometerConfig,
        variables: &Variables,
    ) -> DeviceResult<Self> {
        if let Some(id) = &config.sensor_id
            && !family.matches(id)
        {
            return Err(DeviceError::InvalidConfig(format!(
                "{}: sensor id {} does not start with prefix {}",
                family.name(),
                id,
                family.prefix()
            )));
        }
        Ok(Self {
            family,
            temperature_variable: variable_or(variables, "temperature", "temperature"),
            config,
            sensor_id: None,
            bus: None,
        })
    }

    /// ID resolvido no `initialise`
    pub fn sensor_id(&self) -> Option<&str> {
        self.sensor_id.as_deref()
    }

    fn resolve(&self, bus: &Bus<dyn OneWireBus>) -> DeviceResult<String> {
        let devices = bus.borrow_mut().list_devices()?;

        if let Some(id) = &self.config.sensor_id {
            return if devices.iter().any(|d| d == id) {
                Ok(id.clone())
            } else {
                Err(BusError::DeviceNotFound(id.clone()).into())
            };
        }

        let candidates: Vec<&String> = devices.iter().filter(|d| self.family.matches(d)).collect();
        debug!(family = self.family.name(), ?candidates, "one-wire candidates");

        let range = ChannelRange::new(1, candidates.len() as i64);
        let channel = validate_channel(self.family.name(), range, Some(&self.config.channel))?;
        Ok(candidates[(channel - 1) as usize].clone())
    }
}

impl Device for OneWireThermometer {
    fn name(&self) -> &str {
        self.family.name()
    }

    fn interface(&self) -> BusKind {
        BusKind::OneWire
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_one_wire(self.family.name())?;
        let id = self.resolve(&bus)?;
        debug!(family = self.family.name(), id = %id, "one-wire sensor selected");
        self.sensor_id = Some(id);
        self.bus = Some(bus);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let (Some(bus), Some(id)) = (&self.bus, &self.sensor_id) else {
            return Err(DeviceError::NotInitialised(self.family.name().into()));
        };
        let lines = bus.borrow_mut().read_raw(id)?;
        let temperature = decode_w1_slave(self.family.name(), &lines, self.config.checksum)?;

        let mut board = Blackboard::new();
        board.insert(self.temperature_variable.as_str(), temperature);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
