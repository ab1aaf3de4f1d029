//! Nome de modelo configurado → dispositivo construído

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::debug;

use sensa_core::Device;
use sensa_core::error::{DeviceError, DeviceResult};

use crate::ads1115::Ads1115;
use crate::bc_robotics::BcRoboticsAdc16;
use crate::bmp280::Bmp280;
use crate::common::Variables;
use crate::ens160::Ens160;
use crate::grove_adc::GroveAdcHat;
use crate::max31865::Max31865;
use crate::mcp300x::{Mcp300x, Mcp300xVariant};
use crate::mlx90614::Mlx90614;
use crate::mock::MockDevice;
use crate::modbus_meter::ModbusMeter;
use crate::one_wire_thermo::{OneWireThermometer, ThermometerFamily};
use crate::sen55::Sen55;
use crate::sequent::{DigitalInputBoard, SequentAdc16, SequentDigitalInputs, SequentRtd8};
use crate::sht4x::Sht4x;

/// Modelos de dispositivo conhecidos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Bmp280,
    Sht40,
    Max31865,
    Mcp3008,
    Mcp3004,
    GroveAdcHat,
    Ads1115,
    BcRoboticsAdc16,
    SequentAdc16,
    SequentRtd8,
    SequentDin16,
    SequentDin8,
    Ds18b20,
    Ds18s20,
    Ds1822,
    Ds1825,
    Ds28ea00,
    Mlx90614,
    Ens160,
    Sen55,
    ModbusMeter,
    Mock,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 22] = [
        DeviceKind::Bmp280,
        DeviceKind::Sht40,
        DeviceKind::Max31865,
        DeviceKind::Mcp3008,
        DeviceKind::Mcp3004,
        DeviceKind::GroveAdcHat,
        DeviceKind::Ads1115,
        DeviceKind::BcRoboticsAdc16,
        DeviceKind::SequentAdc16,
        DeviceKind::SequentRtd8,
        DeviceKind::SequentDin16,
        DeviceKind::SequentDin8,
        DeviceKind::Ds18b20,
        DeviceKind::Ds18s20,
        DeviceKind::Ds1822,
        DeviceKind::Ds1825,
        DeviceKind::Ds28ea00,
        DeviceKind::Mlx90614,
        DeviceKind::Ens160,
        DeviceKind::Sen55,
        DeviceKind::ModbusMeter,
        DeviceKind::Mock,
    ];

    /// Nome usado no campo `model` da configuração
    pub fn model(&self) -> &'static str {
        match self {
            DeviceKind::Bmp280 => "bmp280",
            DeviceKind::Sht40 => "sht40",
            DeviceKind::Max31865 => "max31865",
            DeviceKind::Mcp3008 => "mcp3008",
            DeviceKind::Mcp3004 => "mcp3004",
            DeviceKind::GroveAdcHat => "grove_adc_hat",
            DeviceKind::Ads1115 => "ads1115",
            DeviceKind::BcRoboticsAdc16 => "bc_robotics_adc16",
            DeviceKind::SequentAdc16 => "sequent_adc16",
            DeviceKind::SequentRtd8 => "sequent_rtd8",
            DeviceKind::SequentDin16 => "sequent_din16",
            DeviceKind::SequentDin8 => "sequent_din8",
            DeviceKind::Ds18b20 => "ds18b20",
            DeviceKind::Ds18s20 => "ds18s20",
            DeviceKind::Ds1822 => "ds1822",
            DeviceKind::Ds1825 => "ds1825",
            DeviceKind::Ds28ea00 => "ds28ea00",
            DeviceKind::Mlx90614 => "mlx90614",
            DeviceKind::Ens160 => "ens160",
            DeviceKind::Sen55 => "sen55",
            DeviceKind::ModbusMeter => "modbus_meter",
            DeviceKind::Mock => "mock",
        }
    }

    /// Constrói o dispositivo a partir da tabela `config` e do mapa de variáveis
    pub fn build(&self, config: toml::Table, variables: &Variables) -> DeviceResult<Box<dyn Device>> {
        let model = self.model();
        debug!(model, "building device");
        let device: Box<dyn Device> = match self {
            DeviceKind::Bmp280 => Box::new(Bmp280::new(parse(model, config)?, variables)?),
            DeviceKind::Sht40 => Box::new(Sht4x::new(parse(model, config)?, variables)?),
            DeviceKind::Max31865 => Box::new(Max31865::new(parse(model, config)?, variables)?),
            DeviceKind::Mcp3008 => Box::new(Mcp300x::new(
                Mcp300xVariant::Mcp3008,
                parse(model, config)?,
                variables,
            )?),
            DeviceKind::Mcp3004 => Box::new(Mcp300x::new(
                Mcp300xVariant::Mcp3004,
                parse(model, config)?,
                variables,
            )?),
            DeviceKind::GroveAdcHat => Box::new(GroveAdcHat::new(parse(model, config)?, variables)?),
            DeviceKind::Ads1115 => Box::new(Ads1115::new(parse(model, config)?, variables)?),
            DeviceKind::BcRoboticsAdc16 => {
                Box::new(BcRoboticsAdc16::new(parse(model, config)?, variables)?)
            }
            DeviceKind::SequentAdc16 => Box::new(SequentAdc16::new(parse(model, config)?, variables)?),
            DeviceKind::SequentRtd8 => Box::new(SequentRtd8::new(parse(model, config)?, variables)?),
            DeviceKind::SequentDin16 => Box::new(SequentDigitalInputs::new(
                DigitalInputBoard::Inputs16,
                parse(model, config)?,
                variables,
            )?),
            DeviceKind::SequentDin8 => Box::new(SequentDigitalInputs::new(
                DigitalInputBoard::Inputs8,
                parse(model, config)?,
                variables,
            )?),
            DeviceKind::Ds18b20 => thermometer(ThermometerFamily::Ds18b20, model, config, variables)?,
            DeviceKind::Ds18s20 => thermometer(ThermometerFamily::Ds18s20, model, config, variables)?,
            DeviceKind::Ds1822 => thermometer(ThermometerFamily::Ds1822, model, config, variables)?,
            DeviceKind::Ds1825 => thermometer(ThermometerFamily::Ds1825, model, config, variables)?,
            DeviceKind::Ds28ea00 => thermometer(ThermometerFamily::Ds28ea00, model, config, variables)?,
            DeviceKind::Mlx90614 => Box::new(Mlx90614::new(parse(model, config)?, variables)?),
            DeviceKind::Ens160 => Box::new(Ens160::new(parse(model, config)?, variables)?),
            DeviceKind::Sen55 => Box::new(Sen55::new(parse(model, config)?, variables)?),
            DeviceKind::ModbusMeter => Box::new(ModbusMeter::new(parse(model, config)?, variables)?),
            DeviceKind::Mock => Box::new(MockDevice::new(parse(model, config)?, variables)?),
        };
        Ok(device)
    }
}

fn thermometer(
    family: ThermometerFamily,
    model: &str,
    config: toml::Table,
    variables: &Variables,
) -> DeviceResult<Box<dyn Device>> {
    Ok(Box::new(OneWireThermometer::new(family, parse(model, config)?, variables)?))
}

fn parse<C: DeserializeOwned>(model: &str, config: toml::Table) -> DeviceResult<C> {
    toml::Value::Table(config)
        .try_into()
        .map_err(|e| DeviceError::InvalidConfig(format!("{}: {}", model, e)))
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model())
    }
}

impl FromStr for DeviceKind {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.model() == lower)
            .ok_or_else(|| DeviceError::InvalidConfig(format!("unknown device model '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensa_core::BusKind;

    #[test]
    fn test_model_names_round_trip() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.model().parse::<DeviceKind>().unwrap(), kind);
        }
        assert_eq!("SHT40".parse::<DeviceKind>().unwrap(), DeviceKind::Sht40);
        assert!("bme680".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_build_mock() {
        let config: toml::Table = toml::from_str("value = 2.5").unwrap();
        let vars: Variables = [("variable".to_string(), "v".to_string())].into_iter().collect();
        let mut dev = DeviceKind::Mock.build(config, &vars).unwrap();
        assert_eq!(dev.interface(), BusKind::None);
        assert_eq!(dev.sample().unwrap().get_f64("v"), Some(2.5));
    }

    #[test]
    fn test_build_reports_bad_config() {
        let config: toml::Table = toml::from_str("i2c_address = \"not a number\"").unwrap();
        let err = DeviceKind::Mlx90614.build(config, &Variables::new()).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfig(msg) if msg.starts_with("mlx90614")));
    }

    #[test]
    fn test_build_checks_variables() {
        let err = DeviceKind::Mcp3008
            .build(toml::Table::new(), &Variables::new())
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfig(_)));
    }

    #[test]
    fn test_interface_per_kind() {
        let table = || toml::Table::new();
        let vars: Variables = [("v_in", "v"), ("dig_in", "d")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(DeviceKind::Mcp3004.build(table(), &vars).unwrap().interface(), BusKind::Spi);
        assert_eq!(DeviceKind::SequentDin8.build(table(), &vars).unwrap().interface(), BusKind::I2c);
        assert_eq!(DeviceKind::Ds1822.build(table(), &vars).unwrap().interface(), BusKind::OneWire);
        assert_eq!(DeviceKind::Ads1115.build(table(), &vars).unwrap().interface(), BusKind::I2c);
        assert_eq!(
            DeviceKind::BcRoboticsAdc16.build(table(), &vars).unwrap().interface(),
            BusKind::Spi
        );
    }

    #[test]
    fn test_build_ads1115_rejects_unknown_gain() {
        let config: toml::Table = toml::from_str("full_scale_voltage = 5.0").unwrap();
        let vars: Variables = [("v_in".to_string(), "v".to_string())].into_iter().collect();
        let err = DeviceKind::Ads1115.build(config, &vars).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfig(msg) if msg.contains("full scale")));
    }
}
