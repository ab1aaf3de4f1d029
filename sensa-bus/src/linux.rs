//! Barramentos Linux (`/dev/i2c-N`, `/dev/spidevB.C`)

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use tracing::{debug, info};

use sensa_core::bus::{SpiBus, SpiMode};
use sensa_core::error::{BusError, BusResult};

use crate::hal::{HalI2c, HalSpi};

/// Abre `/dev/i2c-{bus}`
pub fn open_i2c(bus: u8) -> BusResult<HalI2c<I2cdev>> {
    let path = format!("/dev/i2c-{}", bus);
    let dev = I2cdev::new(&path).map_err(|e| BusError::Transport(format!("{}: {:?}", path, e)))?;
    info!(path = %path, "I2C bus opened");
    Ok(HalI2c::new(dev))
}

fn mode_flags(mode: SpiMode) -> SpiModeFlags {
    match mode.bits() {
        0 => SpiModeFlags::SPI_MODE_0,
        1 => SpiModeFlags::SPI_MODE_1,
        2 => SpiModeFlags::SPI_MODE_2,
        _ => SpiModeFlags::SPI_MODE_3,
    }
}

/// Um `/dev/spidevB.C` aberto e o modo configurado nele
struct Chip {
    device: SpidevDevice,
    mode: SpiMode,
}

impl Chip {
    fn open(bus: u8, chip_select: u8, speed_hz: u32, mode: SpiMode) -> BusResult<Self> {
        let path = format!("/dev/spidev{}.{}", bus, chip_select);
        let device =
            SpidevDevice::open(&path).map_err(|e| BusError::Transport(format!("{}: {:?}", path, e)))?;
        let mut chip = Self { device, mode };
        chip.configure(speed_hz, mode)?;
        info!(path = %path, speed_hz, mode = mode.bits(), "SPI device opened");
        Ok(chip)
    }

    fn configure(&mut self, speed_hz: u32, mode: SpiMode) -> BusResult<()> {
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(mode_flags(mode))
            .build();
        self.device.0.configure(&options)?;
        self.mode = mode;
        Ok(())
    }

    fn transfer(&mut self, speed_hz: u32, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        if let Some(requested) = mode
            && requested != self.mode
        {
            debug!(mode = requested.bits(), "Reconfiguring SPI mode");
            self.configure(speed_hz, requested)?;
        }
        let mut spi = HalSpi::new(&mut self.device, self.mode);
        spi.transfer(words, None)
    }
}

/// SPI sobre spidev com troca de modo por transação
///
/// O chip select da interface é aberto em [`open`](Self::open); outras
/// linhas do mesmo barramento são abertas na primeira `transfer_on`.
pub struct LinuxSpi {
    bus: u8,
    chip_select: u8,
    speed_hz: u32,
    mode: SpiMode,
    chips: BTreeMap<u8, Chip>,
}

impl LinuxSpi {
    /// Abre `/dev/spidev{bus}.{chip_select}`
    pub fn open(bus: u8, chip_select: u8, speed_hz: u32, mode: SpiMode) -> BusResult<Self> {
        let chip = Chip::open(bus, chip_select, speed_hz, mode)?;
        Ok(Self {
            bus,
            chip_select,
            speed_hz,
            mode,
            chips: BTreeMap::from([(chip_select, chip)]),
        })
    }
}

impl SpiBus for LinuxSpi {
    fn transfer(&mut self, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        self.transfer_on(self.chip_select, words, mode)
    }

    fn transfer_on(&mut self, chip_select: u8, words: &[u8], mode: Option<SpiMode>) -> BusResult<Vec<u8>> {
        let chip = match self.chips.entry(chip_select) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Chip::open(self.bus, chip_select, self.speed_hz, self.mode)?),
        };
        chip.transfer(self.speed_hz, words, mode)
    }
}
