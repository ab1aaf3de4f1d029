//! Testes de integração para sensa-devices

use sensa_bus::mock::{MockI2c, MockOneWire, MockSpi};
use sensa_core::prelude::*;
use sensa_devices::*;

fn variables(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn table(src: &str) -> toml::Table {
    toml::from_str(src).unwrap()
}

#[test]
fn test_devices_share_one_i2c_bus() {
    let bus = MockI2c::new()
        // BMP280, datasheet
        .with_register(0x76, &[0xD0], &[0x58])
        .with_register(
            0x76,
            &[0x88],
            &[
                0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27,
                0x0B, 0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
            ],
        )
        .with_register(0x76, &[0xF7], &[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00])
        // SHT40, alta resolução
        .with_register(0x44, &[0xFD], &[0xBE, 0xEF, 0x92, 0x66, 0x66, 0x93])
        // MLX90614
        .with_register(0x5A, &[0x07], &[0xF7, 0x3A])
        .shared();

    let mut bmp = DeviceKind::Bmp280
        .build(table(""), &variables(&[("P", "pressure"), ("T", "t_bmp")]))
        .unwrap();
    let mut sht = DeviceKind::Sht40
        .build(table(""), &variables(&[("RH", "humidity"), ("T", "t_sht")]))
        .unwrap();
    let mut mlx = DeviceKind::Mlx90614.build(table(""), &Variables::new()).unwrap();

    bmp.initialise(BusHandle::shared_i2c(bus.clone())).unwrap();
    sht.initialise(BusHandle::shared_i2c(bus.clone())).unwrap();
    mlx.initialise(BusHandle::shared_i2c(bus.clone())).unwrap();

    let mut board = bmp.sample().unwrap();
    board.merge(sht.sample().unwrap());
    board.merge(mlx.sample().unwrap());

    assert!((board.get_f64("t_bmp").unwrap() - 25.08).abs() < 0.01);
    assert!((board.get_f64("pressure").unwrap() - 100653.27).abs() < 0.01);
    assert!(board.get_f64("humidity").is_some());
    assert_eq!(board.get_f64("temperature"), Some(28.75));
}

#[test]
fn test_sample_before_initialise_for_every_bus_device() {
    let vars = variables(&[
        ("P", "p"),
        ("T", "t"),
        ("RH", "rh"),
        ("v_in", "v"),
        ("dig_in", "d"),
        ("I_in", "i"),
        ("V_in", "v"),
        ("thd_v", "tv"),
        ("thd_i", "ti"),
    ]);
    for kind in DeviceKind::ALL {
        if kind == DeviceKind::Mock {
            continue;
        }
        let mut device = kind.build(table(""), &vars).unwrap();
        assert!(!device.is_initialised(), "{}", kind);
        assert!(
            matches!(device.sample(), Err(DeviceError::NotInitialised(_))),
            "{} sampled without a bus",
            kind
        );
    }
}

#[test]
fn test_channel_bounds_accept_range_reject_neighbours() {
    let cases: [(DeviceKind, &str, i64, i64); 4] = [
        (DeviceKind::SequentAdc16, "adc_channel", 1, 16),
        (DeviceKind::GroveAdcHat, "adc_channel", 0, 15),
        (DeviceKind::SequentDin16, "gpio_channel", 1, 16),
        (DeviceKind::SequentDin8, "gpio_channel", 1, 8),
    ];
    let vars = variables(&[("v_in", "v"), ("dig_in", "d")]);

    for (kind, key, min, max) in cases {
        let build = |channel: &str| {
            let mut device = kind.build(table(&format!("{} = {}", key, channel)), &vars).unwrap();
            let bus = MockI2c::new()
                .with_device(0x58)
                .with_device(0x27)
                .with_register(0x08, &[0x00], &[0x04, 0x00]);
            device.initialise(BusHandle::i2c(bus)).unwrap();
            device
        };

        for channel in min..=max {
            assert!(build(&channel.to_string()).sample().is_ok(), "{} channel {}", kind, channel);
        }
        for channel in [min - 1, max + 1] {
            assert!(
                matches!(
                    build(&channel.to_string()).sample(),
                    Err(DeviceError::InvalidChannel(ChannelError::OutOfRange { .. }))
                ),
                "{} channel {}",
                kind,
                channel
            );
        }
        assert!(matches!(
            build("1.5").sample(),
            Err(DeviceError::InvalidChannel(ChannelError::WrongType { .. }))
        ));
    }
}

#[test]
fn test_spi_devices_on_shared_bus() {
    let spi = MockSpi::new()
        .with_response(&[0x00, 0x00])
        .with_response(&[0x00, 0x03, 0xFF])
        .shared();

    let mut rtd = DeviceKind::Max31865.build(table("R_Ref = 430.0"), &Variables::new()).unwrap();
    let mut adc = DeviceKind::Mcp3004
        .build(table("adc_channel = 1"), &variables(&[("v_in", "v")]))
        .unwrap();
    rtd.initialise(BusHandle::shared_spi(spi.clone())).unwrap();
    adc.initialise(BusHandle::shared_spi(spi.clone())).unwrap();

    let v = adc.sample().unwrap().get_f64("v").unwrap();
    assert!((v - 1023.0 / 1024.0 * 3.3).abs() < 1e-12);
    assert_eq!(spi.borrow().transfers().len(), 2);
}

#[test]
fn test_one_wire_from_config() {
    let bus = MockOneWire::new().with_device(
        "28-00000abcdef0",
        &["aa bb : crc=bb YES", "aa bb t=19500"],
    );
    let mut device = DeviceKind::Ds18b20
        .build(table("channel = 1"), &variables(&[("temperature", "water_t")]))
        .unwrap();
    device.initialise(BusHandle::one_wire(bus)).unwrap();
    assert_eq!(device.sample().unwrap().get_f64("water_t"), Some(19.5));
}

#[test]
fn test_wrong_interface_is_reported() {
    let mut device = DeviceKind::Ds18b20.build(table(""), &Variables::new()).unwrap();
    let err = device.initialise(BusHandle::i2c(MockI2c::new())).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::WrongInterface {
            expected: BusKind::OneWire,
            found: BusKind::I2c,
            ..
        }
    ));
}
