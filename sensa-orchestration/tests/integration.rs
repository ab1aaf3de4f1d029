//! Testes de integração para sensa-orchestration

use std::io::Write;

use sensa_bus::{MockI2c, MockModbus, MockOneWire};
use sensa_core::{BusHandle, BusResult, Value};
use sensa_orchestration::{
    Config, InterfaceConfig, JsonLinesSink, MessageSink, Orchestrator, Registry, SamplerMode,
};

const PLANT: &str = r#"
    [interfaces.i2c]
    kind = "i2c"
    bus = 1

    [interfaces.w1]
    kind = "one_wire"
    root = "/unused"

    [interfaces.meter]
    kind = "modbus_tcp"
    address = "127.0.0.1:502"

    [devices.ir]
    model = "mlx90614"
    interface = "i2c"

    [devices.pt100]
    model = "ds18b20"
    interface = "w1"
    variables = { temperature = "water" }

    [devices.meter]
    model = "modbus_meter"
    interface = "meter"
    variables = { I_in = "current", V_in = "voltage", thd_v = "thd_v", thd_i = "thd_i" }

    [calculations.power]
    module = "current_to_power"
    config = { line_voltage = 230.0, phases = 3 }
    variables = { rms_current_out = "current", power_in = "power" }

    [calculations.site]
    module = "default_constant"
    config = { value = 7 }
    variables = { variable = "site" }

    [pipelines.meter]
    modules = ["power", "site"]

    [stacks.ir]
    device = "ir"
    prefix = "ir_"

    [stacks.pt100]
    device = "pt100"
    constants = { tank = 2 }

    [stacks.meter]
    device = "meter"
    pipeline = "meter"

    [sampler]
    mode = "multi_merged"
    period_secs = 0.0
    stacks = ["meter", "pt100", "ir"]
"#;

fn f32_words(value: f32) -> [u16; 2] {
    let bits = value.to_bits();
    [(bits & 0xFFFF) as u16, (bits >> 16) as u16]
}

fn plant_buses(_: &str, config: &InterfaceConfig) -> BusResult<BusHandle> {
    Ok(match config {
        InterfaceConfig::I2c { .. } => {
            BusHandle::i2c(MockI2c::new().with_register(0x5A, &[0x07], &[0xF7, 0x3A]))
        }
        InterfaceConfig::OneWire { .. } => BusHandle::one_wire(MockOneWire::new().with_device(
            "28-000005e2fdc3",
            &[
                "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES",
                "72 01 4b 46 7f ff 0e 10 57 t=23125",
            ],
        )),
        InterfaceConfig::ModbusTcp { .. } => {
            let [v0, v1] = f32_words(230.5);
            let [i0, i1] = f32_words(2.0);
            let [tv0, tv1] = f32_words(1.5);
            let [ti0, ti1] = f32_words(12.25);
            BusHandle::modbus(
                MockModbus::new()
                    .with_registers(1, 0x0006, &[v0, v1])
                    .with_registers(1, 0x000C, &[i0, i1])
                    .with_registers(1, 0x0054, &[tv0, tv1])
                    .with_registers(1, 0x005A, &[ti0, ti1]),
            )
        }
        _ => BusHandle::None,
    })
}

#[test]
fn test_plant_cycle_merges_all_stacks() {
    let config: Config = PLANT.parse().unwrap();
    let mut registry = Registry::build_with(&config, &mut plant_buses).unwrap();
    registry.initialise().unwrap();
    let mut sampler = registry.into_sampler().unwrap();
    assert_eq!(sampler.mode(), SamplerMode::MultiMerged);

    let cycle = sampler.cycle();
    assert!(cycle.failures.is_empty(), "{:?}", cycle.failures);

    let board = cycle.board;
    assert!((board.get_f64("ir_temperature").unwrap() - 28.75).abs() < 1e-9);
    assert!((board.get_f64("water").unwrap() - 23.125).abs() < 1e-9);
    assert_eq!(board.get("tank"), Some(Value::Int(2)));
    assert!((board.get_f64("voltage").unwrap() - 230.5).abs() < 1e-4);
    assert!((board.get_f64("power").unwrap() - 3.0 * 2.0 * 230.0).abs() < 1e-6);
    assert_eq!(board.get("site"), Some(Value::Int(7)));
}

#[test]
fn test_failing_stack_does_not_stop_the_cycle() {
    let config: Config = PLANT.parse().unwrap();
    let mut opener = |name: &str, interface: &InterfaceConfig| match interface {
        InterfaceConfig::I2c { .. } => Ok(BusHandle::i2c(MockI2c::new())),
        other => plant_buses(name, other),
    };
    let mut registry = Registry::build_with(&config, &mut opener).unwrap();
    registry.initialise().unwrap();
    let mut sampler = registry.into_sampler().unwrap();

    let cycle = sampler.cycle();
    assert_eq!(cycle.failures.len(), 1);
    assert!(cycle.failures[0].to_string().contains("'ir'"));
    assert!(cycle.board.contains_key("water"));
    assert!(!cycle.board.contains_key("ir_temperature"));
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [devices.m]
        model = "mock"
        config = {{ value = 5 }}
        variables = {{ variable = "x" }}

        [stacks.s1]
        device = "m"
        prefix = "s1_"
        constants = {{ y = 10, z = 1 }}

        [sampler]
        mode = "single"
        period_secs = 0.0
        "#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let reparsed: Config = config.to_toml().unwrap().parse().unwrap();
    assert_eq!(reparsed.stacks, config.stacks);

    let mut registry = Registry::build(&reparsed).unwrap();
    registry.initialise().unwrap();
    let board = registry.stack_mut("s1").unwrap().execute().unwrap();
    assert_eq!(serde_json::to_string(&board).unwrap(), r#"{"s1_x":5,"s1_y":10,"s1_z":1}"#);
}

#[test]
fn test_orchestrator_writes_json_lines() {
    let config: Config = PLANT.parse().unwrap();

    #[derive(Clone, Default)]
    struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let output = Shared::default();
    let sink: Box<dyn MessageSink> = Box::new(JsonLinesSink::new(output.clone()));
    let mut orchestrator = Orchestrator::from_config_with(&config, &mut plant_buses, sink).unwrap();
    let summary = orchestrator.run_cycles(2).clone();
    assert_eq!(summary.published, 2);
    assert_eq!(summary.stack_failures, 0);

    let text = String::from_utf8(output.0.borrow().clone()).unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]["timestamp"].is_u64());
    assert_eq!(lines[1]["site"], 7);
}
