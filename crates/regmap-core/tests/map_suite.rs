//! Register map integration coverage: invariants, batch loads, and persistence.

#![allow(clippy::pedantic, clippy::nursery, clippy::too_many_lines)]

use std::fs;

use log as _;
use proptest as _;
use regmap_core::{
    read_file, values_comparison, Diagnostic, Element, LogSink, QFormat, Register, RegisterBus,
    RegistersMap, RegmapError, VirtualBus,
};
use rstest::{fixture, rstest};
use serde as _;
use thiserror as _;

const SCHEMA: &str = r#"{
    "name": "ad9833",
    "description": "waveform generator",
    "registers": [
        {
            "name": "CONTROL",
            "code_name": "ctrl",
            "address": 0,
            "description": "control word",
            "default_value": 256,
            "elements": [
                {"name": "reserved0", "idx_lowest_bit": 0, "n_bits": 1, "read_only": true},
                {"name": "mode", "idx_lowest_bit": 1, "n_bits": 1},
                {"name": "reserved2", "idx_lowest_bit": 2, "n_bits": 1, "read_only": true},
                {"name": "div2", "idx_lowest_bit": 3, "n_bits": 1},
                {"name": "reserved4", "idx_lowest_bit": 4, "n_bits": 1, "read_only": true},
                {"name": "opbiten", "idx_lowest_bit": 5, "n_bits": 1},
                {"name": "sleep", "idx_lowest_bit": 6, "n_bits": 2},
                {"name": "reset", "idx_lowest_bit": 8, "n_bits": 1},
                {"name": "reserved9", "idx_lowest_bit": 9, "n_bits": 3, "read_only": true},
                {"name": "hlb", "idx_lowest_bit": 12, "n_bits": 1},
                {"name": "b28", "idx_lowest_bit": 13, "n_bits": 1},
                {"name": "reg_sel", "idx_lowest_bit": 14, "n_bits": 2, "read_only": true}
            ]
        },
        {
            "name": "FREQ0",
            "address": 1,
            "elements": [
                {"name": "freq0_lsb", "idx_lowest_bit": 0, "n_bits": 14},
                {"name": "freq0_sel", "idx_lowest_bit": 14, "n_bits": 2, "value": 1, "read_only": true}
            ]
        },
        {
            "name": "PHASE0",
            "address": 3,
            "elements": [
                {"name": "phase0", "idx_lowest_bit": 0, "n_bits": 12},
                {"name": "phase0_sel", "idx_lowest_bit": 12, "n_bits": 4, "value": 12, "read_only": true}
            ]
        }
    ]
}"#;

#[fixture]
fn device() -> RegistersMap {
    RegistersMap::loads(SCHEMA).expect("schema is valid")
}

#[rstest]
fn schema_loads_with_defaults_filled_in(device: RegistersMap) {
    assert_eq!(device.name(), "ad9833");
    assert_eq!(device.description(), Some("waveform generator"));
    let control = device.register("CONTROL").expect("present");
    assert_eq!(control.code_name(), "ctrl");
    assert_eq!(control.default_value(), 256);
    let freq = device.register("FREQ0").expect("present");
    assert_eq!(freq.code_name(), "FREQ0");
    assert_eq!(freq.default_value(), 0);
    assert_eq!(freq.n_bytes(), 2);
    assert_eq!(freq.value(), 0x4000);
}

#[rstest]
fn dumps_then_loads_reproduces_the_map(mut device: RegistersMap) {
    device.set_element_value("sleep", 3).expect("known");
    device.set_element_value("freq0_lsb", 0x1234).expect("known");
    let restored = RegistersMap::loads(&device.dumps().expect("serializes")).expect("loads");
    assert_eq!(restored.address_name_values(), device.address_name_values());
    assert_eq!(restored, device);
}

#[rstest]
fn write_path_produces_big_endian_register_bytes(mut device: RegistersMap) {
    let register = device.set_element_value("phase0", 0xABC).expect("known");
    assert_eq!(register.value(), 0xCABC);
    assert_eq!(register.bytes(), vec![0xCA, 0xBC]);

    let mut announced = Vec::new();
    let mut bus = VirtualBus::new(&mut |d| announced.push(d));
    assert_eq!(announced, vec![Diagnostic::VirtualDevice]);
    device
        .write_element_to("reset", 1, &mut bus)
        .expect("bus write");
    assert_eq!(bus.writes(), &[vec![0x01, 0x00]]);
}

#[rstest]
fn read_only_selector_bits_survive_user_writes(mut device: RegistersMap) {
    let (register, element) = device.write_element("phase0_sel", 0).expect("known");
    assert_eq!(element.value(), 12);
    assert_eq!(register.value() >> 12, 12);
}

#[rstest]
fn batch_load_continues_past_unknown_addresses(mut device: RegistersMap) {
    let mut seen = Vec::new();
    let applied = device.load_values_with([(0, 1), (999, 2), (3, 0x0FFF)], &mut |d| seen.push(d));
    assert_eq!(applied, 2);
    // Loads come from the device, so the read-only bit 0 takes the value too.
    assert_eq!(device.register_by_address(0).map(Register::value), Some(1));
    assert_eq!(device.value_of_element("phase0").expect("known"), 0xFFF);
    assert_eq!(
        seen,
        vec![Diagnostic::UnknownAddress {
            address: 999,
            value: 2
        }]
    );
}

#[rstest]
fn load_by_element_name_loads_the_owning_register(mut device: RegistersMap) {
    device.load_values_by_name([("b28", 0x2102)]);
    assert_eq!(device.value_of_element("b28").expect("known"), 1);
    assert_eq!(device.value_of_element("reset").expect("known"), 1);
    assert_eq!(device.value_of_element("mode").expect("known"), 1);
}

#[rstest]
fn reset_restores_defaults(mut device: RegistersMap) {
    device.load_values([(0, 0x20AA), (1, 0xFFFF)]);
    device.reset();
    assert_eq!(device.value_of_element("reset").expect("known"), 1);
    assert_eq!(device.register("FREQ0").map(Register::value), Some(0));
}

#[rstest]
fn text_dump_round_trips_through_a_file(mut device: RegistersMap) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.txt");

    device.load_values([(0, 0x1A)]);
    device.save_to_file(&path).expect("save");

    let text = fs::read_to_string(&path).expect("readable");
    assert!(text.starts_with("# ad9833\n"));
    assert!(text.contains("0, 1ah\n"));

    let mut fresh = RegistersMap::loads(SCHEMA).expect("schema");
    let pairs = read_file(&path).expect("parse");
    assert_eq!(pairs, device.addressed_values());
    fresh.load_values(pairs);
    assert_eq!(fresh.register_by_address(0).map(Register::value), Some(0x1A));
}

#[rstest]
fn load_file_reports_applied_lines(mut device: RegistersMap) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("partial.txt");
    fs::write(&path, "# captured\n0, 0x2000\n42, 1h\n").expect("write");

    assert_eq!(device.load_file(&path).expect("load"), 1);
    assert_eq!(device.value_of_element("b28").expect("known"), 1);
}

#[test]
fn load_file_surfaces_io_and_parse_errors() {
    let mut map = RegistersMap::new("empty", Vec::new()).expect("valid");
    let dir = tempfile::tempdir().expect("tempdir");

    let missing = map.load_file(dir.path().join("missing.txt"));
    assert!(matches!(missing, Err(RegmapError::Io(_))));

    let bad = dir.path().join("bad.txt");
    fs::write(&bad, "0, 1h\nnot a line\n").expect("write");
    assert!(matches!(
        map.load_file(&bad),
        Err(RegmapError::Parse { line: 2, .. })
    ));
}

#[rstest]
fn json_file_helpers_round_trip(device: RegistersMap) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("map.json");
    device.save_json_file(&path).expect("save");
    let restored = RegistersMap::load_json_file(&path).expect("load");
    assert_eq!(restored, device);
}

#[test]
fn serialized_schema_uses_the_documented_field_names() {
    let map = RegistersMap::new(
        "m",
        vec![Register::new("R", 4, vec![Element::new("e", 2, 3).expect("valid")]).expect("valid")],
    )
    .expect("valid");
    let value: serde_json::Value = serde_json::from_str(&map.dumps().expect("dumps")).expect("json");
    assert_eq!(value["name"], "m");
    assert!(value["description"].is_null());
    let register = &value["registers"][0];
    for key in ["name", "code_name", "address", "description", "default_value", "elements"] {
        assert!(register.get(key).is_some(), "missing register key {key}");
    }
    let element = &register["elements"][0];
    for key in [
        "name",
        "idx_lowest_bit",
        "n_bits",
        "value",
        "read_only",
        "code_name",
        "description",
    ] {
        assert!(element.get(key).is_some(), "missing element key {key}");
    }
    assert_eq!(element["idx_lowest_bit"], 2);
}

#[rstest]
fn captured_states_compare_by_address(device: RegistersMap) {
    let before = device.addressed_values();
    let mut after_map = device.clone();
    after_map.set_element_value("sleep", 2).expect("known");
    let mut after = after_map.addressed_values();
    after.push((9, 7));

    let rows = values_comparison(&before, &after);
    let flagged: Vec<u32> = rows.iter().filter(|r| r.different).map(|r| r.address).collect();
    assert_eq!(flagged, vec![0, 9]);
    assert_eq!(rows.last().map(|r| r.left), Some(None));
}

#[rstest]
fn bus_read_back_feeds_fixed_point_decoding(mut device: RegistersMap) {
    let mut bus = VirtualBus::new(&mut LogSink);
    bus.write(&[0x0F, 0xFE]).expect("loopback");
    let word = device.read_register_from(3, &mut bus).expect("read");
    assert_eq!(word, 0x0FFE);
    // phase0_sel is read-only but the device value still lands.
    assert_eq!(device.value_of_element("phase0_sel").expect("known"), 0);
    let phase = device.value_of_element("phase0").expect("known");
    let signed = regmap_core::bits_to_value(phase, QFormat::integer(12).expect("12-bit"));
    assert_eq!(signed, -2.0);
}
