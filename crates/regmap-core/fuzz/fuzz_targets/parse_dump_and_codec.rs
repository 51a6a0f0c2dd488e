#![no_main]

use libfuzzer_sys::fuzz_target;
use regmap_core::{
    bits_to_value, format_register_dump, parse_register_dump, value_to_bits, Element, Number,
    QFormat,
};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(pairs) = parse_register_dump(&text) {
        let rendered = format_register_dump(None, &pairs);
        let reparsed = parse_register_dump(&rendered).expect("formatted dump must parse");
        assert_eq!(reparsed, pairs);
    }

    if data.len() < 10 {
        return;
    }

    let a = u32::from(data[0] % 64) + 1;
    let b = u32::from(data[1] % 64);
    let mut word = [0_u8; 8];
    word.copy_from_slice(&data[2..10]);
    let raw = u64::from_be_bytes(word);

    if let Ok(format) = QFormat::new(a, b) {
        let mut rounded = false;
        let number = Number::from_bits_with(raw, format, &mut |_| rounded = true);
        assert!(format.limit_guard(number.value()).is_ok());
        let mask = u64::MAX >> (64 - format.n_bits());
        assert_eq!(value_to_bits(number.value(), format), Ok(number.bits()));
        assert_eq!(rounded, number.bits() != raw & mask);
        if format.n_bits() <= 53 {
            assert_eq!(bits_to_value(raw, format), number.value());
            assert!(!rounded);
        }
    }

    let idx = u32::from(data[0] % 64);
    let width = u32::from(data[1] % 64) + 1;
    if let Ok(mut element) = Element::new("f", idx, width) {
        element.load_value(raw);
        assert_eq!(element.shifted_value(), raw & element.mask());
    }
});
