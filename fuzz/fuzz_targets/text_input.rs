#![no_main]

use {
    graphwire::{from_text, to_text},
    libfuzzer_sys::fuzz_target,
    std::collections::BTreeMap,
};

macro_rules! fuzz_roundtrip {
    ($data:expr, $ty:ty) => {
        if let Ok(mut value) = from_text::<$ty>($data) {
            let serialized = to_text(&mut value).expect("serialize should succeed");
            let roundtrip: $ty =
                from_text(&serialized).expect("roundtrip deserialize should succeed");
            assert_eq!(value, roundtrip, "roundtrip failed for {}", stringify!($ty));
        }
    };
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    fuzz_roundtrip!(text, i64);
    fuzz_roundtrip!(text, String);
    fuzz_roundtrip!(text, Vec<bool>);
    fuzz_roundtrip!(text, BTreeMap<String, u16>);
});
