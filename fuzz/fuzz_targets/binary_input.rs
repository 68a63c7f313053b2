#![no_main]

use {
    graphwire::{from_bytes, to_bytes, Serialize},
    libfuzzer_sys::fuzz_target,
    std::{collections::BTreeMap, rc::Rc},
};

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct Node {
    id: u32,
    name: String,
    tags: Vec<String>,
    parent: Option<Rc<Node>>,
}

macro_rules! fuzz_roundtrip {
    ($data:expr, $ty:ty) => {
        if let Ok(mut value) = from_bytes::<$ty>($data) {
            let serialized = to_bytes(&mut value).expect("serialize should succeed");
            let roundtrip: $ty =
                from_bytes(&serialized).expect("roundtrip deserialize should succeed");
            assert_eq!(value, roundtrip, "roundtrip failed for {}", stringify!($ty));
        }
    };
}

fuzz_target!(|data: &[u8]| {
    fuzz_roundtrip!(data, u64);
    fuzz_roundtrip!(data, String);
    fuzz_roundtrip!(data, Vec<(u8, char)>);
    fuzz_roundtrip!(data, BTreeMap<i32, Vec<u8>>);
    fuzz_roundtrip!(data, Node);
    fuzz_roundtrip!(data, Vec<Node>);
});
