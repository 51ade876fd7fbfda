#![no_main]
use libfuzzer_sys::fuzz_target;
use molintake_chem::{parse_sdf_record, SdfBlocks};

fuzz_target!(|data: &[u8]| {
    for block in SdfBlocks::new(data).flatten() {
        let _ = parse_sdf_record(&block.text);
    }
});
