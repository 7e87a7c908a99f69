#![no_main]

use libfuzzer_sys::fuzz_target;
use usagescope::{IndexConfig, UsageIndex};

fuzz_target!(|data: &[u8]| {
    let mut index = UsageIndex::new(IndexConfig::unfiltered());
    let _ = index.ingest(data);
});
