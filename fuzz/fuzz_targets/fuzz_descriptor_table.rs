#![no_main]

use bindery_runtime::DescriptorTable;
use libfuzzer_sys::fuzz_target;

// Parsing never panics, and every level up to the reported depth is readable.
fuzz_target!(|data: &[u8]| {
    let Ok(src) = std::str::from_utf8(data) else {
        return;
    };
    for table in [
        DescriptorTable::from_toml_str(src),
        DescriptorTable::from_json_str(src),
    ]
    .into_iter()
    .flatten()
    {
        let Some(depth) = table.depth() else {
            continue;
        };
        for level in 0..=depth.min(64) {
            if let Some(descriptors) = table.level(level) {
                for descriptor in &descriptors {
                    if let Some(binding) = &descriptor.model {
                        let _ = binding.validate(&descriptor.field);
                    }
                }
            }
        }
        if let Some(next) = depth.checked_add(1) {
            assert!(table.level(next).is_none());
        }
    }
});
