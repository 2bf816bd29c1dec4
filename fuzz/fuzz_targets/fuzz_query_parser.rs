#![no_main]

use libfuzzer_sys::fuzz_target;
use qrw::query::{parse, print, SearchKind};

fuzz_target!(|data: &str| {
    // Parsing must never panic, and a printed tree must parse to the same text
    for kind in [SearchKind::Standard, SearchKind::Regexp] {
        if let Ok(nodes) = parse(data, kind) {
            let printed = print(&nodes);
            let reparsed = parse(&printed, kind)
                .unwrap_or_else(|e| panic!("printed query {printed:?} does not parse: {e}"));
            assert_eq!(print(&reparsed), printed);
        }
    }
});
