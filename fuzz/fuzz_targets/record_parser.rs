#![no_main]

use libfuzzer_sys::fuzz_target;
use agentwatch_tail::RecordParser;

fuzz_target!(|data: &[u8]| {
    let parser = RecordParser::new(64 * 1024);
    // 임의 바이트에 대해 Ok/Err 어느 쪽이든 패닉 없이 반환해야 함
    if let Err(e) = parser.parse_line(data) {
        assert!(e.preview.chars().count() <= 50);
    }
});
