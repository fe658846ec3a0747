#![no_main]

use keyhouse_core::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Walk arbitrary bytes as a stream of record frames. Decoding must
    // never panic, and every frame that decodes must re-encode to the
    // exact bytes it came from.
    let mut buf = data;
    let mut pos = 0;
    while let Ok((record, consumed)) = Record::decode(&mut buf) {
        let reencoded = record.encode().expect("decoded record must re-encode");
        assert_eq!(&reencoded[..], &data[pos..pos + consumed]);
        pos += consumed;
    }
});
