#![no_main]

use geoflat::*;
use libfuzzer_sys::fuzz_target;
use std::io;

fuzz_target!(|data: &[u8]| {
    let dbf = match DbfReader::open(io::Cursor::new(data)) {
        Ok(n) => n,
        Err(_) => return,
    };
    let mut dbf = dbf.select_all();
    for i in 0..dbf.row_count().min(1000) {
        if dbf.read_row(i).is_err() {
            return;
        }
    }
});
