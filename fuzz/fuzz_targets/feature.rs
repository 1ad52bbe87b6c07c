#![no_main]

use geoflat::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&tag, content)) = data.split_first() else {
        return;
    };
    let Ok(file_type) = ShapeType::from_code(i32::from(tag)) else {
        return;
    };
    if let Ok(shape) = decode_shape(content, file_type, 0) {
        let _ = shape.to_geometry();
    }
});
