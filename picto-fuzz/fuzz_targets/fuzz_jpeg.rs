#![no_main]

use image::ImageDecoder;
use libfuzzer_sys::fuzz_target;
use picto_jpeg::DecodeSettings;
use picto_jpeg::integration::JpegDecoder;

fuzz_target!(|data: &[u8]| {
    // Keep allocations small enough to not time out.
    let settings = DecodeSettings {
        max_pixels: 2500 * 2500,
    };

    if let Ok(info) = picto_jpeg::read_info(data) {
        assert!(info.width > 0 && info.height > 0);
    }

    if let Ok(decoder) = JpegDecoder::with_settings(data, &settings) {
        let mut buf = vec![0_u8; decoder.total_bytes() as usize];
        let _ = decoder.read_image(&mut buf);
    }
});
