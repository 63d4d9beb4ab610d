//! This example shows you how to convert a JPEG image into a PNG file.

#![allow(missing_docs)]

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use image::{GrayImage, RgbaImage};
use picto_jpeg::{DecodeSettings, PixelLayout};

fn main() -> ExitCode {
    #[cfg(feature = "logging")]
    if let Ok(()) = log::set_logger(&LOGGER) {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <input.jpg> <output.png>", args[0]);

        return ExitCode::FAILURE;
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let file = match File::open(input_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open input file: {err}");

            return ExitCode::FAILURE;
        }
    };

    let image = match picto_jpeg::decode(BufReader::new(file), &DecodeSettings::default()) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Failed to decode JPEG: {err}");

            return ExitCode::FAILURE;
        }
    };

    println!(
        "Decoded: {}x{} image ({:?})",
        image.width, image.height, image.color_space
    );

    let saved = match image.layout {
        PixelLayout::Gray => GrayImage::from_raw(image.width, image.height, image.data)
            .map(|gray| gray.save(output_path)),
        PixelLayout::Rgba => RgbaImage::from_raw(image.width, image.height, image.data)
            .map(|rgba| rgba.save(output_path)),
    };

    match saved {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            eprintln!("Failed to save PNG: {err}");

            return ExitCode::FAILURE;
        }
        None => {
            eprintln!("Internal error: Buffer size mismatch");

            return ExitCode::FAILURE;
        }
    }

    eprintln!("Saved: {output_path}");

    ExitCode::SUCCESS
}

/// A simple stderr logger.
#[cfg(feature = "logging")]
static LOGGER: SimpleLogger = SimpleLogger;

#[cfg(feature = "logging")]
struct SimpleLogger;

#[cfg(feature = "logging")]
impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let line = record.line().unwrap_or(0);
            eprintln!("{} (in {}:{}): {}", record.level(), record.target(), line, record.args());
        }
    }

    fn flush(&self) {}
}
