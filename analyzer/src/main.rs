use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::prelude::*;

use imx::{GenericMetadata, ImageMetadata};
use imx::formats::{bmp, gif, jpeg, png, webp};

/// Loads and displays metadata from image files.
#[derive(Parser, Debug)]
#[command(name = "imx-analyzer", version)]
struct Args {
    /// Input files.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print the records as JSON instead of text.
    #[arg(long, conflicts_with = "typed")]
    json: bool,

    /// Print the format-specific metadata instead of the uniform record.
    #[arg(long)]
    typed: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut failed = false;
    for path in &args.files {
        let result = if args.typed {
            load_typed(path).map(|md| print_typed(path, md))
        } else {
            imx::load_from_file(path).map(|md| {
                if args.json {
                    print_json(&md)
                } else {
                    print_record(path, &md)
                }
            })
        };

        if let Err(e) = result {
            let _ = writeln!(io::stderr(), "Cannot load image metadata from {}: {}", path.display(), e);
            failed = true;
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn load_typed(path: &Path) -> imx::Result<GenericMetadata> {
    let mut f = BufReader::new(File::open(path)?);
    let mut magic = Vec::with_capacity(imx::MAGIC_LEN);
    (&mut f).take(imx::MAGIC_LEN as u64).read_to_end(&mut magic)?;
    let format = imx::detect(&magic).ok_or(imx::Error::UnsupportedFormat)?;
    debug!(path = %path.display(), %format, "decoding");
    imx::decode(format, &mut f)
}

fn print_json(md: &ImageMetadata) {
    match serde_json::to_string_pretty(md) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            let _ = writeln!(io::stderr(), "Cannot serialize metadata: {}", e);
        }
    }
}

fn print_record(path: &Path, md: &ImageMetadata) {
    println!("{}:", path.display());
    println!("  Format: {} ({})", md.format, md.mime_type());
    println!("  Dimensions: {}", md.dimensions());
    println!("  File size: {} bytes", md.file_size);
    println!("  Color depth: {}", md.color_depth);
    println!("  Color space: {}", md.color_space);
    println!("  ICC profile: {}", md.has_icc_profile);
    if !md.exif.is_empty() {
        println!("  EXIF:");
        for (tag, value) in &md.exif {
            println!("    {}: {}", tag, value);
        }
    }
    if !md.additional.is_empty() {
        println!("  Additional:");
        for (name, value) in &md.additional {
            println!("    {}: {}", name, value);
        }
    }
    if let Some(ref warning) = md.warning {
        println!("  Warning: {}", warning);
    }
}

fn print_typed(path: &Path, md: GenericMetadata) {
    println!("{}:", path.display());
    match md {
        GenericMetadata::Jpeg(md) => print_jpeg_metadata(md),
        GenericMetadata::Png(md) => print_png_metadata(md),
        GenericMetadata::Gif(md) => print_gif_metadata(md),
        GenericMetadata::Webp(md) => print_webp_metadata(md),
        GenericMetadata::Bmp(md) => print_bmp_metadata(md),
    }
}

fn print_jpeg_metadata(md: jpeg::Metadata) {
    println!("JPEG image:");
    println!("  Width: {}", md.dimensions.width);
    println!("  Height: {}", md.dimensions.height);
    println!("  Sample precision: {}", md.sample_precision);
    match md.components {
        Some(n) => println!("  Components: {}", n),
        None => println!("  Components: unknown"),
    }
    println!("  Coding process: {}", md.coding_process.name());
    println!("  Entropy coding: {}", md.entropy_coding.name());
    println!("  Differential: {}", md.differential);
    println!("  ICC profile: {}", md.has_icc_profile);
    println!("  EXIF tags: {}", md.exif.len());
}

fn print_png_metadata(md: png::Metadata) {
    println!("PNG image:");
    println!("  Width: {}", md.dimensions.width);
    println!("  Height: {}", md.dimensions.height);
    println!("  Bit depth: {}", md.bit_depth);
    println!("  Color type: {:?}", md.color_type);
    println!("  Compression method: {}", md.compression_method);
    println!("  Filter method: {}", md.filter_method);
    println!("  Interlace method: {:?}", md.interlace_method);
    println!("  ICC profile: {}", md.has_icc_profile);
    println!("  EXIF tags: {}", md.exif.len());
}

fn print_gif_metadata(md: gif::Metadata) {
    println!("GIF image:");
    println!("  Version: {}", md.version.as_str());
    println!("  Logical screen width: {}", md.dimensions.width);
    println!("  Logical screen height: {}", md.dimensions.height);
    match md.global_color_table {
        Some(ref table) => {
            println!("  Global color table: {} colors", table.size);
            println!("    Sorted: {}", table.sorted);
        }
        None => println!("  Global color table: none"),
    }
    println!("  Color resolution: {}", md.color_resolution);
    println!("  Background color index: {}", md.background_color_index);
    match md.pixel_aspect_ratio_approx() {
        Some(r) => println!("  Pixel aspect ratio: {:.3}", r),
        None => println!("  Pixel aspect ratio: unknown"),
    }
    println!("  Frames: {}", md.frames);
    println!("  Transparency: {}", md.has_transparency);
    println!("  Animation: {}", md.has_animation);
}

fn print_webp_metadata(md: webp::Metadata) {
    match md {
        webp::Metadata::VP8(md) => {
            println!("WebP image, lossy (VP8):");
            println!("  Width: {}", md.dimensions.width);
            println!("  Height: {}", md.dimensions.height);
            println!("  Version: {}", md.version_number);
            println!("  Show frame: {}", md.show_frame);
            println!("  First partition length: {}", md.first_partition_len);
            println!("  Horizontal scale: {}", md.x_scale);
            println!("  Vertical scale: {}", md.y_scale);
        }
        webp::Metadata::VP8L(md) => {
            println!("WebP image, lossless (VP8L):");
            println!("  Width: {}", md.dimensions.width);
            println!("  Height: {}", md.dimensions.height);
            println!("  Alpha is used: {}", md.alpha_is_used);
            println!("  Version: {}", md.version_number);
        }
        webp::Metadata::VP8X(md) => {
            println!("WebP image, extended (VP8X):");
            println!("  Canvas width: {}", md.dimensions.width);
            println!("  Canvas height: {}", md.dimensions.height);
            println!("  ICC: {}", md.icc);
            println!("  Alpha: {}", md.alpha);
            println!("  EXIF: {}", md.exif);
            println!("  XMP: {}", md.xmp);
            println!("  Animation: {}", md.animation);
            println!("  EXIF tags: {}", md.exif_tags.len());
        }
    }
}

fn print_bmp_metadata(md: bmp::Metadata) {
    println!("BMP image:");
    println!("  Width: {}", md.dimensions.width);
    println!("  Height: {}", md.dimensions.height);
    println!("  DIB header size: {}", md.dib_header_size);
    println!("  Planes: {}", md.planes);
    println!("  Bits per pixel: {}", md.bits_per_pixel);
    println!("  Pixel data offset: {}", md.data_offset);
    if let bmp::DibHeader::Info(ref info) = md.header {
        println!("  Top-down: {}", info.top_down);
        println!("  Compression: {}", info.compression.name().unwrap_or("unknown"));
        println!("  Image size: {}", info.image_size);
        println!("  Resolution: {}x{} px/m", info.x_pixels_per_meter, info.y_pixels_per_meter);
        println!("  Colors used: {}", info.colors_used);
        println!("  Important colors: {}", info.colors_important);
    }
}
