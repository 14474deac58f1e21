use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::fs::File;
use std::path::Path;

use tracing::debug;

use crate::types::{Result, Error, Dimensions, ImageFormat, ImageMetadata, ColorSpace, ExifMap, AttributeMap};
use crate::traits::LoadableMetadata;
use crate::detector::{self, MAGIC_LEN};
use crate::formats::{bmp, gif, jpeg, png, webp};
use crate::utils::read_up_to;

/// Typed metadata of an image of any of the supported formats.
#[derive(Clone, PartialEq, Debug)]
pub enum GenericMetadata {
    Jpeg(jpeg::Metadata),
    Png(png::Metadata),
    Gif(gif::Metadata),
    Webp(webp::Metadata),
    Bmp(bmp::Metadata)
}

impl GenericMetadata {
    pub fn format(&self) -> ImageFormat {
        match *self {
            GenericMetadata::Jpeg(_) => ImageFormat::Jpeg,
            GenericMetadata::Png(_) => ImageFormat::Png,
            GenericMetadata::Gif(_) => ImageFormat::Gif,
            GenericMetadata::Webp(_) => ImageFormat::Webp,
            GenericMetadata::Bmp(_) => ImageFormat::Bmp
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match *self {
            GenericMetadata::Jpeg(ref md) => md.dimensions,
            GenericMetadata::Png(ref md) => md.dimensions,
            GenericMetadata::Gif(ref md) => md.dimensions,
            GenericMetadata::Webp(ref md) => md.dimensions(),
            GenericMetadata::Bmp(ref md) => md.dimensions
        }
    }

    #[inline]
    pub fn mime_type(&self) -> &'static str {
        self.format().mime_type()
    }

    /// Flattens the typed metadata into the uniform record; format-specific fields end up
    /// in `additional`.
    pub fn into_record(self, file_size: u64) -> ImageMetadata {
        let dims = self.dimensions();
        let mut record = ImageMetadata {
            format: self.format(),
            width: dims.width,
            height: dims.height,
            file_size: file_size,
            color_depth: 0,
            color_space: ColorSpace::Unknown,
            has_icc_profile: false,
            exif: ExifMap::new(),
            additional: AttributeMap::new(),
            warning: None
        };

        match self {
            GenericMetadata::Jpeg(md) => fill_jpeg(md, &mut record),
            GenericMetadata::Png(md) => fill_png(md, &mut record),
            GenericMetadata::Gif(md) => fill_gif(md, &mut record),
            GenericMetadata::Webp(md) => fill_webp(md, &mut record),
            GenericMetadata::Bmp(md) => fill_bmp(md, &mut record)
        }

        record
    }
}

fn fill_bmp(md: bmp::Metadata, rec: &mut ImageMetadata) {
    rec.color_depth = md.bits_per_pixel as u32;
    rec.color_space = md.color_space();

    let a = &mut rec.additional;
    a.insert("FileSizeFromHeader", md.file_size.into());
    a.insert("DataOffset", md.data_offset.into());
    a.insert("Planes", md.planes.into());
    if let bmp::DibHeader::Info(info) = md.header {
        a.insert("TopDown", info.top_down.into());
        a.insert("Compression", info.compression.code().into());
        if let Some(name) = info.compression.name() {
            a.insert("CompressionName", name.into());
        }
        a.insert("ImageSize", info.image_size.into());
        a.insert("XPixelsPerMeter", info.x_pixels_per_meter.into());
        a.insert("YPixelsPerMeter", info.y_pixels_per_meter.into());
        a.insert("ColorsUsed", info.colors_used.into());
        a.insert("ColorsImportant", info.colors_important.into());
    }
}

fn fill_png(md: png::Metadata, rec: &mut ImageMetadata) {
    rec.color_depth = md.bit_depth as u32;
    rec.color_space = md.color_type.color_space();
    rec.has_icc_profile = md.has_icc_profile;
    rec.exif = md.exif;
    rec.warning = md.warning;

    let a = &mut rec.additional;
    a.insert("BitDepth", md.bit_depth.into());
    a.insert("ColorType", md.color_type.code().into());
    a.insert("CompressionMethod", md.compression_method.into());
    a.insert("FilterMethod", md.filter_method.into());
    a.insert("InterlaceMethod", md.interlace_method.code().into());
}

fn fill_gif(md: gif::Metadata, rec: &mut ImageMetadata) {
    rec.color_depth = md.color_resolution as u32 * 3;
    rec.color_space = ColorSpace::Indexed;
    rec.warning = md.warning;

    let a = &mut rec.additional;
    a.insert("Version", md.version.as_str().into());
    a.insert("GlobalColorTable", md.global_color_table.is_some().into());
    a.insert("SortFlag", md.declared_color_table.sorted.into());
    a.insert("GlobalColorTableSize", md.declared_color_table.bits().into());
    a.insert("ColorResolution", md.color_resolution.into());
    a.insert("BackgroundColorIndex", md.background_color_index.into());
    a.insert("PixelAspectRatio", md.pixel_aspect_ratio.into());
    a.insert("HasTransparency", md.has_transparency.into());
    a.insert("HasAnimation", md.has_animation.into());
    a.insert("FrameCount", md.frames.into());
}

fn fill_jpeg(md: jpeg::Metadata, rec: &mut ImageMetadata) {
    rec.color_depth = md.sample_precision as u32 * 3;
    rec.color_space = md.color_space();
    rec.has_icc_profile = md.has_icc_profile;

    let a = &mut rec.additional;
    a.insert("BitsPerSample", md.sample_precision.into());
    if let Some(n) = md.components {
        a.insert("Components", n.into());
    }
    a.insert("CodingProcess", md.coding_process.name().into());
    a.insert("EntropyCoding", md.entropy_coding.name().into());
    a.insert("Differential", md.differential.into());

    rec.exif = md.exif;
    rec.warning = md.warning;
}

fn fill_webp(md: webp::Metadata, rec: &mut ImageMetadata) {
    rec.color_depth = md.color_depth();
    rec.color_space = if md.has_alpha() { ColorSpace::Rgba } else { ColorSpace::Rgb };
    rec.additional.insert("HasAlpha", md.has_alpha().into());
    rec.additional.insert("HasAnimation", md.has_animation().into());

    if let webp::Metadata::VP8X(x) = md {
        rec.has_icc_profile = x.icc;
        let a = &mut rec.additional;
        a.insert("ICC", x.icc.into());
        a.insert("Alpha", x.alpha.into());
        a.insert("EXIF", x.exif.into());
        a.insert("XMP", x.xmp.into());
        a.insert("Animation", x.animation.into());
        rec.exif = x.exif_tags;
        rec.warning = x.warning;
    }
}

/// Decodes the typed metadata of an image whose format is already known.
///
/// The source is rewound to its first byte before decoding.
pub fn decode<R: ?Sized + Read + Seek>(format: ImageFormat, r: &mut R) -> Result<GenericMetadata> {
    r.seek(SeekFrom::Start(0))?;
    let md = match format {
        ImageFormat::Jpeg => GenericMetadata::Jpeg(jpeg::Metadata::load(r)?),
        ImageFormat::Png => GenericMetadata::Png(png::Metadata::load(r)?),
        ImageFormat::Gif => GenericMetadata::Gif(gif::Metadata::load(r)?),
        ImageFormat::Webp => GenericMetadata::Webp(webp::Metadata::load(r)?),
        ImageFormat::Bmp => GenericMetadata::Bmp(bmp::Metadata::load(r)?)
    };
    Ok(md)
}

/// Detects the format of the image in `r` from its leading bytes and extracts its metadata.
///
/// `file_size` is copied into the record as is.
pub fn extract_metadata<R: ?Sized + Read + Seek>(r: &mut R, file_size: u64) -> Result<ImageMetadata> {
    r.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; MAGIC_LEN];
    let n = read_up_to(r, &mut magic)?;

    let format = detector::detect(&magic[..n]).ok_or(Error::UnsupportedFormat)?;
    debug!(%format, file_size, "detected image format");

    decode(format, r).map(|md| md.into_record(file_size))
}

/// Extracts metadata of the image stored in the file at `p`.
pub fn load_from_file<P: AsRef<Path>>(p: P) -> Result<ImageMetadata> {
    let f = File::open(p)?;
    let file_size = f.metadata()?.len();
    extract_metadata(&mut BufReader::new(f), file_size)
}

/// Extracts metadata of the image stored in `buf`.
#[inline]
pub fn load_from_buf(buf: &[u8]) -> Result<ImageMetadata> {
    extract_metadata(&mut Cursor::new(buf), buf.len() as u64)
}

/// Reads `r` to its end and extracts metadata of the image it contained.
///
/// For sources which cannot seek; the whole image is buffered in memory.
pub fn load_from_reader<R: Read>(mut r: R) -> Result<ImageMetadata> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    load_from_buf(&buf)
}
