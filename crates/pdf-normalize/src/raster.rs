//! Raster image → single full-bleed PDF page.
//!
//! The page MediaBox equals the image's pixel dimensions (1 px = 1 pt).
//! JPEG data is embedded as-is with `DCTDecode`; PNG pixels are embedded as a
//! Flate-compressed `DeviceRGB`/`DeviceGray` image with an `SMask` for alpha.
//! Anything else is decoded and re-encoded as PNG first.

use crate::types::*;
use image::{DynamicImage, ImageFormat};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use std::io::Cursor;

/// Build a one-page PDF from JPEG bytes.
pub fn jpeg_to_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    match jpeg_header(bytes) {
        Some(header) if header.components == 1 || header.components == 3 => {
            let color_space = if header.components == 1 {
                "DeviceGray"
            } else {
                "DeviceRGB"
            };
            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => header.width as i64,
                    "Height" => header.height as i64,
                    "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            )
            .with_compression(false);
            single_image_page(image, None, header.width, header.height)
        }
        _ => {
            // CMYK or unparsable header: let the decoder sort it out
            log::debug!("JPEG not embeddable as-is, re-encoding as PNG");
            let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
            png_to_pdf(&encode_png(&decoded)?)
        }
    }
}

/// Build a one-page PDF from PNG bytes.
pub fn png_to_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    dynamic_to_pdf(&decoded)
}

/// Build a one-page PDF from any other raster format the decoder understands.
pub fn other_image_to_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    png_to_pdf(&encode_png(&decoded)?)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn dynamic_to_pdf(image: &DynamicImage) -> Result<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    let has_alpha = image.color().has_alpha();
    let gray = !image.color().has_color();

    let (color_space, pixels) = if gray {
        ("DeviceGray", image.to_luma8().into_raw())
    } else {
        ("DeviceRGB", image.to_rgb8().into_raw())
    };

    let smask = has_alpha.then(|| {
        let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        )
    });

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
            "BitsPerComponent" => 8,
        },
        pixels,
    );

    single_image_page(image, smask, width, height)
}

/// Assemble a document with one page that draws `image` over the whole MediaBox.
fn single_image_page(
    mut image: Stream,
    smask: Option<Stream>,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::Malformed(
            "image has zero width or height".to_string(),
        ));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    if let Some(mask) = smask {
        let mask_id = doc.add_object(mask);
        image.dict.set("SMask", Object::Reference(mask_id));
    }
    let image_id = doc.add_object(image);

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut writer = Vec::new();
    doc.save_to(&mut writer)?;
    Ok(writer)
}

struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
}

/// Read dimensions and component count from the first SOF marker.
fn jpeg_header(bytes: &[u8]) -> Option<JpegHeader> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let seg = bytes.get(pos + 4..pos + 2 + len)?;
            if seg.len() < 6 {
                return None;
            }
            return Some(JpegHeader {
                height: u16::from_be_bytes([seg[1], seg[2]]) as u32,
                width: u16::from_be_bytes([seg[3], seg[4]]) as u32,
                components: seg[5],
            });
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn page_media_box(bytes: &[u8]) -> Vec<f32> {
        let doc = Document::load_mem(bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn png_page_matches_pixel_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 25, Rgb([200, 10, 10])));
        let pdf = png_to_pdf(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(page_media_box(&pdf), vec![0.0, 0.0, 40.0, 25.0]);
    }

    #[test]
    fn png_alpha_gets_soft_mask() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 128])));
        let pdf = png_to_pdf(&encode_png(&img).unwrap()).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let has_smask = doc.objects.values().any(|o| {
            o.as_stream()
                .map(|s| s.dict.get(b"SMask").is_ok())
                .unwrap_or(false)
        });
        assert!(has_smask);
    }

    #[test]
    fn jpeg_is_embedded_without_reencoding() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 9, Rgb([1, 2, 3])));
        let mut jpeg = Cursor::new(Vec::new());
        img.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
        let jpeg = jpeg.into_inner();

        let header = jpeg_header(&jpeg).unwrap();
        assert_eq!((header.width, header.height, header.components), (16, 9, 3));

        let pdf = jpeg_to_pdf(&jpeg).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let embedded = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| {
                s.dict
                    .get(b"Filter")
                    .and_then(|f| f.as_name())
                    .map(|n| n == b"DCTDecode")
                    .unwrap_or(false)
            })
            .expect("DCTDecode image stream");
        assert_eq!(embedded.content, jpeg);
        assert_eq!(page_media_box(&pdf), vec![0.0, 0.0, 16.0, 9.0]);
    }

    #[test]
    fn other_formats_go_through_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 30, Rgb([9, 9, 9])));
        let mut bmp = Cursor::new(Vec::new());
        img.write_to(&mut bmp, ImageFormat::Bmp).unwrap();
        let pdf = other_image_to_pdf(&bmp.into_inner()).unwrap();
        assert_eq!(page_media_box(&pdf), vec![0.0, 0.0, 12.0, 30.0]);
    }

    #[test]
    fn tiff_scans_are_accepted() {
        assert_eq!(crate::detect_kind("scan.tiff", ""), FileKind::OtherImage);

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([50, 60, 70])));
        let mut tiff = Cursor::new(Vec::new());
        img.write_to(&mut tiff, ImageFormat::Tiff).unwrap();
        let pdf = other_image_to_pdf(&tiff.into_inner()).unwrap();
        assert_eq!(page_media_box(&pdf), vec![0.0, 0.0, 20.0, 10.0]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert!(matches!(
            png_to_pdf(b"not a png"),
            Err(NormalizeError::Image(_))
        ));
    }
}
