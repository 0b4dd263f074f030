//! Raster decoding and XObject embedding for the page renderer.

use pdf_writer::{Filter, Pdf, Ref};

use crate::error::{Error, Result};
use crate::layout::FieldPlacement;

/// A decoded raster asset ready for embedding.
///
/// JPEG bytes pass straight through as a DCTDecode stream; everything
/// else is decoded to RGBA and embedded as FlateDecode RGB, with a
/// grayscale soft mask when the source carries alpha.
pub(crate) enum DecodedImage {
    Jpeg {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
    Raster(image::RgbaImage),
}

impl DecodedImage {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format =
            image::guess_format(bytes).map_err(|e| Error::AssetDecode(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| Error::AssetDecode(e.to_string()))?;
        if format == image::ImageFormat::Jpeg {
            Ok(DecodedImage::Jpeg {
                data: bytes.to_vec(),
                width: decoded.width(),
                height: decoded.height(),
            })
        } else {
            Ok(DecodedImage::Raster(decoded.to_rgba8()))
        }
    }

    pub(crate) fn pixel_size(&self) -> (u32, u32) {
        match self {
            DecodedImage::Jpeg { width, height, .. } => (*width, *height),
            DecodedImage::Raster(rgba) => (rgba.width(), rgba.height()),
        }
    }

    /// Display size in points: the placement's declared size if given,
    /// otherwise scaled to `max_width` preserving the source aspect
    /// ratio (`height = max_width * src_h / src_w`).
    pub(crate) fn display_size(&self, placement: &FieldPlacement) -> (f32, f32) {
        if let (Some(w), Some(h)) = (placement.width, placement.height) {
            return (w, h);
        }
        let (src_w, src_h) = self.pixel_size();
        let w = placement.max_width;
        let h = if src_w == 0 {
            w
        } else {
            w * src_h as f32 / src_w as f32
        };
        (w, h)
    }

    /// Write this image into the PDF as an image XObject and return its
    /// object reference.
    pub(crate) fn embed(&self, pdf: &mut Pdf, alloc: &mut dyn FnMut() -> Ref) -> Ref {
        let xobj_ref = alloc();
        match self {
            DecodedImage::Jpeg {
                data,
                width,
                height,
            } => {
                let mut xobj = pdf.image_xobject(xobj_ref, data);
                xobj.filter(Filter::DctDecode);
                xobj.width(*width as i32);
                xobj.height(*height as i32);
                xobj.color_space().device_rgb();
                xobj.bits_per_component(8);
            }
            DecodedImage::Raster(rgba) => {
                let (w, h) = (rgba.width(), rgba.height());
                let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

                let rgb_data: Vec<u8> = rgba
                    .pixels()
                    .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                    .collect();
                let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

                let smask_ref = if has_alpha {
                    let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                    let compressed_alpha =
                        miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
                    let mask_ref = alloc();
                    let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                    mask.filter(Filter::FlateDecode);
                    mask.width(w as i32);
                    mask.height(h as i32);
                    mask.color_space().device_gray();
                    mask.bits_per_component(8);
                    Some(mask_ref)
                } else {
                    None
                };

                let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
                xobj.filter(Filter::FlateDecode);
                xobj.width(w as i32);
                xobj.height(h as i32);
                xobj.color_space().device_rgb();
                xobj.bits_per_component(8);
                if let Some(mask_ref) = smask_ref {
                    xobj.s_mask(mask_ref);
                }
            }
        }
        xobj_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldPlacement, FieldRole};
    use std::io::Cursor;

    fn placement(max_width: f32, fixed: Option<(f32, f32)>) -> FieldPlacement {
        FieldPlacement {
            page: 0,
            x: 0.0,
            y: 0.0,
            font_size: 0.0,
            max_width,
            width: fixed.map(|(w, _)| w),
            height: fixed.map(|(_, h)| h),
            role: FieldRole::Image,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn aspect_ratio_scaling_uses_max_width() {
        let decoded = DecodedImage::from_bytes(&png_bytes(200, 100)).unwrap();
        let (w, h) = decoded.display_size(&placement(120.0, None));
        assert_eq!(w, 120.0);
        assert_eq!(h, 60.0);
    }

    #[test]
    fn declared_size_wins_over_scaling() {
        let decoded = DecodedImage::from_bytes(&png_bytes(200, 100)).unwrap();
        let (w, h) = decoded.display_size(&placement(120.0, Some((90.0, 45.0))));
        assert_eq!((w, h), (90.0, 45.0));
    }

    #[test]
    fn unrecognized_bytes_fail_to_decode() {
        assert!(DecodedImage::from_bytes(b"not an image").is_err());
    }
}
