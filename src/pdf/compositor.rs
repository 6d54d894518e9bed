//! Watermark compositing onto PDF pages using lopdf
//!
//! Every call re-parses the source bytes into a fresh document, stamps each
//! page, and serializes back to bytes. Because the source buffer is never
//! written to, repeated renders are idempotent: N preview regenerations from
//! the same upload never stack watermarks on top of earlier ones.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::placement::{self, Placement};
use crate::raster::{rasterize, RasterImage};
use crate::watermark::WatermarkSpec;

use super::metadata::page_geometry;

/// Resource name the stamp image is registered under on each page
const STAMP_XOBJECT: &str = "WmStamp";

/// Resource name of the opacity graphics state
const STAMP_GSTATE: &str = "WmAlpha";

/// Stamp the watermark described by `spec` onto every page of `source`
///
/// The text is rasterized once and embedded once; each page gets its own
/// placement (pages may differ in size) and its own appended content stream
/// that paints the shared image.
///
/// # Example
///
/// ```no_run
/// use pdf_stamp::pdf::composite;
/// use pdf_stamp::watermark::WatermarkSpec;
///
/// let source = std::fs::read("input.pdf").unwrap();
/// let spec = WatermarkSpec {
///     text: "CONFIDENTIAL".to_string(),
///     ..Default::default()
/// };
///
/// let stamped = composite(&source, &spec).expect("Failed to stamp PDF");
/// std::fs::write("output.pdf", stamped).unwrap();
/// ```
pub fn composite(source: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(source)?;

    // Collect page ids first to avoid borrow issues during mutation
    let pages: Vec<ObjectId> = doc.get_pages().into_iter().map(|(_, id)| id).collect();
    if pages.is_empty() {
        return Err(Error::NoPages);
    }

    // One raster, one embedded image, one opacity state, shared by all pages
    let image = rasterize(&spec.text, spec.font_size_pt, spec.color)?;
    let image_id = embed_stamp_image(&mut doc, &image);
    let gstate_id = add_opacity_gstate(&mut doc, spec.clamped_opacity());

    for page_id in pages {
        let page = page_geometry(&doc, page_id);
        let placement = placement::solve(
            page,
            image.logical_width,
            image.logical_height,
            spec.rotation_deg,
            spec.offset_x,
            spec.offset_y,
        );

        let content = stamp_content(&image, placement, spec.rotation_deg);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        add_stamp_resources(&mut doc, page_id, image_id, gstate_id)?;
        append_content_to_page(&mut doc, page_id, content_id)?;
    }

    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Embed the rasterized stamp as an Image XObject with an alpha SMask
///
/// The RGBA buffer is split into an RGB color stream and a DeviceGray soft
/// mask carrying the per-pixel alpha. Both streams are left uncompressed
/// here; `doc.compress()` flate-encodes them before serialization.
fn embed_stamp_image(doc: &mut Document, image: &RasterImage) -> ObjectId {
    let width = image.pixels.width();
    let height = image.pixels.height();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);

    for pixel in image.pixels.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut smask_dict = Dictionary::new();
    smask_dict.set("Type", Object::Name(b"XObject".to_vec()));
    smask_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    smask_dict.set("Width", Object::Integer(width as i64));
    smask_dict.set("Height", Object::Integer(height as i64));
    smask_dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
    smask_dict.set("BitsPerComponent", Object::Integer(8));
    let smask_id = doc.add_object(Stream::new(smask_dict, alpha));

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(width as i64));
    image_dict.set("Height", Object::Integer(height as i64));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    image_dict.set("SMask", Object::Reference(smask_id));

    doc.add_object(Stream::new(image_dict, rgb))
}

/// Create the ExtGState that applies the watermark opacity at paint time
fn add_opacity_gstate(doc: &mut Document, opacity: f64) -> ObjectId {
    let mut gstate = Dictionary::new();
    gstate.set("Type", Object::Name(b"ExtGState".to_vec()));
    gstate.set("ca", Object::Real(opacity as f32));
    gstate.set("CA", Object::Real(opacity as f32));

    doc.add_object(Object::Dictionary(gstate))
}

/// Generate the content stream that paints the stamp on one page
///
/// Image XObjects paint into a unit square, so a single `cm` matrix does all
/// three jobs at once: scale to the logical size, rotate about the
/// bottom-left corner, and move that corner to the solved anchor.
fn stamp_content(image: &RasterImage, placement: Placement, rotation_deg: f64) -> String {
    let rad = rotation_deg.to_radians();
    let (sin, cos) = rad.sin_cos();
    let w = image.logical_width;
    let h = image.logical_height;

    format!(
        "q\n/{} gs\n{:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm\n/{} Do\nQ\n",
        STAMP_GSTATE,
        w * cos,
        w * sin,
        -h * sin,
        h * cos,
        placement.draw_x,
        placement.draw_y,
        STAMP_XOBJECT,
    )
}

/// Register the stamp image and opacity state in a page's Resources
fn add_stamp_resources(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
    gstate_id: ObjectId,
) -> Result<()> {
    // Resources may live inline or behind a reference; fetch a copy first
    // to avoid borrow issues
    let resources_dict = {
        let page_obj = doc.get_object(page_id)?;
        if let Object::Dictionary(page_dict) = page_obj {
            match page_dict.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                Ok(Object::Reference(res_id)) => {
                    if let Ok(Object::Dictionary(dict)) = doc.get_object(*res_id) {
                        dict.clone()
                    } else {
                        Dictionary::new()
                    }
                }
                _ => Dictionary::new(),
            }
        } else {
            Dictionary::new()
        }
    };

    let page_obj = doc.get_object_mut(page_id)?;

    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let mut new_resources = resources_dict;

        let mut xobjects = match new_resources.get(b"XObject") {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            _ => Dictionary::new(),
        };
        xobjects.set(STAMP_XOBJECT, Object::Reference(image_id));
        new_resources.set("XObject", Object::Dictionary(xobjects));

        let mut gstates = match new_resources.get(b"ExtGState") {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            _ => Dictionary::new(),
        };
        gstates.set(STAMP_GSTATE, Object::Reference(gstate_id));
        new_resources.set("ExtGState", Object::Dictionary(gstates));

        // Set the Resources directly on the page (not as a reference) so the
        // page has its own copy with our entries
        page_dict.set("Resources", Object::Dictionary(new_resources));
    }

    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Appending after the original content draws the stamp on top, not under
/// background fills.
fn append_content_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    new_content_id: ObjectId,
) -> Result<()> {
    let page_obj = doc.get_object_mut(page_id)?;

    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let existing_content = page_dict.get(b"Contents").ok().cloned();

        match existing_content {
            Some(Object::Reference(content_id)) => {
                let new_contents = vec![
                    Object::Reference(content_id),
                    Object::Reference(new_content_id),
                ];
                page_dict.set("Contents", Object::Array(new_contents));
            }
            Some(Object::Array(mut content_array)) => {
                content_array.push(Object::Reference(new_content_id));
                page_dict.set("Contents", Object::Array(content_array));
            }
            _ => {
                page_dict.set("Contents", Object::Array(vec![Object::Reference(new_content_id)]));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn test_image(w: u32, h: u32, logical_w: f64, logical_h: f64) -> RasterImage {
        RasterImage {
            pixels: RgbaImage::new(w, h),
            logical_width: logical_w,
            logical_height: logical_h,
        }
    }

    #[test]
    fn test_stamp_content_identity_rotation() {
        let image = test_image(30, 12, 10.0, 4.0);
        let placement = Placement {
            draw_x: 301.0,
            draw_y: 394.0,
        };

        let content = stamp_content(&image, placement, 0.0);

        // At 0 degrees the matrix is a pure scale-and-translate
        assert!(content.contains("10.0000 0.0000"));
        assert!(content.contains("4.0000 301.0000 394.0000 cm"));
        assert!(content.contains("/WmAlpha gs"));
        assert!(content.contains("/WmStamp Do"));
        assert!(content.starts_with("q\n"));
        assert!(content.ends_with("Q\n"));
    }

    #[test]
    fn test_stamp_content_quarter_turn() {
        let image = test_image(30, 12, 10.0, 4.0);
        let placement = Placement {
            draw_x: 0.0,
            draw_y: 0.0,
        };

        let content = stamp_content(&image, placement, 90.0);

        // cos(90) = 0, sin(90) = 1: [0 w -h 0 x y]
        assert!(content.contains("0.0000 10.0000 -4.0000 0.0000"));
    }

    #[test]
    fn test_embed_stamp_image_splits_alpha() {
        let mut doc = Document::with_version("1.5");
        let mut pixels = RgbaImage::new(2, 1);
        pixels.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));
        pixels.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));

        let raster = RasterImage {
            pixels,
            logical_width: 2.0 / 3.0,
            logical_height: 1.0 / 3.0,
        };

        let image_id = embed_stamp_image(&mut doc, &raster);

        let image_stream = match doc.get_object(image_id).unwrap() {
            Object::Stream(stream) => stream,
            other => panic!("expected stream, got {:?}", other),
        };
        assert_eq!(image_stream.content, vec![255, 0, 0, 0, 255, 0]);

        let smask_id = match image_stream.dict.get(b"SMask").unwrap() {
            Object::Reference(id) => *id,
            other => panic!("expected reference, got {:?}", other),
        };
        let smask_stream = match doc.get_object(smask_id).unwrap() {
            Object::Stream(stream) => stream,
            other => panic!("expected stream, got {:?}", other),
        };
        assert_eq!(smask_stream.content, vec![128, 255]);
    }

    #[test]
    fn test_opacity_gstate_values() {
        let mut doc = Document::with_version("1.5");
        let gstate_id = add_opacity_gstate(&mut doc, 0.5);

        let gstate = match doc.get_object(gstate_id).unwrap() {
            Object::Dictionary(dict) => dict,
            other => panic!("expected dictionary, got {:?}", other),
        };

        match gstate.get(b"ca").unwrap() {
            Object::Real(ca) => assert!((ca - 0.5).abs() < 1e-6),
            other => panic!("expected real, got {:?}", other),
        }
    }
}
