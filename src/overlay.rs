//! Contract overlay composer.
//!
//! Loads a previously-uploaded, externally-authored contract PDF and
//! stamps signer artwork onto it: broker initials on every page except
//! the last, and the employer/broker signature blocks on the last page.
//! A contract that cannot be loaded never fails the caller; it becomes
//! a one-page fallback document explaining the error.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};
use crate::model::{RenderedDocument, SignerAssets};
use crate::pdf::notice_document;

pub(crate) const FALLBACK_TITLE: &str = "Error generating contract document";

/// Name printed under the employer signature line.
const EMPLOYER_NAME: &str = "Harbourview Mortgage Group Inc.";

const FONT_NAME: &str = "FpHelv";
const INITIALS_NAME: &str = "FpInitials";
const BROKER_SIG_NAME: &str = "FpBrokerSig";
const EMPLOYER_SIG_NAME: &str = "FpEmployerSig";

// Bottom-right initials anchor, offset from the page edges.
const INITIALS_RIGHT_INSET: f32 = 126.0;
const INITIALS_BOTTOM: f32 = 36.0;
const INITIALS_MAX_W: f32 = 72.0;
const INITIALS_MAX_H: f32 = 36.0;

// Last-page signature block geometry.
const BLOCK_LINE_Y: f32 = 150.0;
const BLOCK_LINE_LEN: f32 = 180.0;
const BLOCK_LEFT_X: f32 = 72.0;
const SIG_MAX_W: f32 = 140.0;
const SIG_MAX_H: f32 = 50.0;

/// Classification of a contract page, which decides what gets stamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRole {
    /// Every page before the final one: broker initials only.
    NonLast,
    /// The final page: employer and broker signature blocks.
    Last,
}

pub fn page_role(index: usize, page_count: usize) -> PageRole {
    if index + 1 == page_count {
        PageRole::Last
    } else {
        PageRole::NonLast
    }
}

/// Combine the user-recorded signature date with the capture time of
/// the signature asset.
///
/// When both exist, the recorded calendar date wins but the asset's
/// time-of-day (and offset) is preserved; when only the asset timestamp
/// exists it is used as-is; a recorded date alone lands on midnight
/// UTC; with neither, the current time applies.
pub fn resolve_signing_date(
    recorded: Option<Date>,
    asset_created_at: Option<OffsetDateTime>,
) -> OffsetDateTime {
    match (recorded, asset_created_at) {
        (Some(date), Some(created)) => created.replace_date(date),
        (Some(date), None) => date.midnight().assume_utc(),
        (None, Some(created)) => created,
        (None, None) => OffsetDateTime::now_utc(),
    }
}

/// Stamp signer artwork onto a contract document.
///
/// Never returns an error: a contract that cannot be loaded or parsed
/// yields a one-page fallback document so package generation always has
/// something to deliver.
pub fn overlay_contract(
    contract_bytes: &[u8],
    assets: &SignerAssets,
    signing_date: OffsetDateTime,
) -> RenderedDocument {
    match apply_overlay(contract_bytes, assets, signing_date) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("contract overlay failed: {e}; returning fallback document");
            notice_document(FALLBACK_TITLE, &e.to_string())
        }
    }
}

fn apply_overlay(
    contract_bytes: &[u8],
    assets: &SignerAssets,
    signing_date: OffsetDateTime,
) -> Result<RenderedDocument> {
    // Magic-byte check, not trust in a declared content type.
    if !contract_bytes.starts_with(b"%PDF") {
        return Err(Error::AssetDecode(
            "uploaded contract is not a PDF (missing %PDF header)".to_string(),
        ));
    }

    let mut doc = Document::load_mem(contract_bytes)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let page_count = page_ids.len();
    if page_count == 0 {
        return Err(Error::Pdf("contract has no pages".to_string()));
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let initials = embed_optional_image(&mut doc, assets.broker_initials.as_deref(), "initials");
    let broker_sig =
        embed_optional_image(&mut doc, assets.broker_signature.as_deref(), "broker signature");
    let employer_sig = embed_optional_image(
        &mut doc,
        assets.employer_signature.as_deref(),
        "employer signature",
    );

    let date_text = signing_date
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .map_err(|e| Error::Pdf(e.to_string()))?;

    for (i, &page_id) in page_ids.iter().enumerate() {
        let media = media_box(&doc, page_id);
        let page_width = media[2] - media[0];

        let mut ops = String::new();
        let mut xobjects: Vec<(&str, ObjectId)> = Vec::new();

        match page_role(i, page_count) {
            PageRole::NonLast => {
                // Initials stamp, skipped silently when unavailable.
                if let Some((id, w, h)) = initials {
                    let (dw, dh) = scale_into(w, h, INITIALS_MAX_W, INITIALS_MAX_H);
                    push_image(
                        &mut ops,
                        INITIALS_NAME,
                        media[0] + page_width - INITIALS_RIGHT_INSET,
                        media[1] + INITIALS_BOTTOM,
                        dw,
                        dh,
                    );
                    xobjects.push((INITIALS_NAME, id));
                }
            }
            PageRole::Last => {
                let employer_x = media[0] + BLOCK_LEFT_X;
                let broker_x = media[0] + page_width / 2.0 + 36.0;

                push_signature_block(
                    &mut ops,
                    employer_x,
                    media[1],
                    employer_sig.map(|(id, w, h)| {
                        xobjects.push((EMPLOYER_SIG_NAME, id));
                        (EMPLOYER_SIG_NAME, w, h)
                    }),
                    EMPLOYER_NAME,
                    &date_text,
                );
                push_signature_block(
                    &mut ops,
                    broker_x,
                    media[1],
                    broker_sig.map(|(id, w, h)| {
                        xobjects.push((BROKER_SIG_NAME, id));
                        (BROKER_SIG_NAME, w, h)
                    }),
                    &assets.broker_name,
                    &date_text,
                );
            }
        }

        if ops.is_empty() {
            continue;
        }
        let content = format!("q\n{ops}Q\n");
        add_page_resources(&mut doc, page_id, font_id, &xobjects)?;
        append_content_to_page(&mut doc, page_id, content.as_bytes())?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(RenderedDocument::new(out, page_count))
}

/// One signature block: horizontal line, signature image above it when
/// available, signer name and signing date beneath.
fn push_signature_block(
    ops: &mut String,
    x: f32,
    page_bottom: f32,
    image: Option<(&str, u32, u32)>,
    name: &str,
    date_text: &str,
) {
    let line_y = page_bottom + BLOCK_LINE_Y;
    ops.push_str(&format!(
        "0 G 0.75 w {x:.2} {line_y:.2} m {:.2} {line_y:.2} l S\n",
        x + BLOCK_LINE_LEN
    ));
    if let Some((pdf_name, w, h)) = image {
        let (dw, dh) = scale_into(w, h, SIG_MAX_W, SIG_MAX_H);
        push_image(ops, pdf_name, x + 10.0, line_y + 4.0, dw, dh);
    }
    push_text(ops, x, line_y - 14.0, 10.0, name);
    push_text(ops, x, line_y - 28.0, 9.0, &format!("Signed: {date_text}"));
}

fn push_image(ops: &mut String, pdf_name: &str, x: f32, y: f32, w: f32, h: f32) {
    ops.push_str(&format!(
        "q {w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm /{pdf_name} Do Q\n"
    ));
}

fn push_text(ops: &mut String, x: f32, y: f32, size: f32, text: &str) {
    ops.push_str(&format!(
        "BT /{FONT_NAME} {size} Tf {x:.2} {y:.2} Td ({}) Tj ET\n",
        escape_pdf_string(text)
    ));
}

/// Escape a string for a PDF literal string, WinAnsi-encoded with
/// octal escapes for the non-ASCII range.
fn escape_pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in crate::pdf::to_winansi_bytes(text) {
        match b {
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
    out
}

fn scale_into(src_w: u32, src_h: u32, max_w: f32, max_h: f32) -> (f32, f32) {
    if src_w == 0 || src_h == 0 {
        return (max_w, max_h);
    }
    let scale = (max_w / src_w as f32).min(max_h / src_h as f32);
    (src_w as f32 * scale, src_h as f32 * scale)
}

/// Decode and embed an optional raster asset as an image XObject.
/// Unusable artwork is skipped, never fatal.
fn embed_optional_image(
    doc: &mut Document,
    bytes: Option<&[u8]>,
    what: &str,
) -> Option<(ObjectId, u32, u32)> {
    let bytes = bytes?;
    match embed_image(doc, bytes) {
        Ok(embedded) => Some(embedded),
        Err(e) => {
            log::warn!("skipping {what}: {e}");
            None
        }
    }
}

fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<(ObjectId, u32, u32)> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| Error::AssetDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb_data: Vec<u8> = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => w as i64,
        "Height" => h as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if has_alpha {
        let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed_alpha,
        ));
        dict.set("SMask", Object::Reference(mask_id));
    }

    let image_id = doc.add_object(Stream::new(dict, compressed_rgb));
    Ok((image_id, w, h))
}

/// Resolve a dictionary-valued entry that may be inline or a reference.
fn resolved_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(d)) => d.clone(),
        Some(Object::Reference(r)) => doc
            .get_object(*r)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Merge our font and image names into the page's resources. The merged
/// dictionary is written back inline so pages sharing a referenced
/// resources object are not cross-contaminated.
fn add_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    images: &[(&str, ObjectId)],
) -> Result<()> {
    let page_dict = doc.get_object(page_id)?.as_dict()?.clone();

    let mut resources = resolved_dict(doc, page_dict.get(b"Resources").ok());

    let mut fonts = resolved_dict(doc, resources.get(b"Font").ok());
    fonts.set(FONT_NAME, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    if !images.is_empty() {
        let mut xobjects = resolved_dict(doc, resources.get(b"XObject").ok());
        for (name, id) in images {
            xobjects.set(*name, Object::Reference(*id));
        }
        resources.set("XObject", Object::Dictionary(xobjects));
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Append a content stream after the page's existing content.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, content: &[u8]) -> Result<()> {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let existing = page.get(b"Contents").ok().cloned();
    match existing {
        Some(Object::Reference(existing_id)) => {
            page.set(
                "Contents",
                Object::Array(vec![
                    Object::Reference(existing_id),
                    Object::Reference(content_id),
                ]),
            );
        }
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(content_id));
            page.set("Contents", Object::Array(arr));
        }
        _ => {
            page.set("Contents", Object::Reference(content_id));
        }
    }
    Ok(())
}

/// Media box of a page, walking up the Pages tree with a depth limit.
/// Defaults to US Letter on malformed documents.
fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut current = doc.get_object(page_id).ok();
    for _ in 0..10 {
        let Some(Object::Dictionary(dict)) = current else {
            break;
        };
        if let Ok(obj) = dict.get(b"MediaBox") {
            let arr = match obj {
                Object::Array(arr) => Some(arr.clone()),
                Object::Reference(r) => match doc.get_object(*r) {
                    Ok(Object::Array(arr)) => Some(arr.clone()),
                    _ => None,
                },
                _ => None,
            };
            if let Some(arr) = arr {
                let values: Vec<f32> = arr
                    .iter()
                    .filter_map(|o| match o {
                        Object::Integer(i) => Some(*i as f32),
                        Object::Real(r) => Some(*r),
                        _ => None,
                    })
                    .collect();
                if values.len() == 4 {
                    return [values[0], values[1], values[2], values[3]];
                }
            }
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_object(*parent_id).ok(),
            _ => None,
        };
    }
    [0.0, 0.0, 612.0, 792.0]
}
