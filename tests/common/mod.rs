//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::io::Cursor;

use lopdf::{dictionary, Document, Object, Stream};

use formpack_pdf::{AssetFetcher, FetcherConfig, FormRecord, FormValue};

/// Build a synthetic n-page contract PDF with Helvetica text on each
/// page, the shape an externally-authored upload would have.
pub fn contract_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut kids = Vec::new();
    for i in 0..page_count {
        let text = format!("BT /F1 12 Tf 72 720 Td (Contract page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(
            lopdf::Dictionary::new(),
            text.into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save synthetic contract");
    out
}

/// A small opaque PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 80, 255]));
    encode_png(img)
}

/// A small PNG with transparent corners, like a captured signature.
pub fn signature_png() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(120, 40, image::Rgba([0, 0, 0, 0]));
    for x in 10..110 {
        img.put_pixel(x, 20, image::Rgba([10, 10, 10, 255]));
    }
    encode_png(img)
}

fn encode_png(img: image::RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    out
}

/// A fetcher that never needs to touch the network in the test.
pub fn offline_fetcher() -> AssetFetcher {
    AssetFetcher::new(FetcherConfig::default())
}

/// A fully-populated broker information record without image assets.
pub fn broker_record() -> FormRecord {
    let mut record = FormRecord::new();
    for (k, v) in [
        ("firstName", "Dana"),
        ("lastName", "Reyes"),
        ("dateOfBirth", "1988-04-12"),
        ("phoneNumber", "416-555-0133"),
        ("homeAddress", "18 Lakeshore Blvd W"),
        ("city", "Toronto"),
        ("province", "ON"),
        ("postalCode", "M5V 2T6"),
        ("workEmail", "dana.reyes@example.com"),
        ("licenseNumber", "M23001784"),
        ("licenseClass", "level2"),
        ("brokerageName", "Harbourview Mortgage Group"),
        ("errorsOmissionsProvider", "Axis Insurance"),
        ("declarationDetails", ""),
    ] {
        record.insert(k, FormValue::Text(v.to_string()));
    }
    record.insert("yearsLicensed", FormValue::Number(7.0));
    record.insert("bankruptcyDeclared", FormValue::Bool(false));
    record.insert("creditCheckConsent", FormValue::Bool(true));
    record.insert("criminalConvictions", FormValue::Bool(false));
    record.insert("disciplinaryAction", FormValue::Bool(false));
    record
}

/// Decompressed content streams of every page, in page order.
pub fn page_contents(pdf_bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf_bytes).expect("load produced pdf");
    let pages = doc.get_pages();
    let mut contents = Vec::new();
    for page_id in pages.values() {
        let raw = doc.get_page_content(*page_id).expect("page content");
        contents.push(String::from_utf8_lossy(&raw).into_owned());
    }
    contents
}

pub fn page_count(pdf_bytes: &[u8]) -> usize {
    Document::load_mem(pdf_bytes)
        .expect("load produced pdf")
        .get_pages()
        .len()
}
