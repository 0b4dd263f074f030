//! Page renderer: draws a form record onto the pages its layout
//! template declares and serializes the result with pdf-writer.

mod images;

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};

use crate::error::Result;
use crate::fetch::{AssetFetcher, FetchOptions};
use crate::format::format_value;
use crate::layout::{FieldRole, LayoutTemplate, PageSize, LETTER};
use crate::model::{FormRecord, RenderedDocument};

use images::DecodedImage;

const FONT_REGULAR: &[u8] = b"F1";
const FONT_BOLD: &[u8] = b"F2";

const TITLE_SIZE: f32 = 16.0;
const LABEL_SIZE: f32 = 7.0;
const LABEL_GAP: f32 = 3.0;

/// Average Helvetica glyph width as a fraction of the font size, used
/// to bound text to a placement's max width without font metrics.
const AVG_GLYPH_RATIO: f32 = 0.52;

/// Render one form onto the pages its template declares.
///
/// Image assets are fetched sequentially in template field order; a
/// field whose fetch or decode fails is skipped with a warning and the
/// page still renders. The output always has exactly
/// `template.page_count` pages.
pub async fn render(
    template: &LayoutTemplate,
    record: &FormRecord,
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    let mut fetched: Vec<(usize, DecodedImage)> = Vec::new();
    for (idx, fdef) in template.fields.iter().enumerate() {
        if fdef.placement.role != FieldRole::Image {
            continue;
        }
        let Some(asset) = record.asset(fdef.name) else {
            continue;
        };
        match fetcher.fetch(asset, &FetchOptions::default()).await {
            Ok(raw) => match DecodedImage::from_bytes(&raw.bytes) {
                Ok(img) => fetched.push((idx, img)),
                Err(e) => log::warn!("skipping image field '{}': {e}", fdef.name),
            },
            Err(e) => log::warn!("skipping image field '{}': {e}", fdef.name),
        }
    }

    Ok(build_document(template, record, &fetched))
}

fn build_document(
    template: &LayoutTemplate,
    record: &FormRecord,
    fetched: &[(usize, DecodedImage)],
) -> RenderedDocument {
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let (regular_id, bold_id) = write_base_fonts(&mut pdf, &mut alloc);

    let mut image_xobjects: Vec<(String, Ref)> = Vec::new();
    for (_, img) in fetched {
        let xobj_ref = img.embed(&mut pdf, &mut alloc);
        let pdf_name = format!("Im{}", image_xobjects.len() + 1);
        image_xobjects.push((pdf_name, xobj_ref));
    }

    let mut contents: Vec<Content> = (0..template.page_count).map(|_| Content::new()).collect();

    for (page_idx, content) in contents.iter_mut().enumerate() {
        let heading = if page_idx == 0 {
            template.title.to_string()
        } else {
            format!("{} (continued)", template.title)
        };
        draw_text(
            content,
            FONT_BOLD,
            TITLE_SIZE,
            54.0,
            template.page_size.height - 64.0,
            &heading,
        );
    }

    for (idx, fdef) in template.fields.iter().enumerate() {
        let p = &fdef.placement;
        let content = &mut contents[p.page];
        match p.role {
            FieldRole::Text => {
                if !fdef.label.is_empty() {
                    content.set_fill_gray(0.45);
                    draw_text(
                        content,
                        FONT_REGULAR,
                        LABEL_SIZE,
                        p.x,
                        p.y + p.font_size + LABEL_GAP,
                        fdef.label,
                    );
                    content.set_fill_gray(0.0);
                }
                let value = format_value(record.get(fdef.name));
                let value = truncate_to_width(&value, p.font_size, p.max_width);
                draw_text(content, FONT_REGULAR, p.font_size, p.x, p.y, &value);
            }
            FieldRole::Line => {
                content.set_stroke_gray(0.55);
                content.set_line_width(0.75);
                content.move_to(p.x, p.y);
                content.line_to(p.x + p.max_width, p.y);
                content.stroke();
                content.set_stroke_gray(0.0);
            }
            FieldRole::Image => {
                let Some(pos) = fetched.iter().position(|(i, _)| *i == idx) else {
                    continue;
                };
                let img = &fetched[pos].1;
                let pdf_name = &image_xobjects[pos].0;
                let (w, h) = img.display_size(p);
                content.save_state();
                content.transform([w, 0.0, 0.0, h, p.x, p.y]);
                content.x_object(Name(pdf_name.as_bytes()));
                content.restore_state();
                if !fdef.label.is_empty() {
                    content.set_fill_gray(0.45);
                    draw_text(content, FONT_REGULAR, LABEL_SIZE, p.x, p.y - 12.0, fdef.label);
                    content.set_fill_gray(0.0);
                }
            }
        }
    }

    let bytes = assemble(
        pdf,
        &mut alloc,
        catalog_id,
        pages_id,
        template.page_size,
        contents,
        &[(FONT_REGULAR, regular_id), (FONT_BOLD, bold_id)],
        &image_xobjects,
    );
    RenderedDocument::new(bytes, template.page_count)
}

/// One-page notice used wherever a failed section must still yield a
/// downloadable artifact: the overlay fallback and substituted error
/// slots in package assembly.
pub fn notice_document(title: &str, detail: &str) -> RenderedDocument {
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let (regular_id, bold_id) = write_base_fonts(&mut pdf, &mut alloc);

    let mut content = Content::new();
    draw_text(&mut content, FONT_BOLD, 14.0, 54.0, 700.0, title);

    let mut y = 664.0;
    for line in wrap_chars(detail, 88) {
        draw_text(&mut content, FONT_REGULAR, 10.0, 54.0, y, &line);
        y -= 14.0;
        if y < 54.0 {
            break;
        }
    }

    let bytes = assemble(
        pdf,
        &mut alloc,
        catalog_id,
        pages_id,
        LETTER,
        vec![content],
        &[(FONT_REGULAR, regular_id), (FONT_BOLD, bold_id)],
        &[],
    );
    RenderedDocument::new(bytes, 1)
}

fn write_base_fonts(pdf: &mut Pdf, alloc: &mut dyn FnMut() -> Ref) -> (Ref, Ref) {
    let regular_id = alloc();
    pdf.type1_font(regular_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    let bold_id = alloc();
    pdf.type1_font(bold_id)
        .base_font(Name(b"Helvetica-Bold"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    (regular_id, bold_id)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    mut pdf: Pdf,
    alloc: &mut dyn FnMut() -> Ref,
    catalog_id: Ref,
    pages_id: Ref,
    page_size: PageSize,
    contents: Vec<Content>,
    fonts: &[(&[u8], Ref)],
    image_xobjects: &[(String, Ref)],
) -> Vec<u8> {
    let n = contents.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (i, c) in contents.into_iter().enumerate() {
        let raw = c.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed)
            .filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, page_size.width, page_size.height))
            .parent(pages_id)
            .contents(content_ids[i]);
        let mut resources = page.resources();
        {
            let mut font_dict = resources.fonts();
            for &(name, font_ref) in fonts {
                font_dict.pair(Name(name), font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    pdf.finish()
}

fn draw_text(content: &mut Content, font: &[u8], size: f32, x: f32, y: f32, text: &str) {
    content.begin_text();
    content.set_font(Name(font), size);
    content.next_line(x, y);
    content.show(pdf_writer::Str(&to_winansi_bytes(text)));
    content.end_text();
}

/// Bound a value to its placement width using the average glyph ratio;
/// overlong values are cut with a trailing ellipsis.
fn truncate_to_width(text: &str, font_size: f32, max_width: f32) -> String {
    if font_size <= 0.0 || max_width <= 0.0 {
        return text.to_string();
    }
    let max_chars = (max_width / (font_size * AVG_GLYPH_RATIO)).floor() as usize;
    if text.chars().count() <= max_chars || max_chars < 4 {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push('\u{2026}');
    cut
}

fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match c as u32 {
            0x0000..=0x007F => Some(c as u8),
            0x00A0..=0x00FF => Some(c as u8), // Latin-1 supplement maps directly
            0x20AC => Some(0x80),
            0x2026 => Some(0x85),
            0x2018 => Some(0x91),
            0x2019 => Some(0x92),
            0x201C => Some(0x93),
            0x201D => Some(0x94),
            0x2022 => Some(0x95),
            0x2013 => Some(0x96),
            0x2014 => Some(0x97),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{AssetFetcher, FetcherConfig};
    use crate::layout::template;
    use crate::model::{FormType, FormValue};

    fn offline_fetcher() -> AssetFetcher {
        AssetFetcher::new(FetcherConfig::default())
    }

    #[tokio::test]
    async fn page_count_matches_template_regardless_of_missing_images() {
        let tpl = template(FormType::BrokerInformation).unwrap();
        let mut record = FormRecord::new();
        record.insert("firstName", FormValue::Text("Dana".into()));
        record.insert("bankruptcyDeclared", FormValue::Bool(false));

        let doc = render(&tpl, &record, &offline_fetcher()).await.unwrap();
        assert_eq!(doc.page_count, 2);
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn rendering_is_deterministic() {
        let tpl = template(FormType::PaymentAuthorization).unwrap();
        let mut record = FormRecord::new();
        record.insert("accountHolderName", FormValue::Text("Dana Reyes".into()));
        record.insert("authorizationAccepted", FormValue::Bool(true));

        let fetcher = offline_fetcher();
        let a = render(&tpl, &record, &fetcher).await.unwrap();
        let b = render(&tpl, &record, &fetcher).await.unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn notice_document_is_one_page() {
        let doc = notice_document("Error generating contract document", "detail text");
        assert_eq!(doc.page_count, 1);
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn truncation_appends_ellipsis_only_when_needed() {
        assert_eq!(truncate_to_width("short", 10.0, 240.0), "short");
        let long = "x".repeat(200);
        let cut = truncate_to_width(&long, 10.0, 120.0);
        assert!(cut.chars().count() < 200);
        assert!(cut.ends_with('\u{2026}'));
    }

    #[test]
    fn winansi_drops_unmappable_chars() {
        assert_eq!(to_winansi_bytes("abc"), b"abc".to_vec());
        assert_eq!(to_winansi_bytes("–"), vec![0x96]);
        assert!(to_winansi_bytes("漢").is_empty());
    }
}
