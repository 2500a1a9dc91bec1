use crate::canvas::{Command, Document, FontId, FontTable, Page};
use crate::error::ConvertError;
use crate::font::{Base14Family, EmbeddedFont, FontProgram, StandardCjkFont, StandardFont, winansi_byte};
use crate::types::Pt;
use fixed::types::I32F32;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, dictionary};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;

pub(crate) const PRODUCER: &str = concat!("markpress ", env!("CARGO_PKG_VERSION"));

/// Glyphs drawn with one embedded font: gid -> char, feeds /W and /ToUnicode.
pub(crate) type GlyphUsage = BTreeMap<u16, char>;

/// Serializes the document and writes it to `out`. Returns the byte count.
pub fn write_document<W: Write>(document: &Document, out: &mut W) -> Result<usize, ConvertError> {
    let mut pdf = build_pdf(document)?;
    let mut buffer = Vec::new();
    pdf.save_to(&mut buffer).map_err(ConvertError::render)?;
    out.write_all(&buffer).map_err(ConvertError::render)?;
    out.flush().map_err(ConvertError::render)?;
    Ok(buffer.len())
}

pub(crate) fn build_pdf(document: &Document) -> Result<LoDocument, ConvertError> {
    let mut pdf = LoDocument::with_version("1.7");
    let pages_id = pdf.new_object_id();

    let usage = collect_glyph_usage(document);
    let mut font_resources = Dictionary::new();
    for (id, program) in document.fonts.iter() {
        let empty = GlyphUsage::new();
        let glyphs = usage.get(&id).unwrap_or(&empty);
        let font_id = add_font_objects(&mut pdf, program, glyphs);
        font_resources.set(id.resource_name(), font_id);
    }

    let opacities = collect_opacities(document);
    let mut gs_names: HashMap<(u16, u16), String> = HashMap::new();
    let mut gs_resources = Dictionary::new();
    for (index, (fill, stroke)) in opacities.into_iter().enumerate() {
        let name = format!("GS{}", index + 1);
        let gs_id = pdf.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => fill as f32 / 1000.0,
            "CA" => stroke as f32 / 1000.0,
        });
        gs_resources.set(name.clone(), gs_id);
        gs_names.insert((fill, stroke), name);
    }

    let mut resources = Dictionary::new();
    resources.set("Font", font_resources);
    if !gs_resources.is_empty() {
        resources.set("ExtGState", gs_resources);
    }
    let resources_id = pdf.add_object(resources);

    let width: Object = document.page_size.width.to_f32().into();
    let height: Object = document.page_size.height.to_f32().into();
    let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, &document.fonts, &gs_names);
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.clone(), height.clone()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    Ok(pdf)
}

fn collect_glyph_usage(document: &Document) -> HashMap<FontId, GlyphUsage> {
    let mut usage: HashMap<FontId, GlyphUsage> = HashMap::new();
    for page in &document.pages {
        for layer in page.layers() {
            let mut current: Option<FontId> = None;
            let mut saved: Vec<Option<FontId>> = Vec::new();
            for cmd in layer {
                match cmd {
                    Command::SaveState => saved.push(current),
                    Command::RestoreState => current = saved.pop().unwrap_or(current),
                    Command::SetFont { font, .. } => current = Some(*font),
                    Command::DrawString { text, .. } => {
                        let Some(font) = current else {
                            continue;
                        };
                        if let Some(FontProgram::Embedded(embedded)) = document.fonts.get(font) {
                            record_glyphs(embedded, text, usage.entry(font).or_default());
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    usage
}

pub(crate) fn record_glyphs(font: &EmbeddedFont, text: &str, usage: &mut GlyphUsage) {
    for ch in text.chars() {
        if let Some(gid) = font.glyph_id(ch) {
            usage.entry(gid).or_insert(ch);
        }
    }
}

fn collect_opacities(document: &Document) -> BTreeSet<(u16, u16)> {
    let mut pairs = BTreeSet::new();
    for page in &document.pages {
        for cmd in page.commands() {
            if let Command::SetOpacity { fill, stroke } = cmd {
                pairs.insert((alpha_milli(*fill), alpha_milli(*stroke)));
            }
        }
    }
    pairs
}

fn alpha_milli(value: f32) -> u16 {
    ((value * 1000.0).round() as i32).clamp(0, 1000) as u16
}

/// Adds the objects backing one font and returns the font dictionary's id.
pub(crate) fn add_font_objects(
    pdf: &mut LoDocument,
    program: &FontProgram,
    usage: &GlyphUsage,
) -> ObjectId {
    match program {
        FontProgram::Embedded(font) => add_embedded_font(pdf, font, usage),
        FontProgram::StandardCjk(font) => add_standard_cjk_font(pdf, font),
        FontProgram::Standard(font) => add_standard_font(pdf, font),
    }
}

fn add_embedded_font(pdf: &mut LoDocument, font: &EmbeddedFont, usage: &GlyphUsage) -> ObjectId {
    let base = sanitize_font_name(font.name());
    let metrics = font.metrics();

    let mut file_dict = dictionary! { "Length1" => font.data().len() as i64 };
    if font.is_cff() {
        file_dict.set("Subtype", "OpenType");
    }
    let file_id = pdf.add_object(Stream::new(file_dict, font.data().to_vec()));

    let mut flags = 32i64;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let file_key = if font.is_cff() { "FontFile3" } else { "FontFile2" };
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base.as_str(),
        "Flags" => flags,
        "FontBBox" => vec![
            (metrics.bbox.0 as i64).into(),
            (metrics.bbox.1 as i64).into(),
            (metrics.bbox.2 as i64).into(),
            (metrics.bbox.3 as i64).into(),
        ],
        "ItalicAngle" => metrics.italic_angle as i64,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => 80,
        "MissingWidth" => metrics.missing_width as i64,
    };
    descriptor.set(file_key, file_id);
    let descriptor_id = pdf.add_object(descriptor);

    let mut widths: Vec<Object> = Vec::with_capacity(usage.len() * 2);
    for gid in usage.keys() {
        widths.push((*gid as i64).into());
        widths.push(Object::Array(vec![(font.glyph_advance(*gid) as i64).into()]));
    }
    let mut cid_font = dictionary! {
        "Type" => "Font",
        "Subtype" => if font.is_cff() { "CIDFontType0" } else { "CIDFontType2" },
        "BaseFont" => base.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "W" => widths,
    };
    if !font.is_cff() {
        cid_font.set("CIDToGIDMap", "Identity");
    }
    let cid_id = pdf.add_object(cid_font);

    let to_unicode_id = pdf.add_object(Stream::new(
        dictionary! {},
        to_unicode_cmap(usage).into_bytes(),
    ));

    pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => base.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_id.into()],
        "ToUnicode" => to_unicode_id,
    })
}

fn add_standard_cjk_font(pdf: &mut LoDocument, font: &StandardCjkFont) -> ObjectId {
    let base = sanitize_font_name(&font.name);
    let metrics = StandardCjkFont::METRICS;
    let descriptor_id = pdf.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base.as_str(),
        "Flags" => 6,
        "FontBBox" => vec![
            (metrics.bbox.0 as i64).into(),
            (metrics.bbox.1 as i64).into(),
            (metrics.bbox.2 as i64).into(),
            (metrics.bbox.3 as i64).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => 93,
    });
    let cid_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType0",
        "BaseFont" => base.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal(font.ordering),
            "Supplement" => font.supplement,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => vec![1.into(), 95.into(), 500.into()],
    });
    pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => format!("{base}-{}", font.cmap),
        "Encoding" => font.cmap,
        "DescendantFonts" => vec![cid_id.into()],
    })
}

fn add_standard_font(pdf: &mut LoDocument, font: &StandardFont) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.name,
    };
    if !matches!(font.family, Base14Family::Symbol | Base14Family::ZapfDingbats) {
        dict.set("Encoding", "WinAnsiEncoding");
    }
    pdf.add_object(dict)
}

/// Encodes text as a PDF string operand for the given font.
pub(crate) fn encode_text(program: &FontProgram, text: &str) -> String {
    match program {
        FontProgram::Embedded(font) => {
            let mut out = String::with_capacity(text.len() * 4 + 2);
            out.push('<');
            for ch in text.chars() {
                out.push_str(&format!("{:04X}", font.glyph_id(ch).unwrap_or(0)));
            }
            out.push('>');
            out
        }
        FontProgram::StandardCjk(_) => {
            let mut out = String::with_capacity(text.len() * 4 + 2);
            out.push('<');
            let mut units = [0u16; 2];
            for ch in text.chars() {
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("{:04X}", unit));
                }
            }
            out.push('>');
            out
        }
        FontProgram::Standard(_) => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('(');
            for ch in text.chars() {
                let byte = winansi_byte(ch).unwrap_or(b'?');
                match byte {
                    b'\\' => out.push_str("\\\\"),
                    b'(' => out.push_str("\\("),
                    b')' => out.push_str("\\)"),
                    0x20..=0x7E => out.push(byte as char),
                    _ => out.push_str(&format!("\\{:03o}", byte)),
                }
            }
            out.push(')');
            out
        }
    }
}

/// `BT ... ET` block drawing `text` with its baseline origin at (x, y).
pub(crate) fn text_operation(
    resource: &str,
    program: &FontProgram,
    size: Pt,
    x: Pt,
    y: Pt,
    text: &str,
) -> String {
    format!(
        "BT\n/{} {} Tf\n{} {} Td\n{} Tj\nET\n",
        resource,
        fmt_pt(size),
        fmt_pt(x),
        fmt_pt(y),
        encode_text(program, text)
    )
}

fn render_page(page: &Page, fonts: &FontTable, gs_names: &HashMap<(u16, u16), String>) -> String {
    let mut out = String::new();
    for layer in page.layers() {
        out.push_str("q\n");
        let mut current_font: Option<(FontId, Pt)> = None;
        let mut saved_fonts: Vec<Option<(FontId, Pt)>> = Vec::new();
        for cmd in layer {
            match cmd {
                Command::SaveState => {
                    saved_fonts.push(current_font);
                    out.push_str("q\n");
                }
                Command::RestoreState => {
                    current_font = saved_fonts.pop().unwrap_or(current_font);
                    out.push_str("Q\n");
                }
                Command::Translate(x, y) => {
                    out.push_str(&format!("1 0 0 1 {} {} cm\n", fmt_pt(*x), fmt_pt(*y)));
                }
                Command::Rotate(angle) => {
                    let sin = libm::sinf(*angle);
                    let cos = libm::cosf(*angle);
                    out.push_str(&format!(
                        "{} {} {} {} 0 0 cm\n",
                        fmt(cos),
                        fmt(sin),
                        fmt(-sin),
                        fmt(cos)
                    ));
                }
                Command::SetFillColor(color) => {
                    out.push_str(&format!(
                        "{} {} {} rg\n",
                        fmt(color.r),
                        fmt(color.g),
                        fmt(color.b)
                    ));
                }
                Command::SetStrokeColor(color) => {
                    out.push_str(&format!(
                        "{} {} {} RG\n",
                        fmt(color.r),
                        fmt(color.g),
                        fmt(color.b)
                    ));
                }
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", fmt_pt(*width)));
                }
                Command::SetOpacity { fill, stroke } => {
                    if let Some(name) = gs_names.get(&(alpha_milli(*fill), alpha_milli(*stroke))) {
                        out.push_str(&format!("/{} gs\n", name));
                    }
                }
                Command::SetFont { font, size } => current_font = Some((*font, *size)),
                Command::MoveTo { x, y } => {
                    out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(*y)));
                }
                Command::LineTo { x, y } => {
                    out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(*y)));
                }
                Command::Stroke => out.push_str("S\n"),
                Command::DrawString { x, y, text } => {
                    let Some((font, size)) = current_font else {
                        continue;
                    };
                    let Some(program) = fonts.get(font) else {
                        continue;
                    };
                    out.push_str(&text_operation(
                        &font.resource_name(),
                        program,
                        size,
                        *x,
                        *y,
                        text,
                    ));
                }
            }
        }
        out.push_str("Q\n");
    }
    out
}

fn to_unicode_cmap(usage: &GlyphUsage) -> String {
    let entries: Vec<(u16, char)> = usage.iter().map(|(g, c)| (*g, *c)).collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let uni: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, uni));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        out
    }
}

pub(crate) fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}
