use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::ConvertError;
use crate::font::{DEFAULT_FONT, FontProgram, FontSource};
use crate::pdf::{GlyphUsage, add_font_objects, record_glyphs, text_operation};
use crate::types::Pt;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, dictionary};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const COUNTER_FONT_RESOURCE: &str = "FPageCounter";

pub const PAGE_COUNTER_FONT_SIZE: f32 = 10.0;
pub const PAGE_COUNTER_BOTTOM_OFFSET: f32 = 15.0;

/// Label template for the page counter. `{page}` and `{total}` are substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCounterSpec {
    pub template: String,
    pub font_size: Pt,
    pub bottom_offset: Pt,
}

impl Default for PageCounterSpec {
    fn default() -> Self {
        Self::new("Page {page} of {total}")
    }
}

impl PageCounterSpec {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            font_size: Pt::from_f32(PAGE_COUNTER_FONT_SIZE),
            bottom_offset: Pt::from_f32(PAGE_COUNTER_BOTTOM_OFFSET),
        }
    }

    pub fn chinese() -> Self {
        Self::new("第{page}页/共{total}页")
    }

    pub fn label(&self, page: usize, total: usize) -> String {
        self.template
            .replace("{page}", &page.to_string())
            .replace("{total}", &total.to_string())
    }
}

/// Stamps "page i of N" labels once the total page count is known.
pub struct PageCounterAnnotator {
    spec: PageCounterSpec,
    cjk_font: String,
    font_source: Arc<dyn FontSource>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl PageCounterAnnotator {
    pub fn new(
        spec: PageCounterSpec,
        cjk_font: impl Into<String>,
        font_source: Arc<dyn FontSource>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            spec,
            cjk_font: cjk_font.into(),
            font_source,
            diagnostics,
        }
    }

    pub fn spec(&self) -> &PageCounterSpec {
        &self.spec
    }

    fn counter_font(&self) -> Option<FontProgram> {
        match self.font_source.named(&self.cjk_font) {
            Ok(program) => Some(program),
            Err(err) => {
                self.diagnostics.report(Diagnostic::warning(
                    DiagnosticCode::DecorationFontFallback,
                    format!("page counter: {err}; using {DEFAULT_FONT}"),
                ));
                match self.font_source.named(DEFAULT_FONT) {
                    Ok(program) => Some(program),
                    Err(err) => {
                        self.diagnostics.report(Diagnostic::error(
                            DiagnosticCode::DecorationSkipped,
                            format!("page counter: no font available ({err})"),
                        ));
                        None
                    }
                }
            }
        }
    }

    /// Returns the number of pages stamped.
    pub fn annotate(&self, pdf: &mut LoDocument) -> Result<usize, ConvertError> {
        let page_ids: Vec<ObjectId> = pdf.get_pages().values().copied().collect();
        let total = page_ids.len();
        if total == 0 {
            return Ok(0);
        }
        let Some(program) = self.counter_font() else {
            return Ok(0);
        };

        let labels: Vec<String> = (1..=total).map(|page| self.spec.label(page, total)).collect();
        let mut usage = GlyphUsage::new();
        if let FontProgram::Embedded(font) = &program {
            for label in &labels {
                record_glyphs(font, label, &mut usage);
            }
        }
        let font_id = add_font_objects(pdf, &program, &usage);

        for (page_id, label) in page_ids.into_iter().zip(&labels) {
            let page = pdf
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(ConvertError::output)?
                .clone();
            let (left, bottom, right) = page_box(&page);
            let width = program.measure(self.spec.font_size, label);
            let x = left.mul_ratio(1, 2) + right.mul_ratio(1, 2) - width.mul_ratio(1, 2);
            let y = bottom + self.spec.bottom_offset;

            let mut resources = page_resources_dict(&page, pdf);
            let mut fonts = resource_subdict(&resources, b"Font", pdf);
            fonts.set(COUNTER_FONT_RESOURCE, font_id);
            resources.set("Font", fonts);

            let mut content = String::from("q\n");
            content.push_str(&text_operation(
                COUNTER_FONT_RESOURCE,
                &program,
                self.spec.font_size,
                x,
                y,
                label,
            ));
            content.push_str("Q\n");
            let content_id = pdf.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let page_mut = pdf
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(ConvertError::output)?;
            page_mut.set("Resources", resources);
            let mut contents = match page_mut.get(b"Contents") {
                Ok(Object::Array(items)) => items.clone(),
                Ok(other) => vec![other.clone()],
                Err(_) => Vec::new(),
            };
            contents.insert(0, content_id.into());
            page_mut.set("Contents", contents);
        }
        Ok(total)
    }
}

/// (left, bottom, right) of the page's MediaBox.
fn page_box(page: &Dictionary) -> (Pt, Pt, Pt) {
    let coords: Vec<f32> = page
        .get(b"MediaBox")
        .and_then(Object::as_array)
        .map(|items| items.iter().filter_map(|o| o.as_float().ok()).collect())
        .unwrap_or_default();
    match coords.as_slice() {
        [left, bottom, right, _top] => (
            Pt::from_f32(*left),
            Pt::from_f32(*bottom),
            Pt::from_f32(*right),
        ),
        _ => (Pt::ZERO, Pt::ZERO, Pt::from_f32(612.0)),
    }
}

fn page_resources_dict(page: &Dictionary, doc: &LoDocument) -> Dictionary {
    match page.get(b"Resources") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn resource_subdict(resources: &Dictionary, key: &[u8], doc: &LoDocument) -> Dictionary {
    match resources.get(key) {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Reopens the intermediate artifact, stamps page counters when configured
/// and copies the result into `out`. Returns the number of bytes written.
pub fn finalize_artifact<W: Write>(
    artifact: &Path,
    annotator: Option<&PageCounterAnnotator>,
    out: &mut W,
) -> Result<usize, ConvertError> {
    let mut pdf = LoDocument::load(artifact).map_err(ConvertError::output)?;
    if let Some(annotator) = annotator {
        let stamped = annotator.annotate(&mut pdf)?;
        log::debug!(target: crate::diagnostics::LOG_TARGET, "page counter stamped {stamped} pages");
    }
    pdf.compress();
    let mut buffer = Vec::new();
    pdf.save_to(&mut buffer).map_err(ConvertError::output)?;
    out.write_all(&buffer).map_err(ConvertError::output)?;
    out.flush().map_err(ConvertError::output)?;
    Ok(buffer.len())
}
