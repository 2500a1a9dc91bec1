mod canvas;
mod decoration;
mod diagnostics;
mod entities;
mod error;
mod finalize;
mod font;
mod layout;
mod pdf;
mod pipeline;
#[cfg(test)]
mod test_support;
mod types;

pub use canvas::{Canvas, Command, Document, FontId, FontTable, HAlign, Page, VAlign};
pub use decoration::{
    FooterHandler, HeaderHandler, PageEvent, PageEventHandler, WatermarkHandler,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCode, Diagnostics, LogDiagnostics, RecordingDiagnostics, Severity,
};
pub use entities::{normalize_entities, normalize_str};
pub use error::{ConvertError, ErrorKind};
pub use finalize::{PageCounterAnnotator, PageCounterSpec, finalize_artifact};
pub use font::{
    BundledFonts, DEFAULT_CJK_FONT, DEFAULT_FONT, EmbeddedFont, FamilyFiles, FontCatalog,
    FontKey, FontLoadError, FontMetrics, FontProgram, FontRequest, FontResolver, FontSource,
    FontTier, StandardCjkFont, StandardFont, TextRun, TierOutcome,
};
pub use layout::{FlowLayout, LayoutEngine, LayoutRequest, PageSink};
pub use pdf::write_document;
pub use pipeline::{ConvertReport, PipelineState};
pub use types::{Color, Margins, POINTS_PER_MM, Pt, Rect, Size};

use pipeline::{DocumentRenderPipeline, InputOrigin};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configured converter. Cheap to share across threads; every call to
/// [`Converter::convert`] owns its own catalog, document and artifact.
pub struct Converter {
    handlers: Vec<Arc<dyn PageEventHandler>>,
    page_counter: Option<PageCounterSpec>,
    family_files: FamilyFiles,
    cjk_font: String,
    font_source: Arc<dyn FontSource>,
    layout_engine: Arc<dyn LayoutEngine>,
    artifact_dir: Option<PathBuf>,
    content_offset: (Pt, Pt),
    page_size: Size,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Default for Converter {
    fn default() -> Self {
        Converter::builder().build()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    pub fn page_counter(&self) -> Option<&PageCounterSpec> {
        self.page_counter.as_ref()
    }

    pub fn cjk_font(&self) -> &str {
        &self.cjk_font
    }

    /// Converts markup read from `input` into a PDF written to `output`.
    ///
    /// `custom_font_dir` is searched for the configured family files; when it
    /// is `None` or incomplete the standard CJK font and then the built-in
    /// fonts are used. `page_size` defaults to A4.
    pub fn convert<R: Read, W: Write>(
        &self,
        input: R,
        custom_font_dir: Option<&Path>,
        output: &mut W,
        page_size: Option<Size>,
    ) -> Result<ConvertReport, ConvertError> {
        DocumentRenderPipeline::new(self).run(
            input,
            InputOrigin::Stream,
            custom_font_dir,
            page_size,
            output,
        )
    }

    /// Like [`Converter::convert`], reading from a file. The intermediate
    /// PDF is created next to the input.
    pub fn convert_file<W: Write>(
        &self,
        path: impl AsRef<Path>,
        custom_font_dir: Option<&Path>,
        output: &mut W,
        page_size: Option<Size>,
    ) -> Result<ConvertReport, ConvertError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            ConvertError::MalformedInput(format!("cannot open {}: {err}", path.display()))
        })?;
        DocumentRenderPipeline::new(self).run(
            file,
            InputOrigin::File(path),
            custom_font_dir,
            page_size,
            output,
        )
    }
}

pub struct ConverterBuilder {
    header: Option<String>,
    footer: Option<String>,
    watermark: Option<WatermarkHandler>,
    page_counter: Option<PageCounterSpec>,
    family_files: FamilyFiles,
    cjk_font: String,
    font_source: Arc<dyn FontSource>,
    layout_engine: Arc<dyn LayoutEngine>,
    artifact_dir: Option<PathBuf>,
    content_offset: (Pt, Pt),
    page_size: Size,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self {
            header: None,
            footer: None,
            watermark: None,
            page_counter: None,
            family_files: FamilyFiles::default(),
            cjk_font: DEFAULT_CJK_FONT.to_string(),
            font_source: Arc::new(BundledFonts),
            layout_engine: Arc::new(FlowLayout::new()),
            artifact_dir: None,
            content_offset: (Pt::ZERO, Pt::ZERO),
            page_size: Size::a4(),
            diagnostics: Arc::new(LogDiagnostics),
        }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.header = Some(text.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    pub fn watermark(mut self, watermark: WatermarkHandler) -> Self {
        self.watermark = Some(watermark);
        self
    }

    pub fn watermark_text(self, text: impl Into<String>) -> Self {
        self.watermark(WatermarkHandler::new(text))
    }

    pub fn page_counter(mut self, spec: PageCounterSpec) -> Self {
        self.page_counter = Some(spec);
        self
    }

    pub fn family_files(mut self, files: FamilyFiles) -> Self {
        self.family_files = files;
        self
    }

    pub fn cjk_font(mut self, name: impl Into<String>) -> Self {
        self.cjk_font = name.into();
        self
    }

    pub fn font_source(mut self, source: Arc<dyn FontSource>) -> Self {
        self.font_source = source;
        self
    }

    pub fn layout_engine(mut self, engine: Arc<dyn LayoutEngine>) -> Self {
        self.layout_engine = engine;
        self
    }

    // Overrides the input's directory and the OS temp dir.
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn content_offset(mut self, x: f32, y: f32) -> Self {
        self.content_offset = (Pt::from_f32(x), Pt::from_f32(y));
        self
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn build(self) -> Converter {
        // Handlers run in a fixed order: header, footer, watermark.
        let mut handlers: Vec<Arc<dyn PageEventHandler>> = Vec::with_capacity(3);
        if let Some(text) = self.header {
            handlers.push(Arc::new(HeaderHandler::new(text)));
        }
        if let Some(text) = self.footer {
            handlers.push(Arc::new(FooterHandler::new(text)));
        }
        if let Some(watermark) = self.watermark {
            handlers.push(Arc::new(watermark));
        }
        Converter {
            handlers,
            page_counter: self.page_counter,
            family_files: self.family_files,
            cjk_font: self.cjk_font,
            font_source: self.font_source,
            layout_engine: self.layout_engine,
            artifact_dir: self.artifact_dir,
            content_offset: self.content_offset,
            page_size: self.page_size,
            diagnostics: self.diagnostics,
        }
    }
}

/// Converts with the default configuration.
pub fn convert<R: Read, W: Write>(
    input: R,
    custom_font_dir: Option<&Path>,
    output: &mut W,
    page_size: Option<Size>,
) -> Result<ConvertReport, ConvertError> {
    Converter::default().convert(input, custom_font_dir, output, page_size)
}

pub fn convert_file<W: Write>(
    path: impl AsRef<Path>,
    custom_font_dir: Option<&Path>,
    output: &mut W,
    page_size: Option<Size>,
) -> Result<ConvertReport, ConvertError> {
    Converter::default().convert_file(path, custom_font_dir, output, page_size)
}

/// Page size from millimetres.
pub fn create_page_size(width_mm: f32, height_mm: f32) -> Size {
    Size::from_mm(width_mm, height_mm)
}

/// `None` for empty or whitespace-only text.
pub fn string_to_stream(text: &str) -> Option<Cursor<Vec<u8>>> {
    if text.trim().is_empty() {
        return None;
    }
    Some(Cursor::new(text.as_bytes().to_vec()))
}
