use crate::canvas::{Canvas, FontId, FontTable, HAlign, Page, VAlign};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::font::{DEFAULT_FONT, FontProgram, FontSource};
use crate::types::{Color, Pt};

pub const HEADER_FONT_SIZE: f32 = 10.0;
pub const HEADER_TEXT_OFFSET: f32 = 20.0;
pub const HEADER_RULE_OFFSET: f32 = 25.0;
pub const FOOTER_FONT_SIZE: f32 = 7.0;
pub const FOOTER_TEXT_OFFSET: f32 = 32.0;
pub const FOOTER_RULE_OFFSET: f32 = 27.0;
pub const RULE_INSET: f32 = 80.0;
pub const RULE_WIDTH: f32 = 0.5;
pub const WATERMARK_FONT_SIZE: f32 = 16.0;
pub const WATERMARK_OPACITY: f32 = 0.5;
pub const WATERMARK_GRID: u32 = 5;
pub const WATERMARK_ANGLE_DEGREES: f32 = 45.0;

pub fn rule_color() -> Color {
    Color::rgb8(60, 60, 60)
}

/// Fired once per page, right after the page's layout is final.
pub struct PageEvent<'a> {
    pub page: &'a mut Page,
    pub fonts: &'a mut FontTable,
    pub font_source: &'a dyn FontSource,
    pub cjk_font: &'a str,
    pub diagnostics: &'a dyn Diagnostics,
}

impl PageEvent<'_> {
    /// Named CJK font, then the default font. `None` means the page is left
    /// undecorated; the reason has already been reported.
    pub fn decoration_font(&mut self, handler: &str) -> Option<(FontId, FontProgram)> {
        let program = match self.font_source.named(self.cjk_font) {
            Ok(program) => program,
            Err(err) => {
                self.diagnostics.report(Diagnostic::warning(
                    DiagnosticCode::DecorationFontFallback,
                    format!("{handler}: {err}; using {DEFAULT_FONT}"),
                ));
                match self.font_source.named(DEFAULT_FONT) {
                    Ok(program) => program,
                    Err(err) => {
                        self.diagnostics.report(Diagnostic::error(
                            DiagnosticCode::DecorationSkipped,
                            format!(
                                "{handler}: no font for page {} ({err})",
                                self.page.number()
                            ),
                        ));
                        return None;
                    }
                }
            }
        };
        let id = self.fonts.register(&program);
        Some((id, program))
    }
}

pub trait PageEventHandler: Send + Sync {
    fn on_page_finalized(&self, event: &mut PageEvent<'_>);
}

// Pre-allocation for a watermark grid, bounded so huge grids grow on demand.
fn anchor_capacity(cols: i32, rows: i32) -> usize {
    (cols.max(0) as usize)
        .saturating_mul(rows.max(0) as usize)
        .min(MAX_ANCHOR_PREALLOC)
}

const MAX_ANCHOR_PREALLOC: usize = 1024;

/// Centered band text plus a separator rule, shared by header and footer.
fn draw_band(
    event: &mut PageEvent<'_>,
    handler: &str,
    text: &str,
    font_size: f32,
    text_y: Pt,
    rule_y: Pt,
) {
    let Some((font, program)) = event.decoration_font(handler) else {
        return;
    };
    let bounds = event.page.bounds();
    let size = Pt::from_f32(font_size);
    let x = (bounds.left() + bounds.right()).mul_ratio(1, 2);
    let inset = Pt::from_f32(RULE_INSET);

    let mut canvas = Canvas::new();
    canvas.set_font(font, size);
    canvas.show_text_aligned(
        &program,
        size,
        (x, text_y),
        text,
        HAlign::Center,
        VAlign::Baseline,
        0.0,
    );
    canvas.set_stroke_color(rule_color());
    canvas.set_line_width(Pt::from_f32(RULE_WIDTH));
    canvas.line(
        bounds.left() + inset,
        rule_y,
        bounds.right() - inset,
        rule_y,
    );
    event.page.prepend_layer(canvas);
}

/// Header band; the first page stays clean.
#[derive(Debug, Clone)]
pub struct HeaderHandler {
    text: String,
}

impl HeaderHandler {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PageEventHandler for HeaderHandler {
    fn on_page_finalized(&self, event: &mut PageEvent<'_>) {
        if event.page.number() == 1 {
            return;
        }
        let top = event.page.bounds().top();
        draw_band(
            event,
            "header",
            &self.text,
            HEADER_FONT_SIZE,
            top - Pt::from_f32(HEADER_TEXT_OFFSET),
            top - Pt::from_f32(HEADER_RULE_OFFSET),
        );
    }
}

/// Footer band; the first page stays clean.
#[derive(Debug, Clone)]
pub struct FooterHandler {
    text: String,
}

impl FooterHandler {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PageEventHandler for FooterHandler {
    fn on_page_finalized(&self, event: &mut PageEvent<'_>) {
        if event.page.number() == 1 {
            return;
        }
        let bottom = event.page.bounds().bottom();
        draw_band(
            event,
            "footer",
            &self.text,
            FOOTER_FONT_SIZE,
            bottom + Pt::from_f32(FOOTER_TEXT_OFFSET),
            bottom + Pt::from_f32(FOOTER_RULE_OFFSET),
        );
    }
}

/// Tiles rotated, translucent text over every page, first page included.
#[derive(Debug, Clone)]
pub struct WatermarkHandler {
    text: String,
    columns: u32,
    rows: u32,
    angle: f32,
}

impl WatermarkHandler {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            columns: WATERMARK_GRID,
            rows: WATERMARK_GRID,
            angle: WATERMARK_ANGLE_DEGREES.to_radians(),
        }
    }

    pub fn grid(mut self, columns: u32, rows: u32) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    pub fn angle_radians(mut self, radians: f32) -> Self {
        self.angle = radians;
        self
    }

    pub fn angle_degrees(mut self, degrees: f32) -> Self {
        self.angle = degrees.to_radians();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Rotation in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Anchor points in the order they are drawn: column-major.
    pub fn anchors(&self, page: &Page) -> Vec<(Pt, Pt)> {
        let bounds = page.bounds();
        let cols = self.columns.min(i32::MAX as u32 - 1) as i32;
        let rows = self.rows.min(i32::MAX as u32 - 1) as i32;
        let mut out = Vec::with_capacity(anchor_capacity(cols, rows));
        for i in 1..=cols {
            let x = bounds.left() + bounds.width.mul_ratio(i, cols + 1);
            for j in 1..=rows {
                let y = bounds.bottom() + bounds.height.mul_ratio(j, rows + 1);
                out.push((x, y));
            }
        }
        out
    }
}

impl PageEventHandler for WatermarkHandler {
    fn on_page_finalized(&self, event: &mut PageEvent<'_>) {
        let anchors = self.anchors(event.page);
        if anchors.is_empty() {
            return;
        }
        let Some((font, program)) = event.decoration_font("watermark") else {
            return;
        };
        let size = Pt::from_f32(WATERMARK_FONT_SIZE);
        let mut canvas = Canvas::new();
        canvas.set_fill_color(Color::LIGHT_GRAY);
        canvas.set_opacity(WATERMARK_OPACITY, WATERMARK_OPACITY);
        canvas.set_font(font, size);
        for anchor in anchors {
            canvas.show_text_aligned(
                &program,
                size,
                anchor,
                &self.text,
                HAlign::Center,
                VAlign::Middle,
                self.angle,
            );
        }
        event.page.prepend_layer(canvas);
    }
}
