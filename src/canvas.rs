use crate::font::FontProgram;
use crate::types::{Color, Pt, Rect, Size};
use std::collections::HashMap;

/// Index into a document's [`FontTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) usize);

impl FontId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Resource name used in page content (`/F1`, `/F2`, ...).
    pub fn resource_name(self) -> String {
        format!("F{}", self.0 + 1)
    }
}

/// Every font referenced by any page of a document, deduplicated by name.
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    programs: Vec<FontProgram>,
    by_name: HashMap<String, FontId>,
}

impl FontTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: &FontProgram) -> FontId {
        if let Some(id) = self.by_name.get(program.name()) {
            return *id;
        }
        let id = FontId(self.programs.len());
        self.by_name.insert(program.name().to_string(), id);
        self.programs.push(program.clone());
        id
    }

    pub fn get(&self, id: FontId) -> Option<&FontProgram> {
        self.programs.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FontId, &FontProgram)> {
        self.programs
            .iter()
            .enumerate()
            .map(|(idx, program)| (FontId(idx), program))
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    Translate(Pt, Pt),
    Rotate(f32),
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    // Applies both fill and stroke alpha (ca/CA). Values outside 0..1 are clamped.
    SetOpacity {
        fill: f32,
        stroke: f32,
    },
    SetFont {
        font: FontId,
        size: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Baseline,
    Middle,
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: Option<(FontId, Pt)>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: None,
        }
    }
}

/// Records drawing commands for one layer of a page.
#[derive(Debug, Default)]
pub struct Canvas {
    commands: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.commands.push(Command::RestoreState);
        }
    }

    pub fn translate(&mut self, x: Pt, y: Pt) {
        self.commands.push(Command::Translate(x, y));
    }

    pub fn rotate(&mut self, angle_radians: f32) {
        self.commands.push(Command::Rotate(angle_radians));
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = if width < Pt::ZERO { Pt::ZERO } else { width };
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_opacity(&mut self, fill: f32, stroke: f32) {
        self.commands.push(Command::SetOpacity {
            fill: fill.clamp(0.0, 1.0),
            stroke: stroke.clamp(0.0, 1.0),
        });
    }

    pub fn set_font(&mut self, font: FontId, size: Pt) {
        if self.current_state.font == Some((font, size)) {
            return;
        }
        self.current_state.font = Some((font, size));
        self.commands.push(Command::SetFont { font, size });
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.commands.push(Command::LineTo { x, y });
    }

    pub fn stroke(&mut self) {
        self.commands.push(Command::Stroke);
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.stroke();
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    /// Draws `text` anchored at (x, y), optionally rotated about the anchor.
    /// The current font must already be set to `font`/`size`.
    pub fn show_text_aligned(
        &mut self,
        program: &FontProgram,
        size: Pt,
        anchor: (Pt, Pt),
        text: &str,
        h_align: HAlign,
        v_align: VAlign,
        rotation: f32,
    ) {
        let width = program.measure(size, text);
        let dx = match h_align {
            HAlign::Left => Pt::ZERO,
            HAlign::Center => -width.mul_ratio(1, 2),
            HAlign::Right => -width,
        };
        let dy = match v_align {
            VAlign::Baseline => Pt::ZERO,
            VAlign::Middle => -program.middle_offset(size),
        };
        let (x, y) = anchor;
        if rotation == 0.0 {
            self.draw_string(x + dx, y + dy, text);
            return;
        }
        self.save_state();
        self.translate(x, y);
        self.rotate(rotation);
        self.draw_string(dx, dy, text);
        self.restore_state();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// A composed page. Layers prepended by decorations are drawn before the
/// content layer, the most recently prepended first.
#[derive(Debug, Clone)]
pub struct Page {
    number: usize,
    bounds: Rect,
    content: Vec<Command>,
    prepended: Vec<Vec<Command>>,
}

impl Page {
    pub fn new(number: usize, size: Size, content: Vec<Command>) -> Self {
        Self {
            number,
            bounds: size.to_rect(),
            content,
            prepended: Vec::new(),
        }
    }

    /// 1-based page ordinal.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn content(&self) -> &[Command] {
        &self.content
    }

    pub fn prepended(&self) -> &[Vec<Command>] {
        &self.prepended
    }

    pub fn prepend_layer(&mut self, canvas: Canvas) {
        if canvas.is_empty() {
            return;
        }
        self.prepended.insert(0, canvas.into_commands());
    }

    /// Layers in paint order: prepended layers, then content.
    pub fn layers(&self) -> impl Iterator<Item = &[Command]> {
        self.prepended
            .iter()
            .map(Vec::as_slice)
            .chain(std::iter::once(self.content.as_slice()))
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.layers().flat_map(|layer| layer.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub fonts: FontTable,
}

impl Document {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            fonts: FontTable::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{StandardCjkFont, StandardFont};

    fn helvetica() -> FontProgram {
        FontProgram::Standard(StandardFont::lookup("Helvetica").expect("helvetica"))
    }

    #[test]
    fn font_table_dedupes_by_name() {
        let mut table = FontTable::new();
        let a = table.register(&helvetica());
        let b = table.register(&FontProgram::StandardCjk(StandardCjkFont::gb1("STSong-Light")));
        let c = table.register(&helvetica());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(b.resource_name(), "F2");
    }

    #[test]
    fn redundant_state_changes_are_dropped() {
        let mut canvas = Canvas::new();
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font(FontId(0), Pt::from_i32(10));
        canvas.set_font(FontId(0), Pt::from_i32(10));
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.set_line_width(Pt::from_f32(0.5));
        assert_eq!(canvas.commands().len(), 2);
    }

    #[test]
    fn centered_text_is_shifted_by_half_width() {
        let program = helvetica();
        let mut canvas = Canvas::new();
        // "ab" is 556 + 556 units.
        canvas.show_text_aligned(
            &program,
            Pt::from_i32(10),
            (Pt::from_i32(100), Pt::from_i32(50)),
            "ab",
            HAlign::Center,
            VAlign::Baseline,
            0.0,
        );
        assert_eq!(
            canvas.commands(),
            &[Command::DrawString {
                x: Pt::from_f32(94.44),
                y: Pt::from_i32(50),
                text: "ab".to_string()
            }]
        );
    }

    #[test]
    fn rotated_text_is_drawn_around_anchor() {
        let program = FontProgram::StandardCjk(StandardCjkFont::gb1("STSongStd-Light"));
        let mut canvas = Canvas::new();
        canvas.show_text_aligned(
            &program,
            Pt::from_i32(16),
            (Pt::from_i32(100), Pt::from_i32(200)),
            "中",
            HAlign::Center,
            VAlign::Middle,
            0.5,
        );
        let cmds = canvas.commands();
        assert_eq!(cmds[0], Command::SaveState);
        assert_eq!(cmds[1], Command::Translate(Pt::from_i32(100), Pt::from_i32(200)));
        assert_eq!(cmds[2], Command::Rotate(0.5));
        // ascent 880, descent -120: middle sits 380/1000 em above the baseline.
        assert_eq!(
            cmds[3],
            Command::DrawString {
                x: Pt::from_i32(-8),
                y: Pt::from_f32(-6.08),
                text: "中".to_string()
            }
        );
        assert_eq!(cmds[4], Command::RestoreState);
    }

    #[test]
    fn prepended_layers_paint_before_content() {
        let mut page = Page::new(1, Size::a4(), vec![Command::Stroke]);
        let mut first = Canvas::new();
        first.rotate(1.0);
        page.prepend_layer(first);
        let mut second = Canvas::new();
        second.rotate(2.0);
        page.prepend_layer(second);
        page.prepend_layer(Canvas::new());

        let order: Vec<&Command> = page.commands().collect();
        assert_eq!(
            order,
            vec![&Command::Rotate(2.0), &Command::Rotate(1.0), &Command::Stroke]
        );
        assert_eq!(page.prepended().len(), 2);
    }
}
