use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::ConvertError;
use crate::types::Pt;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use ttf_parser::GlyphId;

pub const DEFAULT_REGULAR_FILE: &str = "msyh.ttf";
pub const DEFAULT_BOLD_FILE: &str = "msyhbd.ttf";
pub const DEFAULT_CJK_FONT: &str = "STSongStd-Light";
pub const DEFAULT_FONT: &str = "Helvetica";

/// Family names that pages commonly request for Chinese text. They resolve to
/// the catalog's default family when no entry claims them.
const CJK_FAMILY_ALIASES: &[&str] = &[
    "simsun",
    "nsimsun",
    "simhei",
    "microsoft yahei",
    "宋体",
    "新宋体",
    "黑体",
    "微软雅黑",
    "stsong",
    "serif",
    "sans-serif",
];

#[derive(Debug, Error)]
pub enum FontLoadError {
    #[error("font file {} could not be read: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a usable TrueType/OpenType program")]
    Parse(String),
    #[error("font {0} is not available")]
    Unavailable(String),
}

/// Which fallback tier produced a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontTier {
    CustomFamily,
    StandardCjk,
    BuiltIn,
}

impl fmt::Display for FontTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontTier::CustomFamily => "custom family",
            FontTier::StandardCjk => "standard CJK font",
            FontTier::BuiltIn => "built-in fonts",
        })
    }
}

/// File names looked up inside the custom font directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyFiles {
    pub regular: String,
    pub bold: String,
}

impl Default for FamilyFiles {
    fn default() -> Self {
        Self {
            regular: DEFAULT_REGULAR_FILE.to_string(),
            bold: DEFAULT_BOLD_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRequest {
    pub family: String,
    pub bold: bool,
}

impl FontRequest {
    pub fn new(family: impl Into<String>, bold: bool) -> Self {
        Self {
            family: family.into(),
            bold,
        }
    }
}

/// Vertical metrics in 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub cap_height: i16,
    pub italic_angle: i16,
    pub bbox: (i16, i16, i16, i16),
    pub missing_width: u16,
    pub is_fixed_pitch: bool,
}

impl FontMetrics {
    fn line_height(&self, font_size: Pt) -> Pt {
        let height_1000 = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        if height_1000 <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(height_1000, 1000)
    }
}

/// TrueType/OpenType program read from disk and embedded into the output.
#[derive(Debug)]
pub struct EmbeddedFont {
    name: String,
    family: String,
    aliases: Vec<String>,
    data: Vec<u8>,
    metrics: FontMetrics,
    glyphs: HashMap<u32, u16>,
    advances: Vec<u16>,
    is_cff: bool,
}

impl EmbeddedFont {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontLoadError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| FontLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data, path)
    }

    pub fn from_bytes(data: Vec<u8>, source: &Path) -> Result<Self, FontLoadError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|_| FontLoadError::Parse(source.display().to_string()))?;

        let (name, family, aliases) = font_names(&face, source);
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code| {
                    if let Some(gid) = subtable.glyph_index(code) {
                        if gid.0 != 0 {
                            glyphs.entry(code).or_insert(gid.0);
                        }
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(FontLoadError::Parse(format!(
                "{} (no Unicode cmap)",
                source.display()
            )));
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| {
                let adv = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
                let scaled = (adv as f32 * scale).round() as i32;
                scaled.clamp(0, u16::MAX as i32) as u16
            })
            .collect::<Vec<_>>();

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let bbox = face.global_bounding_box();
        let missing_width = glyphs
            .get(&(' ' as u32))
            .and_then(|gid| advances.get(*gid as usize))
            .copied()
            .unwrap_or(500);
        let metrics = FontMetrics {
            ascent,
            descent,
            line_gap: scale_i16(face.line_gap(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
        };
        let is_cff = face.tables().cff.is_some();

        Ok(Self {
            name,
            family,
            aliases,
            data,
            metrics,
            glyphs,
            advances,
            is_cff,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn is_cff(&self) -> bool {
        self.is_cff
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.glyphs.get(&(ch as u32)).copied()
    }

    /// Horizontal advance in 1/1000 em.
    pub fn glyph_advance(&self, gid: u16) -> u16 {
        match self.advances.get(gid as usize) {
            Some(adv) if *adv > 0 => *adv,
            _ => self.metrics.missing_width,
        }
    }
}

/// Non-embedded CJK font from the Adobe character collections, addressed
/// through a Unicode CMap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardCjkFont {
    pub name: String,
    pub ordering: &'static str,
    pub supplement: i64,
    pub cmap: &'static str,
}

impl StandardCjkFont {
    pub fn gb1(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordering: "GB1",
            supplement: 4,
            cmap: "UniGB-UTF16-H",
        }
    }

    pub const METRICS: FontMetrics = FontMetrics {
        ascent: 880,
        descent: -120,
        line_gap: 0,
        cap_height: 880,
        italic_angle: 0,
        bbox: (-25, -254, 1000, 880),
        missing_width: 1000,
        is_fixed_pitch: false,
    };

    /// Printable ASCII maps to half-width CIDs 1..=95.
    pub fn char_width(ch: char) -> u16 {
        if (' '..='~').contains(&ch) { 500 } else { 1000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base14Family {
    Helvetica,
    Times,
    Courier,
    Symbol,
    ZapfDingbats,
}

/// One of the fourteen standard PDF fonts, WinAnsi encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFont {
    pub name: &'static str,
    pub family: Base14Family,
    pub bold: bool,
}

const BASE14: &[StandardFont] = &[
    StandardFont::new("Helvetica", Base14Family::Helvetica, false),
    StandardFont::new("Helvetica-Bold", Base14Family::Helvetica, true),
    StandardFont::new("Helvetica-Oblique", Base14Family::Helvetica, false),
    StandardFont::new("Helvetica-BoldOblique", Base14Family::Helvetica, true),
    StandardFont::new("Times-Roman", Base14Family::Times, false),
    StandardFont::new("Times-Bold", Base14Family::Times, true),
    StandardFont::new("Times-Italic", Base14Family::Times, false),
    StandardFont::new("Times-BoldItalic", Base14Family::Times, true),
    StandardFont::new("Courier", Base14Family::Courier, false),
    StandardFont::new("Courier-Bold", Base14Family::Courier, true),
    StandardFont::new("Courier-Oblique", Base14Family::Courier, false),
    StandardFont::new("Courier-BoldOblique", Base14Family::Courier, true),
    StandardFont::new("Symbol", Base14Family::Symbol, false),
    StandardFont::new("ZapfDingbats", Base14Family::ZapfDingbats, false),
];

// Helvetica advances for U+0020..=U+007E. Times shares them for measurement.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

impl StandardFont {
    const fn new(name: &'static str, family: Base14Family, bold: bool) -> Self {
        Self { name, family, bold }
    }

    pub fn lookup(name: &str) -> Option<StandardFont> {
        let key = normalize_name(name);
        BASE14
            .iter()
            .find(|font| font.name.to_ascii_lowercase() == key)
            .cloned()
    }

    pub fn family_name(&self) -> &'static str {
        match self.family {
            Base14Family::Helvetica => "Helvetica",
            Base14Family::Times => "Times",
            Base14Family::Courier => "Courier",
            Base14Family::Symbol => "Symbol",
            Base14Family::ZapfDingbats => "ZapfDingbats",
        }
    }

    fn is_text_font(&self) -> bool {
        !matches!(self.family, Base14Family::Symbol | Base14Family::ZapfDingbats)
    }

    pub fn supports_char(&self, ch: char) -> bool {
        self.is_text_font() && winansi_byte(ch).is_some()
    }

    pub fn char_width(&self, ch: char) -> u16 {
        if self.family == Base14Family::Courier {
            return 600;
        }
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            HELVETICA_WIDTHS[(code - 0x20) as usize]
        } else {
            556
        }
    }

    pub fn metrics(&self) -> FontMetrics {
        let (ascent, descent) = match self.family {
            Base14Family::Helvetica => (718, -207),
            Base14Family::Times => (683, -217),
            Base14Family::Courier => (629, -157),
            Base14Family::Symbol | Base14Family::ZapfDingbats => (700, -200),
        };
        FontMetrics {
            ascent,
            descent,
            line_gap: 0,
            cap_height: ascent,
            italic_angle: 0,
            bbox: (-166, -225, 1000, 931),
            missing_width: 278,
            is_fixed_pitch: self.family == Base14Family::Courier,
        }
    }
}

/// Maps a char to its WinAnsiEncoding byte.
pub fn winansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95),
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

/// A font program that can back text on a page.
#[derive(Debug, Clone)]
pub enum FontProgram {
    Embedded(Arc<EmbeddedFont>),
    StandardCjk(StandardCjkFont),
    Standard(StandardFont),
}

impl FontProgram {
    pub fn name(&self) -> &str {
        match self {
            FontProgram::Embedded(font) => font.name(),
            FontProgram::StandardCjk(font) => &font.name,
            FontProgram::Standard(font) => font.name,
        }
    }

    pub fn supports_char(&self, ch: char) -> bool {
        match self {
            FontProgram::Embedded(font) => font.glyph_id(ch).is_some(),
            FontProgram::StandardCjk(_) => !ch.is_control(),
            FontProgram::Standard(font) => font.supports_char(ch),
        }
    }

    pub fn supports_ascii(&self) -> bool {
        (' '..='~').all(|ch| self.supports_char(ch))
    }

    /// Advance of one char in 1/1000 em.
    pub fn char_width(&self, ch: char) -> u16 {
        match self {
            FontProgram::Embedded(font) => match font.glyph_id(ch) {
                Some(gid) => font.glyph_advance(gid),
                None => font.metrics().missing_width,
            },
            FontProgram::StandardCjk(_) => StandardCjkFont::char_width(ch),
            FontProgram::Standard(font) => font.char_width(ch),
        }
    }

    pub fn metrics(&self) -> FontMetrics {
        match self {
            FontProgram::Embedded(font) => *font.metrics(),
            FontProgram::StandardCjk(_) => StandardCjkFont::METRICS,
            FontProgram::Standard(font) => font.metrics(),
        }
    }

    pub fn measure(&self, font_size: Pt, text: &str) -> Pt {
        let total_units: i32 = text
            .chars()
            .map(|ch| self.char_width(ch) as i32)
            .fold(0i32, |acc, w| acc.saturating_add(w));
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    pub fn line_height(&self, font_size: Pt) -> Pt {
        self.metrics().line_height(font_size)
    }

    /// Offset from the baseline to the vertical middle of the glyph box.
    pub fn middle_offset(&self, font_size: Pt) -> Pt {
        let metrics = self.metrics();
        let mid_1000 = (metrics.ascent as i32 + metrics.descent as i32) / 2;
        font_size.mul_ratio(mid_1000, 1000)
    }
}

/// Capability that knows which named and built-in fonts exist. Hosts and
/// tests use it to declare fonts unavailable.
pub trait FontSource: Send + Sync {
    fn named(&self, name: &str) -> Result<FontProgram, FontLoadError>;

    fn builtin(&self) -> Result<Vec<FontProgram>, FontLoadError>;
}

/// Adobe-GB1 standard CJK fonts and the base-14 set.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledFonts;

const STANDARD_CJK_NAMES: &[&str] = &["STSong-Light", "STSongStd-Light"];

impl FontSource for BundledFonts {
    fn named(&self, name: &str) -> Result<FontProgram, FontLoadError> {
        let key = normalize_name(name);
        if let Some(cjk) = STANDARD_CJK_NAMES
            .iter()
            .find(|candidate| candidate.to_ascii_lowercase() == key)
        {
            return Ok(FontProgram::StandardCjk(StandardCjkFont::gb1(*cjk)));
        }
        StandardFont::lookup(name)
            .map(FontProgram::Standard)
            .ok_or_else(|| FontLoadError::Unavailable(name.to_string()))
    }

    fn builtin(&self) -> Result<Vec<FontProgram>, FontLoadError> {
        Ok(BASE14
            .iter()
            .filter(|font| font.is_text_font())
            .filter(|font| !font.name.contains("Oblique") && !font.name.contains("Italic"))
            .cloned()
            .map(FontProgram::Standard)
            .collect())
    }
}

/// Index of an entry inside a [`FontCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey(usize);

impl FontKey {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub family: String,
    pub bold: bool,
    pub program: FontProgram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub font: FontKey,
    pub text: String,
}

/// Fonts available to one conversion. Never empty; the first entry's family is
/// the document default.
#[derive(Debug, Clone)]
pub struct FontCatalog {
    tier: FontTier,
    entries: Vec<CatalogEntry>,
    aliases: HashMap<String, String>,
}

impl FontCatalog {
    fn new(tier: FontTier, entries: Vec<CatalogEntry>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let mut aliases = HashMap::new();
        for entry in &entries {
            aliases
                .entry(normalize_name(&entry.family))
                .or_insert_with(|| entry.family.clone());
            aliases
                .entry(normalize_name(entry.program.name()))
                .or_insert_with(|| entry.family.clone());
            if let FontProgram::Embedded(font) = &entry.program {
                for alias in font.aliases() {
                    aliases
                        .entry(normalize_name(alias))
                        .or_insert_with(|| entry.family.clone());
                }
            }
        }
        Some(Self {
            tier,
            entries,
            aliases,
        })
    }

    pub fn tier(&self) -> FontTier {
        self.tier
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn default_family(&self) -> &str {
        &self.entries[0].family
    }

    pub fn program(&self, key: FontKey) -> &FontProgram {
        &self.entries[key.0.min(self.entries.len() - 1)].program
    }

    pub fn supports_ascii(&self) -> bool {
        (' '..='~').all(|ch| self.entries.iter().any(|e| e.program.supports_char(ch)))
    }

    pub fn resolve(&self, request: &FontRequest) -> FontKey {
        let key = normalize_name(&request.family);
        let family = self
            .aliases
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| self.default_family());
        self.pick(family, request.bold)
    }

    fn pick(&self, family: &str, bold: bool) -> FontKey {
        let same_family = |entry: &&CatalogEntry| entry.family == family;
        if let Some(idx) = self
            .entries
            .iter()
            .position(|entry| same_family(&entry) && entry.bold == bold)
        {
            return FontKey(idx);
        }
        self.entries
            .iter()
            .position(|entry| same_family(&entry) && !entry.bold)
            .or_else(|| self.entries.iter().position(|entry| same_family(&entry)))
            .map(FontKey)
            .unwrap_or(FontKey(0))
    }

    /// Splits text into runs so every char lands on the first catalog entry
    /// that covers it, starting with `key`.
    pub fn split_runs(&self, key: FontKey, text: &str) -> Vec<TextRun> {
        let mut order: Vec<FontKey> = Vec::with_capacity(self.entries.len());
        order.push(key);
        order.extend((0..self.entries.len()).map(FontKey).filter(|k| *k != key));

        let mut support_cache: HashMap<(FontKey, char), bool> = HashMap::new();
        let mut runs: Vec<TextRun> = Vec::new();
        for ch in text.chars() {
            let chosen = order
                .iter()
                .copied()
                .find(|candidate| {
                    *support_cache
                        .entry((*candidate, ch))
                        .or_insert_with(|| self.program(*candidate).supports_char(ch))
                })
                .unwrap_or(key);
            match runs.last_mut() {
                Some(run) if run.font == chosen => run.text.push(ch),
                _ => runs.push(TextRun {
                    font: chosen,
                    text: ch.to_string(),
                }),
            }
        }
        runs
    }

    pub fn measure(&self, key: FontKey, font_size: Pt, text: &str) -> Pt {
        self.split_runs(key, text)
            .iter()
            .map(|run| self.program(run.font).measure(font_size, &run.text))
            .sum()
    }

    pub fn line_height(&self, key: FontKey, font_size: Pt) -> Pt {
        self.program(key).line_height(font_size)
    }
}

/// Result of one fallback tier.
pub enum TierOutcome {
    Resolved(FontCatalog),
    Next(String),
}

/// Builds the font catalog through three ordered tiers: a custom family read
/// from disk, a named standard CJK font, the built-in base-14 set.
#[derive(Clone)]
pub struct FontResolver {
    family_files: FamilyFiles,
    cjk_font: String,
    source: Arc<dyn FontSource>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl FontResolver {
    pub fn new(source: Arc<dyn FontSource>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            family_files: FamilyFiles::default(),
            cjk_font: DEFAULT_CJK_FONT.to_string(),
            source,
            diagnostics,
        }
    }

    pub fn with_family_files(mut self, files: FamilyFiles) -> Self {
        self.family_files = files;
        self
    }

    pub fn with_cjk_font(mut self, name: impl Into<String>) -> Self {
        self.cjk_font = name.into();
        self
    }

    pub fn resolve(&self, custom_dir: Option<&Path>) -> Result<FontCatalog, ConvertError> {
        let tiers = [FontTier::CustomFamily, FontTier::StandardCjk, FontTier::BuiltIn];
        let mut reasons = Vec::with_capacity(tiers.len());
        for tier in tiers {
            let outcome = match tier {
                FontTier::CustomFamily => self.custom_family(custom_dir),
                FontTier::StandardCjk => self.standard_cjk(),
                FontTier::BuiltIn => self.builtin(),
            };
            match outcome {
                TierOutcome::Resolved(catalog) => {
                    log::debug!(
                        target: crate::diagnostics::LOG_TARGET,
                        "font catalog resolved from {tier} ({} entries)",
                        catalog.len()
                    );
                    return Ok(catalog);
                }
                TierOutcome::Next(reason) => {
                    self.diagnostics.report(Diagnostic::warning(
                        DiagnosticCode::FontTierFallback,
                        format!("{tier} unavailable: {reason}"),
                    ));
                    reasons.push(format!("{tier}: {reason}"));
                }
            }
        }
        Err(ConvertError::FontResolutionExhausted(reasons.join("; ")))
    }

    fn custom_family(&self, custom_dir: Option<&Path>) -> TierOutcome {
        let Some(dir) = custom_dir else {
            return TierOutcome::Next("no custom font directory supplied".to_string());
        };
        if !dir.is_dir() {
            return TierOutcome::Next(format!("{} is not a directory", dir.display()));
        }
        let regular_path = dir.join(&self.family_files.regular);
        let bold_path = dir.join(&self.family_files.bold);
        let mut missing = Vec::new();
        if !regular_path.is_file() {
            missing.push(format!("regular {} missing", self.family_files.regular));
        }
        if !bold_path.is_file() {
            missing.push(format!("bold {} missing", self.family_files.bold));
        }
        if !missing.is_empty() {
            return TierOutcome::Next(missing.join("; "));
        }

        let loaded = EmbeddedFont::from_file(&regular_path)
            .and_then(|regular| EmbeddedFont::from_file(&bold_path).map(|bold| (regular, bold)));
        let (regular, bold) = match loaded {
            Ok(pair) => pair,
            Err(err) => return TierOutcome::Next(err.to_string()),
        };

        let family = regular.family().to_string();
        let mut catalog = match FontCatalog::new(
            FontTier::CustomFamily,
            vec![
                CatalogEntry {
                    family: family.clone(),
                    bold: false,
                    program: FontProgram::Embedded(Arc::new(regular)),
                },
                CatalogEntry {
                    family: family.clone(),
                    bold: true,
                    program: FontProgram::Embedded(Arc::new(bold)),
                },
            ],
        ) {
            Some(catalog) => catalog,
            None => return TierOutcome::Next("custom family produced no entries".to_string()),
        };
        for alias in CJK_FAMILY_ALIASES {
            catalog
                .aliases
                .entry(normalize_name(alias))
                .or_insert_with(|| family.clone());
        }
        TierOutcome::Resolved(catalog)
    }

    fn standard_cjk(&self) -> TierOutcome {
        let program = match self.source.named(&self.cjk_font) {
            Ok(program) => program,
            Err(err) => return TierOutcome::Next(err.to_string()),
        };
        let family = program.name().to_string();
        match FontCatalog::new(
            FontTier::StandardCjk,
            vec![CatalogEntry {
                family,
                bold: false,
                program,
            }],
        ) {
            Some(catalog) => TierOutcome::Resolved(catalog),
            None => TierOutcome::Next("standard CJK font produced no entries".to_string()),
        }
    }

    fn builtin(&self) -> TierOutcome {
        let programs = match self.source.builtin() {
            Ok(programs) => programs,
            Err(err) => return TierOutcome::Next(err.to_string()),
        };
        let entries = programs
            .into_iter()
            .map(|program| {
                let (family, bold) = match &program {
                    FontProgram::Standard(font) => (font.family_name().to_string(), font.bold),
                    other => (other.name().to_string(), false),
                };
                CatalogEntry {
                    family,
                    bold,
                    program,
                }
            })
            .collect::<Vec<_>>();
        let Some(mut catalog) = FontCatalog::new(FontTier::BuiltIn, entries) else {
            return TierOutcome::Next("no built-in fonts available".to_string());
        };
        if !catalog.supports_ascii() {
            return TierOutcome::Next("built-in fonts do not cover ASCII".to_string());
        }
        for (alias, family) in [
            ("sans-serif", "Helvetica"),
            ("arial", "Helvetica"),
            ("serif", "Times"),
            ("times new roman", "Times"),
            ("monospace", "Courier"),
        ] {
            if catalog.entries.iter().any(|entry| entry.family == family) {
                catalog
                    .aliases
                    .entry(alias.to_string())
                    .or_insert_with(|| family.to_string());
            }
        }
        TierOutcome::Resolved(catalog)
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Returns (primary name, family, aliases) from the name table, falling back
/// to the file stem.
fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    let family_name = family
        .clone()
        .or_else(|| stem.clone())
        .unwrap_or_else(|| primary.clone());

    let mut aliases = Vec::new();
    for candidate in [family, full, post, stem].into_iter().flatten() {
        if candidate != primary && !aliases.contains(&candidate) {
            aliases.push(candidate);
        }
    }

    (primary, family_name, aliases)
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::test_support::{TestFontSource, write_font};

    fn resolver(source: TestFontSource, diag: &RecordingDiagnostics) -> FontResolver {
        FontResolver::new(Arc::new(source), Arc::new(diag.clone()))
    }

    #[test]
    fn custom_family_registers_regular_and_bold() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("msyh.ttf"), true);
        write_font(&dir.path().join("msyhbd.ttf"), true);
        let diag = RecordingDiagnostics::new();

        let catalog = resolver(TestFontSource::bundled(), &diag)
            .resolve(Some(dir.path()))
            .expect("catalog");

        assert_eq!(catalog.tier(), FontTier::CustomFamily);
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.entries()[0].bold);
        assert!(catalog.entries()[1].bold);
        assert!(matches!(catalog.entries()[0].program, FontProgram::Embedded(_)));
        assert_eq!(diag.count(DiagnosticCode::FontTierFallback), 0);
    }

    #[test]
    fn unknown_families_resolve_to_custom_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("msyh.ttf"), true);
        write_font(&dir.path().join("msyhbd.ttf"), true);
        let catalog = resolver(TestFontSource::bundled(), &RecordingDiagnostics::new())
            .resolve(Some(dir.path()))
            .expect("catalog");

        for family in ["SimSun", "SimHei", "宋体", "serif", "whatever"] {
            assert_eq!(catalog.resolve(&FontRequest::new(family, false)), FontKey(0));
            assert_eq!(catalog.resolve(&FontRequest::new(family, true)), FontKey(1));
        }
    }

    #[test]
    fn missing_bold_falls_through_to_standard_cjk() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("msyh.ttf"), true);
        let diag = RecordingDiagnostics::new();

        let catalog = resolver(TestFontSource::bundled(), &diag)
            .resolve(Some(dir.path()))
            .expect("catalog");

        assert_eq!(catalog.tier(), FontTier::StandardCjk);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.program(FontKey(0)).name(), "STSongStd-Light");
        assert_eq!(catalog.resolve(&FontRequest::new("SimHei", true)), FontKey(0));
        let messages = diag.messages(DiagnosticCode::FontTierFallback);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("bold msyhbd.ttf missing"));
        assert!(!messages[0].contains("regular"));
    }

    #[test]
    fn both_files_missing_are_reported_together() {
        let dir = tempfile::tempdir().expect("tempdir");
        let diag = RecordingDiagnostics::new();
        resolver(TestFontSource::bundled(), &diag)
            .resolve(Some(dir.path()))
            .expect("catalog");
        let messages = diag.messages(DiagnosticCode::FontTierFallback);
        assert!(messages[0].contains("regular msyh.ttf missing; bold msyhbd.ttf missing"));
    }

    #[test]
    fn unparseable_family_file_falls_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("msyh.ttf"), b"not a font").expect("write");
        write_font(&dir.path().join("msyhbd.ttf"), true);
        let catalog = resolver(TestFontSource::bundled(), &RecordingDiagnostics::new())
            .resolve(Some(dir.path()))
            .expect("catalog");
        assert_eq!(catalog.tier(), FontTier::StandardCjk);
    }

    #[test]
    fn standard_cjk_unavailable_falls_to_builtin() {
        let diag = RecordingDiagnostics::new();
        let catalog = resolver(TestFontSource::builtin_only(), &diag)
            .resolve(None)
            .expect("catalog");

        assert_eq!(catalog.tier(), FontTier::BuiltIn);
        assert!(catalog.supports_ascii());
        assert_eq!(catalog.default_family(), "Helvetica");
        let bold = catalog.resolve(&FontRequest::new("Helvetica", true));
        assert_eq!(catalog.program(bold).name(), "Helvetica-Bold");
        let serif = catalog.resolve(&FontRequest::new("serif", false));
        assert_eq!(catalog.program(serif).name(), "Times-Roman");
        assert_eq!(diag.count(DiagnosticCode::FontTierFallback), 2);
    }

    #[test]
    fn regular_only_dir_without_cjk_font_lands_on_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("msyh.ttf"), true);
        let diag = RecordingDiagnostics::new();

        let catalog = resolver(TestFontSource::builtin_only(), &diag)
            .resolve(Some(dir.path()))
            .expect("catalog");

        assert_eq!(catalog.tier(), FontTier::BuiltIn);
        assert!(!catalog.is_empty());
        assert!(catalog.supports_ascii());
        let messages = diag.messages(DiagnosticCode::FontTierFallback);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("bold msyhbd.ttf missing"));
        assert!(messages[1].starts_with("standard CJK font unavailable"));
    }

    #[test]
    fn exhausted_tiers_are_fatal() {
        let err = resolver(TestFontSource::empty(), &RecordingDiagnostics::new())
            .resolve(None)
            .expect_err("no fonts");
        assert_eq!(err.kind(), crate::error::ErrorKind::FontResolutionExhausted);
    }

    #[test]
    fn split_runs_falls_back_per_char() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("latin.ttf"), false);
        let latin = EmbeddedFont::from_file(dir.path().join("latin.ttf")).expect("font");
        let catalog = FontCatalog::new(
            FontTier::CustomFamily,
            vec![
                CatalogEntry {
                    family: "Latin".to_string(),
                    bold: false,
                    program: FontProgram::Embedded(Arc::new(latin)),
                },
                CatalogEntry {
                    family: "STSongStd-Light".to_string(),
                    bold: false,
                    program: FontProgram::StandardCjk(StandardCjkFont::gb1("STSongStd-Light")),
                },
            ],
        )
        .expect("catalog");

        let runs = catalog.split_runs(FontKey(0), "ab中文c");
        assert_eq!(
            runs,
            vec![
                TextRun {
                    font: FontKey(0),
                    text: "ab".to_string()
                },
                TextRun {
                    font: FontKey(1),
                    text: "中文".to_string()
                },
                TextRun {
                    font: FontKey(0),
                    text: "c".to_string()
                },
            ]
        );
    }

    #[test]
    fn embedded_metrics_come_from_hmtx() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(&dir.path().join("msyh.ttf"), true);
        let font = EmbeddedFont::from_file(dir.path().join("msyh.ttf")).expect("font");
        assert_eq!(font.family(), "msyh");
        let gid = font.glyph_id('A').expect("glyph");
        assert_eq!(font.glyph_advance(gid), 600);
        let program = FontProgram::Embedded(Arc::new(font));
        assert!(program.supports_char('中'));
        assert_eq!(program.measure(Pt::from_i32(10), "AA").to_milli_i64(), 12_000);
        assert_eq!(program.measure(Pt::from_i32(10), "中").to_milli_i64(), 10_000);
    }

    #[test]
    fn standard_cjk_measures_half_width_ascii() {
        let program = FontProgram::StandardCjk(StandardCjkFont::gb1("STSongStd-Light"));
        assert_eq!(program.measure(Pt::from_i32(10), "ab中").to_milli_i64(), 20_000);
    }

    #[test]
    fn bundled_source_knows_cjk_and_base14() {
        assert!(matches!(
            BundledFonts.named("stsongstd-light"),
            Ok(FontProgram::StandardCjk(_))
        ));
        assert!(matches!(
            BundledFonts.named("Helvetica"),
            Ok(FontProgram::Standard(_))
        ));
        assert!(BundledFonts.named("Comic Sans").is_err());
        let builtin = BundledFonts.builtin().expect("builtin");
        assert!(builtin.iter().all(|p| p.name() != "Symbol"));
        assert_eq!(builtin[0].name(), "Helvetica");
    }
}
