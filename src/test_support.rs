//! Fixtures shared by the unit tests: a tiny synthetic TrueType program and a
//! font source whose availability can be switched off per tier.

use crate::font::{BundledFonts, FontLoadError, FontProgram, FontSource, StandardFont};
use std::path::Path;

pub(crate) const CJK_TEST_CHARS: [char; 2] = ['中', '文'];

/// Builds a font with `.notdef`, printable ASCII (600 units) and, when
/// `with_cjk` is set, two CJK glyphs (1000 units). 1000 units per em.
pub(crate) fn font_bytes(with_cjk: bool) -> Vec<u8> {
    let cjk: &[char] = if with_cjk { &CJK_TEST_CHARS } else { &[] };
    let num_glyphs = 1 + 95 + cjk.len() as u16;

    // (start, end, first gid)
    let mut segments: Vec<(u16, u16, u16)> = vec![(0x20, 0x7E, 1)];
    for (idx, ch) in cjk.iter().enumerate() {
        let code = *ch as u32 as u16;
        segments.push((code, code, 96 + idx as u16));
    }
    segments.push((0xFFFF, 0xFFFF, 0));

    let mut advances = vec![500u16];
    advances.extend(std::iter::repeat_n(600u16, 95));
    advances.extend(std::iter::repeat_n(1000u16, cjk.len()));

    let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"cmap", cmap_table(&segments)),
        (b"head", head_table()),
        (b"hhea", hhea_table(num_glyphs)),
        (b"hmtx", hmtx_table(&advances)),
        (b"maxp", maxp_table(num_glyphs)),
    ];

    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, tables.len() as u16);
    push_u16(&mut out, 64);
    push_u16(&mut out, 2);
    push_u16(&mut out, tables.len() as u16 * 16 - 64);

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        push_u32(&mut out, 0);
        push_u32(&mut out, offset as u32);
        push_u32(&mut out, data.len() as u32);
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    out.extend_from_slice(&body);
    out
}

pub(crate) fn write_font(path: &Path, with_cjk: bool) {
    std::fs::write(path, font_bytes(with_cjk)).expect("write test font");
}

fn cmap_table(segments: &[(u16, u16, u16)]) -> Vec<u8> {
    let seg_count = segments.len() as u16;
    let mut entry_selector = 0u16;
    while (1u16 << (entry_selector + 1)) <= seg_count {
        entry_selector += 1;
    }
    let search_range = 2 * (1u16 << entry_selector);

    let mut sub = Vec::new();
    push_u16(&mut sub, 4);
    push_u16(&mut sub, 16 + 8 * seg_count);
    push_u16(&mut sub, 0);
    push_u16(&mut sub, seg_count * 2);
    push_u16(&mut sub, search_range);
    push_u16(&mut sub, entry_selector);
    push_u16(&mut sub, seg_count * 2 - search_range);
    for (_, end, _) in segments {
        push_u16(&mut sub, *end);
    }
    push_u16(&mut sub, 0);
    for (start, _, _) in segments {
        push_u16(&mut sub, *start);
    }
    for (start, _, gid) in segments {
        let delta = if *start == 0xFFFF {
            1
        } else {
            gid.wrapping_sub(*start)
        };
        push_u16(&mut sub, delta);
    }
    for _ in segments {
        push_u16(&mut sub, 0);
    }

    let mut out = Vec::new();
    push_u16(&mut out, 0);
    push_u16(&mut out, 1);
    push_u16(&mut out, 3);
    push_u16(&mut out, 1);
    push_u32(&mut out, 12);
    out.extend_from_slice(&sub);
    out
}

fn head_table() -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u32(&mut out, 0x0001_0000);
    push_u32(&mut out, 0);
    push_u32(&mut out, 0x5F0F_3CF5);
    push_u16(&mut out, 0);
    push_u16(&mut out, 1000);
    out.extend_from_slice(&[0u8; 16]);
    push_i16(&mut out, 0);
    push_i16(&mut out, -200);
    push_i16(&mut out, 1000);
    push_i16(&mut out, 800);
    push_u16(&mut out, 0);
    push_u16(&mut out, 8);
    push_i16(&mut out, 2);
    push_i16(&mut out, 0);
    push_i16(&mut out, 0);
    debug_assert_eq!(out.len(), 54);
    out
}

fn hhea_table(num_metrics: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_i16(&mut out, 800);
    push_i16(&mut out, -200);
    push_i16(&mut out, 0);
    push_u16(&mut out, 1000);
    push_i16(&mut out, 0);
    push_i16(&mut out, 0);
    push_i16(&mut out, 1000);
    push_i16(&mut out, 1);
    push_i16(&mut out, 0);
    push_i16(&mut out, 0);
    out.extend_from_slice(&[0u8; 8]);
    push_i16(&mut out, 0);
    push_u16(&mut out, num_metrics);
    debug_assert_eq!(out.len(), 36);
    out
}

fn hmtx_table(advances: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    for adv in advances {
        push_u16(&mut out, *adv);
        push_i16(&mut out, 0);
    }
    out
}

fn maxp_table(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0000_5000);
    push_u16(&mut out, num_glyphs);
    out
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Font source with per-tier availability switches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TestFontSource {
    pub cjk: bool,
    pub standard: bool,
    pub builtin: bool,
}

impl TestFontSource {
    pub fn bundled() -> Self {
        Self {
            cjk: true,
            standard: true,
            builtin: true,
        }
    }

    pub fn builtin_only() -> Self {
        Self {
            cjk: false,
            standard: true,
            builtin: true,
        }
    }

    pub fn empty() -> Self {
        Self {
            cjk: false,
            standard: false,
            builtin: false,
        }
    }
}

impl FontSource for TestFontSource {
    fn named(&self, name: &str) -> Result<FontProgram, FontLoadError> {
        let is_standard = StandardFont::lookup(name).is_some();
        let allowed = if is_standard { self.standard } else { self.cjk };
        if !allowed {
            return Err(FontLoadError::Unavailable(name.to_string()));
        }
        BundledFonts.named(name)
    }

    fn builtin(&self) -> Result<Vec<FontProgram>, FontLoadError> {
        if !self.builtin {
            return Err(FontLoadError::Unavailable("base-14 set".to_string()));
        }
        BundledFonts.builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_font_parses() {
        let data = font_bytes(true);
        let face = ttf_parser::Face::parse(&data, 0).expect("face");
        assert_eq!(face.units_per_em(), 1000);
        assert_eq!(face.number_of_glyphs(), 98);
        assert_eq!(face.glyph_index('A').map(|g| g.0), Some(34));
        assert_eq!(face.glyph_index('文').map(|g| g.0), Some(97));
        assert_eq!(face.glyph_hor_advance(ttf_parser::GlyphId(34)), Some(600));
    }
}
