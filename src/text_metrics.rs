//! Text extents for label measurement.
//!
//! Two paths: a font-backed measurer that resolves a CSS-like family list
//! through `fontdb` and sums glyph advances with `ttf-parser`, and a fast
//! per-character width table that needs no fonts at all and is fully
//! deterministic.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::{Face, GlyphId};

/// Ascent and descent used when no font is consulted, as fractions of the
/// font size.
const FALLBACK_ASCENT: f64 = 0.8;
const FALLBACK_DESCENT: f64 = 0.2;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Horizontal advance and vertical extent of a single line of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl TextExtent {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// Measures with the table only.
pub fn fast_extent(text: &str, font_size: f64) -> TextExtent {
    TextExtent {
        width: fallback_text_width(text, font_size),
        ascent: font_size * FALLBACK_ASCENT,
        descent: font_size * FALLBACK_DESCENT,
    }
}

/// Measures with a real font when one resolves, falling back to the table.
pub fn measure_extent(text: &str, font_size: f64, font_family: &str) -> TextExtent {
    if text.is_empty() || font_size <= 0.0 {
        return TextExtent {
            width: 0.0,
            ascent: font_size.max(0.0) * FALLBACK_ASCENT,
            descent: font_size.max(0.0) * FALLBACK_DESCENT,
        };
    }
    let measured = TEXT_MEASURER
        .lock()
        .ok()
        .and_then(|mut guard| guard.measure(text, font_size, font_family));
    measured.unwrap_or_else(|| fast_extent(text, font_size))
}

fn fallback_text_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(char_width_factor)
        .sum::<f64>()
        * font_size
}

fn char_width_factor(ch: char) -> f64 {
    // Advance widths of a typical sans-serif face at 1px.
    match ch {
        ' ' => 0.306,
        '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '\'' => 0.321,
        'I' | 'i' | 'j' | 'l' => 0.25,
        'f' | 't' | 'r' => 0.34,
        'M' | 'W' | 'm' | 'w' => 0.87,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '1' => 0.396,
        '0'..='9' => 0.6,
        'α'..='ω' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        _ => 0.568,
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f64, font_family: &str) -> Option<TextExtent> {
        let family_key = normalize_family_key(font_family);
        if !self.cache.contains_key(&family_key) {
            let face = self.load_face(font_family, &family_key);
            if face.is_none() {
                log::warn!("no font matched {font_family:?}; using estimated text widths");
            }
            self.cache.insert(family_key.clone(), face);
        }
        let face = self.cache.get_mut(&family_key)?.as_mut()?;
        let single_line = text.replace('\t', "    ").replace('\n', " ");
        face.extent(&single_line, font_size)
    }

    fn load_face(&mut self, font_family: &str, family_key: &str) -> Option<FontFace> {
        if let Some(face) = load_cached_face(family_key) {
            return Some(face);
        }

        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|raw| !raw.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "monospace" | "ui-monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    Family::SansSerif
                }
                _ => Family::Name(*raw),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if Face::parse(&bytes, index).is_err() {
                return;
            }
            if let Some((font_path, meta_path)) = cache_paths(family_key)
                && !font_path.exists()
            {
                if let Some(parent) = font_path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(&font_path, &bytes);
                let _ = fs::write(&meta_path, index.to_string());
            }
            loaded = FontFace::new(bytes, index);
        });
        loaded
    }
}

/// Metrics of one face. ASCII advances are read up front; other characters
/// are looked up from the kept font bytes on first use.
struct FontFace {
    units_per_em: f64,
    ascender: f64,
    descender: f64,
    ascii_advances: [u16; 128],
    advances: HashMap<char, Option<u16>>,
    data: Vec<u8>,
    index: u32,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        let units_per_em = face.units_per_em().max(1) as f64;
        let ascender = face.ascender() as f64;
        let descender = face.descender() as f64;
        Some(Self {
            units_per_em,
            ascender,
            descender,
            ascii_advances,
            advances: HashMap::new(),
            data,
            index,
        })
    }

    fn advance(&mut self, ch: char) -> Option<u16> {
        if ch.is_ascii() {
            let advance = self.ascii_advances[ch as usize];
            return (advance > 0).then_some(advance);
        }
        if let Some(cached) = self.advances.get(&ch) {
            return *cached;
        }
        let advance = Face::parse(&self.data, self.index).ok().and_then(|face| {
            let glyph: GlyphId = face.glyph_index(ch)?;
            face.glyph_hor_advance(glyph)
        });
        self.advances.insert(ch, advance);
        advance
    }

    fn extent(&mut self, text: &str, font_size: f64) -> Option<TextExtent> {
        let scale = font_size / self.units_per_em;
        let mut width = 0.0f64;
        for ch in text.chars() {
            width += match self.advance(ch) {
                Some(advance) => advance as f64 * scale,
                None => char_width_factor(ch) * font_size,
            };
        }
        Some(TextExtent {
            width: width.max(0.0),
            ascent: (self.ascender * scale).max(0.0),
            descent: (-self.descender * scale).max(0.0),
        })
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("skylabel").join("font-cache");
    Some((dir.join(format!("{hash:x}.font")), dir.join(format!("{hash:x}.meta"))))
}

fn load_cached_face(family_key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontFace::new(bytes, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_extent_scales_with_font_size() {
        let small = fast_extent("Betelgeuse", 10.0);
        let large = fast_extent("Betelgeuse", 20.0);
        assert!((large.width - small.width * 2.0).abs() < 1e-9);
        assert!((large.height() - small.height() * 2.0).abs() < 1e-9);
    }

    #[test]
    fn fast_extent_height_matches_font_size() {
        let extent = fast_extent("Vega", 12.0);
        assert!((extent.height() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn char_widths_are_positive() {
        for ch in ['a', 'Z', ' ', '0', '@', 'β', '\u{4e2d}'] {
            assert!(char_width_factor(ch) > 0.0, "char {ch:?} has zero width");
        }
    }

    #[test]
    fn wide_glyphs_measure_wider() {
        assert!(fast_extent("MMMM", 10.0).width > fast_extent("iiii", 10.0).width);
    }

    #[test]
    fn empty_text_has_zero_width() {
        let extent = measure_extent("", 14.0, "sans-serif");
        assert_eq!(extent.width, 0.0);
        assert!(extent.height() > 0.0);
    }
}
