//! Text rasterization for the status bar.
//!
//! Glyphs are rendered with FreeType and composited over the bar background
//! into a BGRX buffer that can be handed to the server as a ZPixmap image.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use freetype::face::LoadFlag;
use freetype::Library as FtLibrary;

/// A block of BGRX pixels, row-major, 4 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextBitmap {
    /// A bitmap filled with a solid 0xRRGGBB color
    pub fn filled(width: u32, height: u32, color: u32) -> Self {
        let [b, g, r] = bgr(color);
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[b, g, r, 0xFF]);
        }
        Self { width, height, pixels }
    }

    /// Composite a coverage value (0..=255) at (x, y) in `color`, scaled by
    /// `opacity`. Out-of-bounds coordinates are ignored.
    pub fn blend(&mut self, x: i32, y: i32, color: u32, coverage: u8, opacity: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let alpha = (coverage as f32 * opacity.clamp(0.0, 1.0)).round() as u32;
        if alpha == 0 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        let fg = bgr(color);
        let inv = 255 - alpha;
        for (channel, fg) in fg.iter().enumerate() {
            let dst = &mut self.pixels[idx + channel];
            *dst = ((*fg as u32 * alpha + *dst as u32 * inv) / 255) as u8;
        }
    }
}

fn bgr(color: u32) -> [u8; 3] {
    [
        (color & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        ((color >> 16) & 0xFF) as u8,
    ]
}

/// Turns a string into pixels ready to blit onto the bar
pub trait TextRenderer {
    /// Rasterize `text` in `color` over a `background`-filled box. Returns
    /// `None` when there is nothing to draw.
    fn rasterize(&self, text: &str, color: u32, opacity: f32, background: u32) -> Option<TextBitmap>;
}

/// Font renderer using FreeType for anti-aliased text
pub struct FontRenderer {
    _library: FtLibrary,
    face: freetype::Face,
    line_height: u32,
    ascender: i32,
}

impl FontRenderer {
    pub fn new(font_name: &str, font_size: u32) -> Result<Self> {
        let library = FtLibrary::init().context("Failed to initialize FreeType")?;

        let font_path = find_font(font_name)?;
        log::info!("Loading font: {:?}", font_path);

        let face = library
            .new_face(&font_path, 0)
            .context("Failed to load font face")?;

        // 1/64th points at 96 DPI
        face.set_char_size(0, (font_size as isize) * 64, 96, 96)
            .context("Failed to set font size")?;

        let metrics = face.size_metrics().context("Failed to get font metrics")?;
        let line_height = (metrics.height >> 6) as u32;
        let ascender = (metrics.ascender >> 6) as i32;
        log::debug!("Font metrics: line_height={}, ascender={}", line_height, ascender);

        Ok(Self {
            _library: library,
            face,
            line_height,
            ascender,
        })
    }

    /// Advance width of `text` in pixels
    pub fn measure_text(&self, text: &str) -> u32 {
        let width: i64 = text
            .chars()
            .filter(|ch| self.face.load_char(*ch as usize, LoadFlag::DEFAULT).is_ok())
            .map(|_| (self.face.glyph().advance().x >> 6) as i64)
            .sum();
        width.max(0) as u32
    }
}

impl TextRenderer for FontRenderer {
    fn rasterize(&self, text: &str, color: u32, opacity: f32, background: u32) -> Option<TextBitmap> {
        let width = self.measure_text(text);
        if width == 0 || self.line_height == 0 {
            return None;
        }
        let mut bitmap = TextBitmap::filled(width, self.line_height, background);

        let mut pen_x: i32 = 0;
        for ch in text.chars() {
            if self.face.load_char(ch as usize, LoadFlag::RENDER).is_err() {
                continue;
            }
            let glyph = self.face.glyph();
            let glyph_bitmap = glyph.bitmap();
            let origin_x = pen_x + glyph.bitmap_left();
            let origin_y = self.ascender - glyph.bitmap_top();
            let buffer = glyph_bitmap.buffer();

            for row in 0..glyph_bitmap.rows() {
                for col in 0..glyph_bitmap.width() {
                    let coverage = buffer[(row * glyph_bitmap.pitch() + col) as usize];
                    bitmap.blend(origin_x + col, origin_y + row, color, coverage, opacity);
                }
            }
            pen_x += (glyph.advance().x >> 6) as i32;
        }

        Some(bitmap)
    }
}

/// Locate a font file for `font_name` in the usual font directories
fn find_font(font_name: &str) -> Result<PathBuf> {
    let mut search_dirs: Vec<PathBuf> = ["/usr/share/fonts", "/usr/local/share/fonts"]
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .collect();
    if let Some(user_fonts) = dirs::home_dir()
        .map(|h| h.join(".local/share/fonts"))
        .filter(|p| p.exists())
    {
        search_dirs.insert(0, user_fonts);
    }

    for pattern in font_patterns(font_name) {
        for dir in &search_dirs {
            if let Some(path) = search_font_in_dir(dir, &pattern) {
                return Ok(path);
            }
        }
    }

    for dir in &search_dirs {
        if let Some(path) = search_font_in_dir(dir, "") {
            log::warn!("Font '{}' not found, using fallback: {:?}", font_name, path);
            return Ok(path);
        }
    }

    anyhow::bail!("No suitable font found for '{}'", font_name)
}

/// File name fragments to look for, in order of preference
fn font_patterns(font_name: &str) -> Vec<String> {
    if font_name.eq_ignore_ascii_case("monospace") {
        ["DejaVuSansMono", "LiberationMono", "UbuntuMono", "NotoSansMono", "FreeMono"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        vec![font_name.replace(' ', ""), font_name.replace(' ', "-")]
    }
}

/// Regular-weight TTF/OTF file whose name contains `pattern`, searched recursively
fn search_font_in_dir(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let pattern = pattern.to_lowercase();
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = search_font_in_dir(&path, &pattern) {
                return Some(found);
            }
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| is_regular_font_file(name, &pattern))
        {
            return Some(path);
        }
    }
    None
}

fn is_regular_font_file(name: &str, pattern: &str) -> bool {
    let name = name.to_lowercase();
    (name.ends_with(".ttf") || name.ends_with(".otf"))
        && name.contains(pattern)
        && !["bold", "italic", "oblique"].iter().any(|style| name.contains(style))
}
