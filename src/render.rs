use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use chrono::{DateTime, TimeDelta, Utc};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{BannerError, Result};
use crate::models::RepoCommitMatch;

pub const TEMPLATE_FILE: &str = "commit-aware.png";
pub const DEFAULT_BANNER_FILE: &str = "default-banner.png";
pub const FONT_FILE: &str = "ARLRDBD.TTF";

const BASE_FONT_SIZE: f32 = 13.0;
const PADDING: u32 = 5;
const WRAP_COLUMNS: usize = 15;
const MESSAGE_LINES: usize = 2;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pixel region on the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub const MESSAGE_BOX: TextBox = TextBox { x: 462, y: 53, width: 132, height: 35 };
pub const TIME_BOX: TextBox = TextBox { x: 527, y: 96, width: 66, height: 21 };
pub const REPO_BOX: TextBox = TextBox { x: 527, y: 124, width: 66, height: 21 };

/// Turns a commit match into PNG bytes. Called off the async runtime.
pub trait Renderer: Send + Sync {
    fn render(&self, found: &RepoCommitMatch) -> Result<Vec<u8>>;
}

pub struct BannerRenderer {
    assets_dir: PathBuf,
}

impl BannerRenderer {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    pub fn default_banner_path(&self) -> PathBuf {
        self.assets_dir.join(DEFAULT_BANNER_FILE)
    }

    fn load_font(&self) -> Result<FontVec> {
        let path = self.assets_dir.join(FONT_FILE);
        let bytes = std::fs::read(&path).map_err(|e| asset_error(&path, e))?;
        FontVec::try_from_vec(bytes).map_err(|e| asset_error(&path, e))
    }

    fn load_template(&self) -> Result<RgbaImage> {
        let path = self.assets_dir.join(TEMPLATE_FILE);
        let template = image::open(&path).map_err(|e| asset_error(&path, e))?;
        Ok(template.to_rgba8())
    }

    pub fn render_at(&self, found: &RepoCommitMatch, now: DateTime<Utc>) -> Result<Vec<u8>> {
        let font = self.load_font()?;
        let mut canvas = self.load_template()?;

        draw_message(&mut canvas, &font, found.extra.message());
        draw_fitted(&mut canvas, &font, TIME_BOX, &relative_time(now - found.extra.date()));
        draw_fitted(&mut canvas, &font, REPO_BOX, &found.repo.name);

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| BannerError::Render(format!("PNG encoding failed: {}", e)))?;

        Ok(out.into_inner())
    }
}

impl Renderer for BannerRenderer {
    fn render(&self, found: &RepoCommitMatch) -> Result<Vec<u8>> {
        self.render_at(found, Utc::now())
    }
}

fn asset_error(path: &Path, e: impl std::fmt::Display) -> BannerError {
    BannerError::Render(format!("failed to load {}: {}", path.display(), e))
}

fn line_height(font: &FontVec, scale: PxScale) -> f32 {
    font.as_scaled(scale).height().ceil()
}

fn draw_message(canvas: &mut RgbaImage, font: &FontVec, message: &str) {
    let scale = PxScale::from(BASE_FONT_SIZE);
    let height = line_height(font, scale);
    let mut y = MESSAGE_BOX.y as f32;

    for line in message_lines(message) {
        let (width, _) = text_size(scale, font, &line);
        let x = (MESSAGE_BOX.width as f32 - width as f32) / 2.0 + MESSAGE_BOX.x as f32;
        draw_text_mut(canvas, TEXT_COLOR, x.round() as i32, y.round() as i32, scale, font, &line);
        y += height;
    }
}

/// Draws `text` at the largest size that fits the box, centred in it.
fn draw_fitted(canvas: &mut RgbaImage, font: &FontVec, area: TextBox, text: &str) {
    let max_width = area.width.saturating_sub(PADDING);
    let size = fit_font_size(BASE_FONT_SIZE, max_width, |size| text_size(PxScale::from(size), font, text).0);

    let scale = PxScale::from(size);
    let (width, _) = text_size(scale, font, text);
    let height = line_height(font, scale);
    let offset = (PADDING - 3) as f32;

    let x = (area.width as f32 - width as f32) / 2.0 + area.x as f32 - offset;
    let y = (area.height as f32 - height) / 2.0 + area.y as f32 - offset;
    draw_text_mut(canvas, TEXT_COLOR, x.round() as i32, y.round() as i32, scale, font, text);
}

/// Shrinks from `base` one pixel at a time until `measure` fits `max_width`.
pub fn fit_font_size(base: f32, max_width: u32, measure: impl Fn(f32) -> u32) -> f32 {
    let mut size = base;
    while size > 1.0 && measure(size) > max_width {
        size -= 1.0;
    }
    size.max(1.0)
}

/// Greedy word wrap. Whitespace runs collapse; words longer than a line are split.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        loop {
            let used = current.chars().count();
            let needed = if used == 0 { word.len() } else { used + 1 + word.len() };
            if needed <= columns {
                if used > 0 {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }

            if used > 0 {
                lines.push(std::mem::take(&mut current));
                continue;
            }

            // word alone overflows a line
            let rest = word.split_off(columns);
            lines.push(word.into_iter().collect());
            word = rest;
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// The commit message as drawn: two wrapped lines, the second ellipsized when
/// more text follows.
pub fn message_lines(message: &str) -> Vec<String> {
    let mut lines = wrap_text(message, WRAP_COLUMNS);
    let overflow = lines.len() > MESSAGE_LINES;
    lines.truncate(MESSAGE_LINES);
    if overflow {
        if let Some(last) = lines.last_mut() {
            last.push_str("...");
        }
    }
    lines
}

/// "3 days ago" style description of an elapsed time
pub fn relative_time(elapsed: TimeDelta) -> String {
    format!("{} ago", natural_delta(elapsed))
}

fn natural_delta(elapsed: TimeDelta) -> String {
    let seconds = elapsed.num_seconds().unsigned_abs();
    let total_days = seconds / 86_400;
    let years = total_days / 365;
    let days = total_days % 365;
    let months = (days as f64 / 30.5) as u64;

    if years == 0 && days < 1 {
        return match seconds {
            0 => "a moment".to_string(),
            1 => "a second".to_string(),
            2..=59 => format!("{} seconds", seconds),
            60..=119 => "a minute".to_string(),
            120..=3599 => format!("{} minutes", seconds / 60),
            3600..=7199 => "an hour".to_string(),
            _ => format!("{} hours", seconds / 3600),
        };
    }

    match years {
        0 if days == 1 => "a day".to_string(),
        0 if months == 0 => format!("{} days", days),
        0 if months == 1 => "a month".to_string(),
        0 => format!("{} months", months),
        1 if months == 0 && days == 0 => "a year".to_string(),
        1 if months == 0 && days == 1 => "1 year, 1 day".to_string(),
        1 if months == 0 => format!("1 year, {} days", days),
        1 if months == 1 => "1 year, 1 month".to_string(),
        1 => format!("1 year, {} months", months),
        _ => format!("{} years", years),
    }
}
