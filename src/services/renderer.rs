//! Ticket compositing - background, QR symbol, identifier caption
//!
//! Layout follows the printed event ticket: the QR code sits near the
//! bottom edge, horizontally centered with a small leftward offset, with
//! the visitor identifier captioned directly beneath it. Everything is
//! rendered at a scale multiple of the logical size (default 2x) so the
//! exported PNG stays legible at print and full-screen resolution.

use crate::domain::Ticket;
use crate::infra::Config;
use crate::services::font;
use image::{imageops, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;
use tracing::{debug, warn};

/// QR symbol side as a fraction of canvas width. Fixed, not proportional to
/// payload length - identifiers fit a small QR version either way.
const QR_WIDTH_FRACTION: f32 = 0.15;
/// Horizontal anchor of the QR symbol's center (slightly left of center)
const QR_CENTER_X_FRACTION: f32 = 0.47;
/// Gap between canvas bottom edge and the caption baseline
const BOTTOM_MARGIN_FRACTION: f32 = 0.005;
/// Caption height as a fraction of canvas height
const CAPTION_HEIGHT_FRACTION: f32 = 0.04;
/// Quiet-zone modules around the QR symbol
const QUIET_ZONE_MODULES: u32 = 2;

const FILL_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const QR_DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Caption over the printed ticket artwork (dark background)
const CAPTION_ON_ART: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Caption over the flat fallback fill, which is white
const CAPTION_ON_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("qr encode failed: {0}")]
    QrEncode(String),
}

/// Composites tickets at a fixed canvas size. The background asset is
/// loaded once at construction; a missing or unreadable asset degrades to
/// a flat fill rather than failing issuance.
pub struct TicketRenderer {
    background: Option<RgbaImage>,
    logical_width: u32,
    logical_height: u32,
    scale: u32,
}

impl TicketRenderer {
    pub fn new(logical_width: u32, logical_height: u32, scale: u32) -> Self {
        Self {
            background: None,
            logical_width: logical_width.max(1),
            logical_height: logical_height.max(1),
            scale: scale.max(1),
        }
    }

    pub fn with_background(mut self, background: RgbaImage) -> Self {
        self.background = Some(background);
        self
    }

    /// Build from config, loading the background asset if one is set
    pub fn from_config(config: &Config) -> Self {
        let mut renderer = Self::new(
            config.ticket_width(),
            config.ticket_height(),
            config.ticket_scale(),
        );

        if let Some(path) = config.ticket_background() {
            match image::open(path) {
                Ok(img) => {
                    debug!(path = %path, "ticket_background_loaded");
                    renderer.background = Some(img.to_rgba8());
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "ticket_background_unreadable");
                }
            }
        }

        renderer
    }

    /// Exported canvas size in pixels (logical size x scale)
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.logical_width * self.scale, self.logical_height * self.scale)
    }

    /// QR symbol side in pixels; depends only on canvas width
    fn qr_side_px(canvas_width: u32) -> u32 {
        ((canvas_width as f32 * QR_WIDTH_FRACTION) as u32).max(1)
    }

    /// Render the ticket. An empty `qr_payload` yields the background alone
    /// (identifier not yet available) - that is a valid state, not an error.
    pub fn render(&self, ticket: &Ticket) -> Result<RgbaImage, RenderError> {
        let (width, height) = self.canvas_size();

        let mut canvas = match &self.background {
            Some(bg) if bg.dimensions() == (width, height) => bg.clone(),
            Some(bg) => imageops::resize(bg, width, height, imageops::FilterType::Triangle),
            None => RgbaImage::from_pixel(width, height, FILL_WHITE),
        };

        if ticket.qr_payload.is_empty() {
            debug!("ticket_rendered_without_qr");
            return Ok(canvas);
        }

        let code = QrCode::with_error_correction_level(ticket.qr_payload.as_bytes(), EcLevel::M)
            .map_err(|e| RenderError::QrEncode(e.to_string()))?;

        let modules = code.width() as u32;
        let side_px = Self::qr_side_px(width);
        let module_px = (side_px / (modules + 2 * QUIET_ZONE_MODULES)).max(1);
        let symbol_px = module_px * (modules + 2 * QUIET_ZONE_MODULES);

        let caption_px =
            ((height as f32 * CAPTION_HEIGHT_FRACTION) as u32 / font::GLYPH_HEIGHT).max(1);
        let caption_height = font::text_height(caption_px);
        let bottom_margin = (height as f32 * BOTTOM_MARGIN_FRACTION) as u32;
        let caption_gap = caption_px;

        let center_x = (width as f32 * QR_CENTER_X_FRACTION) as i64;
        let symbol_left = center_x - symbol_px as i64 / 2;
        let symbol_top =
            height as i64 - (bottom_margin + caption_height + caption_gap + symbol_px) as i64;

        // Quiet zone backing
        fill_rect(&mut canvas, symbol_left, symbol_top, symbol_px, symbol_px, FILL_WHITE);

        for y in 0..modules {
            for x in 0..modules {
                if code[(x as usize, y as usize)] == qrcode::Color::Dark {
                    fill_rect(
                        &mut canvas,
                        symbol_left + ((QUIET_ZONE_MODULES + x) * module_px) as i64,
                        symbol_top + ((QUIET_ZONE_MODULES + y) * module_px) as i64,
                        module_px,
                        module_px,
                        QR_DARK,
                    );
                }
            }
        }

        let caption_color =
            if self.background.is_some() { CAPTION_ON_ART } else { CAPTION_ON_FILL };
        let caption_width = font::text_width(&ticket.qr_payload, caption_px);
        font::draw_text(
            &mut canvas,
            &ticket.qr_payload,
            center_x - caption_width as i64 / 2,
            symbol_top + symbol_px as i64 + caption_gap as i64,
            caption_px,
            caption_color,
        );

        debug!(
            visitor_id = %ticket.visitor_id,
            modules = %modules,
            symbol_px = %symbol_px,
            "ticket_rendered"
        );

        Ok(canvas)
    }
}

fn fill_rect(image: &mut RgbaImage, left: i64, top: i64, w: u32, h: u32, color: Rgba<u8>) {
    for dy in 0..h as i64 {
        for dx in 0..w as i64 {
            let (x, y) = (left + dx, top + dy);
            if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
