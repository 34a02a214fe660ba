use anyhow::{Context, Result};
use kiln_engine::batch::{SpriteDraw, SpriteFlags};
use kiln_engine::compositor::TextStyle;
use kiln_engine::coords::{Rect, Vec2};
use kiln_engine::device::{ImageDesc, ImageId, PixelFormat, RenderBackend};
use kiln_engine::paint::Tint;
use kiln_engine::text::{Alignment, FontId, FontSystem, SizeMode};
use kiln_engine::{CompositorError, FrameCompositor};

const COLUMNS: u32 = 6;
const ROWS: u32 = 4;
const MARGIN: f32 = 24.0;
const HEADER: f32 = 44.0;
const GLYPH_BAKE_SIZE: f32 = 32.0;
const CHECKER: u32 = 8;

const FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
];

struct Font {
    system: FontSystem,
    id: FontId,
}

/// Demo content: a grid of pickable tiles under an unpickable header bar.
pub struct Scene {
    checker: ImageId,
    font: Option<Font>,
}

impl Scene {
    pub fn new<B: RenderBackend>(c: &mut FrameCompositor<B>) -> Result<Self> {
        let checker = upload_checker(c.backend_mut())?;

        let font = match FONT_PATHS.iter().find_map(|p| std::fs::read(p).ok()) {
            Some(bytes) => Some(load_font(c, &bytes)?),
            None => {
                log::warn!("no system font found; labels disabled");
                None
            }
        };

        Ok(Self { checker, font })
    }

    /// Records the whole scene. Must be called between `begin` and `end`.
    pub fn draw<B: RenderBackend>(
        &self,
        c: &mut FrameCompositor<B>,
        width: u32,
        height: u32,
    ) -> Result<(), CompositorError> {
        let hovered = c.current_pick_id();
        let tiles = tile_rects(width, height);

        for (id, rect) in &tiles {
            let hot = hovered == *id as u32;
            let mut draw = SpriteDraw::new(self.checker, *rect)
                .with_tint(tile_tint(*id, hot))
                .with_pick_id(*id);
            if id % 3 == 0 {
                draw = draw.with_flags(SpriteFlags::ELLIPSE);
            }
            if hot {
                draw = draw.with_glow(1.0);
            }
            c.draw_sprite_with(&draw)?;
        }

        let bar = Rect::from_xywh(0.0, 0.0, width as f32, HEADER);
        c.draw_sprite_unpickable(&SpriteDraw::solid(bar, Tint::from_rgba8(18, 20, 26, 235)))?;

        let Some(font) = &self.font else {
            return Ok(());
        };
        let metrics = match font.system.metrics(font.id, GLYPH_BAKE_SIZE) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("font metrics unavailable: {e}");
                return Ok(());
            }
        };

        let label = TextStyle {
            size: 18.0,
            tint: Tint::from_rgba8(240, 240, 240, 255),
            align: Alignment::Center,
            mode: SizeMode::Dynamic,
            ..Default::default()
        };
        for (id, rect) in &tiles {
            let origin = Vec2::new(rect.min.x, rect.center().y - label.size * 0.5);
            c.draw_string(&metrics, &format!("#{id}"), origin, Some(rect.width()), &label)?;
        }

        let status = format!(
            "hover {hovered}   draws {}   flushes {}   peak {}",
            c.draw_call_count(),
            c.flush_count(),
            c.peak_stats().draw_calls
        );
        let header = TextStyle {
            size: 20.0,
            tint: Tint::from_rgba8(150, 200, 255, 255),
            ..Default::default()
        };
        c.draw_string(&metrics, &status, Vec2::new(MARGIN, 10.0), None, &header)?;
        Ok(())
    }
}

fn tile_rects(width: u32, height: u32) -> Vec<(u16, Rect)> {
    let cell_w = ((width as f32 - MARGIN * 2.0) / COLUMNS as f32).max(1.0);
    let cell_h = ((height as f32 - HEADER - MARGIN * 2.0) / ROWS as f32).max(1.0);

    let mut tiles = Vec::with_capacity((COLUMNS * ROWS) as usize);
    for row in 0..ROWS {
        for col in 0..COLUMNS {
            let id = (row * COLUMNS + col + 1) as u16;
            let rect = Rect::from_xywh(
                MARGIN + col as f32 * cell_w + 4.0,
                HEADER + MARGIN + row as f32 * cell_h + 4.0,
                (cell_w - 8.0).max(1.0),
                (cell_h - 8.0).max(1.0),
            );
            tiles.push((id, rect));
        }
    }
    tiles
}

fn tile_tint(id: u16, hot: bool) -> Tint {
    let hue = id as f32 / (COLUMNS * ROWS) as f32;
    let base = Tint::from_rgba(
        0.35 + 0.5 * hue,
        0.45 + 0.3 * (1.0 - hue),
        0.85 - 0.4 * hue,
        1.0,
    );
    if hot {
        Tint::from_rgba(1.0, 0.85, 0.35, 1.0)
    } else {
        base
    }
}

fn upload_checker<B: RenderBackend>(backend: &mut B) -> Result<ImageId> {
    let image = backend
        .create_image(&ImageDesc::new(CHECKER, CHECKER, PixelFormat::Rgba8Unorm).with_label("checker"))
        .context("failed to create checker image")?;

    let mut pixels = Vec::with_capacity((CHECKER * CHECKER * 4) as usize);
    for y in 0..CHECKER {
        for x in 0..CHECKER {
            let v = if (x / 2 + y / 2) % 2 == 0 { 255 } else { 200 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    backend
        .upload_image(image, &pixels)
        .context("failed to upload checker image")?;
    Ok(image)
}

fn load_font<B: RenderBackend>(c: &mut FrameCompositor<B>, bytes: &[u8]) -> Result<Font> {
    let mut system = FontSystem::new();
    let id = system.load_font(bytes)?;
    let page = system.bake_page(id, GLYPH_BAKE_SIZE)?;

    let image = c
        .backend_mut()
        .create_image(&ImageDesc::new(page.width, page.height, PixelFormat::Rgba8Unorm).with_label("glyph page"))
        .context("failed to create glyph page")?;
    c.backend_mut()
        .upload_image(image, &page.pixels)
        .context("failed to upload glyph page")?;

    c.set_font_page(0, Some(image))?;
    c.upload_glyph_table(0, &page.table)?;
    log::info!("glyph page baked: {}x{}", page.width, page.height);

    Ok(Font { system, id })
}
