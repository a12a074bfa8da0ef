//! Pixel output: the logical window transform, points, lines and bitmap text.

use crate::font::{glyph, GLYPH_SIZE};
use crate::platform::HostPlatform;
use crate::probe::{Configuration, TEXT_HEIGHT};

/// Logical coordinate window mapped onto the full device extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Window {
    /// Normal mapping: 0..1 on both axes covers the whole screen.
    pub const NORMAL: Window = Window {
        x0: 0.0,
        y0: 0.0,
        x1: 1.0,
        y1: 1.0,
    };

    /// Returns None for a window with zero extent on either axis.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        let valid = [x0, y0, x1, y1].iter().all(|v| v.is_finite()) && x0 != x1 && y0 != y1;
        valid.then_some(Self { x0, y0, x1, y1 })
    }

    /// One logical unit per device pixel.
    fn pixels(width: u32, height: u32) -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: width as f64,
            y1: height as f64,
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Drawing state for a negotiated display: device size plus the active window.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    text_width: u8,
    window: Window,
}

impl Canvas {
    pub fn new(config: &Configuration) -> Self {
        Self {
            width: config.pixel_width,
            height: config.pixel_height,
            text_width: config.text_width,
            window: Window::NORMAL,
        }
    }

    pub fn has_graphics(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn set_window(&mut self, window: Window) {
        self.window = window;
    }

    pub fn reset_window(&mut self) {
        self.window = Window::NORMAL;
    }

    /// Pixel size of one text cell.
    pub fn cell_size(&self) -> (u32, u32) {
        if self.text_width == 0 {
            return (GLYPH_SIZE as u32, GLYPH_SIZE as u32);
        }
        (
            self.width / self.text_width as u32,
            self.height / TEXT_HEIGHT as u32,
        )
    }

    /// Map logical (x, y) through the active window to a device pixel.
    pub fn to_device(&self, x: f64, y: f64) -> (i32, i32) {
        let (dx, dy) = self.to_device_exact(x, y);
        (dx.floor() as i32, dy.floor() as i32)
    }

    /// Unrounded device position of a logical point.
    fn to_device_exact(&self, x: f64, y: f64) -> (f64, f64) {
        let w = &self.window;
        let dx = (x - w.x0) / (w.x1 - w.x0) * self.width as f64;
        let dy = (y - w.y0) / (w.y1 - w.y0) * self.height as f64;
        (dx, dy)
    }

    /// Liang-Barsky clip of a device-space segment to `[0, width] x [0, height]`.
    ///
    /// Returns None when no part of the segment touches the screen.
    fn clip_segment(&self, a: (f64, f64), b: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let limit = 4.0 * (self.width as f64 + self.height as f64);
        let bound = |v: f64| v.clamp(-limit, limit);
        let a = (bound(a.0), bound(a.1));
        let b = (bound(b.0), bound(b.1));
        if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
            return None;
        }

        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let edges = [
            (-dx, a.0),
            (dx, self.width as f64 - a.0),
            (-dy, a.1),
            (dy, self.height as f64 - a.1),
        ];
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        // Untouched endpoints stay exact
        let start = if t0 > 0.0 { (a.0 + t0 * dx, a.1 + t0 * dy) } else { a };
        let end = if t1 < 1.0 { (a.0 + t1 * dx, a.1 + t1 * dy) } else { b };
        Some((start, end))
    }

    fn on_screen(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn plot<P: HostPlatform>(&self, host: &mut P, x: i32, y: i32, color: u8) {
        if self.on_screen(x, y) {
            host.draw_run(x, y, 1, color);
        }
    }

    /// Set one pixel at logical coordinates. Off-screen points are dropped.
    pub fn pixel_set<P: HostPlatform>(&self, host: &mut P, x: f64, y: f64, color: u8) {
        if !self.has_graphics() {
            return;
        }
        let (dx, dy) = self.to_device(x, y);
        self.plot(host, dx, dy, color);
    }

    /// Bresenham line between two logical points, both ends inclusive.
    ///
    /// The segment is clipped to the device rectangle first, so the walk
    /// never leaves the screen by more than one pixel whatever the endpoints.
    pub fn line_draw<P: HostPlatform>(
        &self,
        host: &mut P,
        from: (f64, f64),
        to: (f64, f64),
        color: u8,
    ) {
        if !self.has_graphics() {
            return;
        }
        let Some((start, end)) = self.clip_segment(
            self.to_device_exact(from.0, from.1),
            self.to_device_exact(to.0, to.1),
        ) else {
            return;
        };
        let (mut x, mut y) = (start.0.floor() as i32, start.1.floor() as i32);
        let (x1, y1) = (end.0.floor() as i32, end.1.floor() as i32);

        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.plot(host, x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Rasterize `text` starting at text cell (col, row).
    ///
    /// Rows past the last text row draw nothing. Glyph rows are emitted as
    /// runs of equal color, clipped to the device. The cell origin is
    /// computed under a pixel-identity window; afterwards the window is back
    /// to `Window::NORMAL`, whatever it was before.
    pub fn draw_text<P: HostPlatform>(
        &mut self,
        host: &mut P,
        col: u8,
        row: u8,
        text: &[u8],
        fg: u8,
        bg: u8,
    ) {
        if !self.has_graphics() {
            return;
        }
        if row >= TEXT_HEIGHT {
            self.reset_window();
            return;
        }
        let (cell_w, cell_h) = self.cell_size();
        self.window = Window::pixels(self.width, self.height);

        for (i, &ch) in text.iter().enumerate() {
            let cell_col = col as u32 + i as u32;
            if cell_col >= self.text_width as u32 {
                break;
            }
            let (x, y) = self.to_device(
                (cell_col * cell_w) as f64,
                (row as u32 * cell_h) as f64,
            );
            for (dy, &bits) in glyph(ch).iter().enumerate() {
                self.draw_glyph_row(host, x, y + dy as i32, bits, fg, bg);
            }
        }

        self.reset_window();
    }

    fn draw_glyph_row<P: HostPlatform>(
        &self,
        host: &mut P,
        x: i32,
        y: i32,
        bits: u8,
        fg: u8,
        bg: u8,
    ) {
        if y < 0 || y as u32 >= self.height {
            return;
        }
        let color_at = |col: usize| if bits & (0x80 >> col) != 0 { fg } else { bg };
        let mut start = 0;
        while start < GLYPH_SIZE {
            let color = color_at(start);
            let mut end = start + 1;
            while end < GLYPH_SIZE && color_at(end) == color {
                end += 1;
            }
            let left = (x + start as i32).max(0);
            let right = (x + end as i32).min(self.width as i32);
            if left < right {
                host.draw_run(left, y, (right - left) as u32, color);
            }
            start = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;
    use crate::probe::SoundLevel;
    use crate::profile::DisplayCandidate;

    fn canvas_320() -> Canvas {
        let config =
            Configuration::from_candidate(&DisplayCandidate::new(1, 320, 200, 40), SoundLevel::Basic);
        Canvas::new(&config)
    }

    #[test]
    fn test_normal_window_maps_to_extents() {
        let canvas = canvas_320();
        assert_eq!(canvas.to_device(0.0, 0.0), (0, 0));
        assert_eq!(canvas.to_device(0.5, 0.5), (160, 100));
        assert_eq!(canvas.to_device(1.0, 1.0), (320, 200));
    }

    #[test]
    fn test_custom_window() {
        let mut canvas = canvas_320();
        canvas.set_window(Window::new(-1.0, -1.0, 1.0, 1.0).unwrap());
        assert_eq!(canvas.to_device(0.0, 0.0), (160, 100));
        assert!(Window::new(0.0, 0.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_draw_text_pixels() {
        let mut canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 1, 2, b"H", 15, 0);

        // Cell (1, 2) is at (8, 16) in an 8x8 grid
        let row0 = glyph(b'H')[0];
        for dx in 0..8 {
            let expected = if row0 & (0x80 >> dx) != 0 { 15 } else { 0 };
            assert_eq!(host.pixel(8 + dx, 16), Some(expected));
        }
        assert_eq!(host.pixel_count(), 64);
        assert_eq!(host.pixel(7, 16), None);
    }

    #[test]
    fn test_draw_text_restores_normal_window() {
        let mut canvas = canvas_320();
        let custom = Window::new(0.0, 0.0, 10.0, 10.0).unwrap();
        canvas.set_window(custom);
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 0, 0, b"A", 1, 0);
        assert_eq!(canvas.window(), Window::NORMAL);
    }

    #[test]
    fn test_draw_text_high_codes_are_blank() {
        let mut canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 0, 0, &[200], 15, 3);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(host.pixel(x, y), Some(3));
            }
        }
    }

    #[test]
    fn test_draw_text_stops_at_right_edge() {
        let mut canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 39, 0, b"AB", 1, 0);
        assert_eq!(host.pixel_count(), 64);
    }

    #[test]
    fn test_line_draw() {
        let mut canvas = canvas_320();
        canvas.set_window(Window::new(0.0, 0.0, 320.0, 200.0).unwrap());
        let mut host = HeadlessPlatform::new();
        canvas.line_draw(&mut host, (0.0, 0.0), (10.0, 10.0), 4);
        for i in 0..=10 {
            assert_eq!(host.pixel(i, i), Some(4));
        }
        assert_eq!(host.pixel_count(), 11);
    }

    #[test]
    fn test_line_with_far_endpoint_is_clipped() {
        let canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.line_draw(&mut host, (0.0, 0.0), (1e10, 0.0), 5);
        assert_eq!(host.pixel_count(), 320);
        assert_eq!(host.pixel(0, 0), Some(5));
        assert_eq!(host.pixel(319, 0), Some(5));

        let mut host = HeadlessPlatform::new();
        canvas.line_draw(&mut host, (-1e10, 0.5), (1e10, 0.5), 6);
        assert_eq!(host.pixel_count(), 320);
        assert_eq!(host.pixel(160, 100), Some(6));
    }

    #[test]
    fn test_line_entirely_off_screen() {
        let canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.line_draw(&mut host, (2.0, 2.0), (1e12, 3.0), 1);
        canvas.line_draw(&mut host, (-5.0, 0.5), (-1.0, 0.5), 1);
        canvas.line_draw(&mut host, (f64::NAN, 0.0), (0.5, 0.5), 1);
        assert_eq!(host.pixel_count(), 0);
    }

    #[test]
    fn test_draw_text_below_last_row() {
        let mut canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 0, TEXT_HEIGHT, b"A", 1, 0);
        canvas.draw_text(&mut host, 0, 200, b"A", 1, 0);
        assert_eq!(host.pixel_count(), 0);
        assert_eq!(canvas.window(), Window::NORMAL);

        canvas.draw_text(&mut host, 0, TEXT_HEIGHT - 1, b"A", 1, 0);
        assert_eq!(host.pixel_count(), 64);
        assert!(host.pixel(0, 191).is_some());
        assert_eq!(host.pixel(0, 192), None);
    }

    #[test]
    fn test_glyph_runs_clipped_to_device() {
        // 30 pixels high: one-pixel cells, so the last row's glyph overhangs
        let config =
            Configuration::from_candidate(&DisplayCandidate::new(1, 320, 30, 40), SoundLevel::Basic);
        let mut canvas = Canvas::new(&config);
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 0, TEXT_HEIGHT - 1, b"A", 1, 0);
        assert_eq!(host.pixel_count(), 7 * 8);
        assert_eq!(host.pixel(0, 30), None);
    }

    #[test]
    fn test_offscreen_pixel_dropped() {
        let canvas = canvas_320();
        let mut host = HeadlessPlatform::new();
        canvas.pixel_set(&mut host, 1.0, 1.0, 2);
        canvas.pixel_set(&mut host, -0.1, 0.5, 2);
        assert_eq!(host.pixel_count(), 0);
        canvas.pixel_set(&mut host, 0.5, 0.5, 2);
        assert_eq!(host.pixel(160, 100), Some(2));
    }

    #[test]
    fn test_text_only_draws_nothing() {
        let mut canvas = Canvas::new(&Configuration::minimal(SoundLevel::Basic));
        let mut host = HeadlessPlatform::new();
        canvas.draw_text(&mut host, 0, 0, b"X", 1, 0);
        canvas.line_draw(&mut host, (0.0, 0.0), (1.0, 1.0), 1);
        assert_eq!(host.pixel_count(), 0);
    }
}
