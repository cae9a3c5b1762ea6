// src/main.rs
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use rand::{rngs::StdRng, SeedableRng};

mod field;
mod sim;

use field::PointField;
use sim::{radius_profile, Ensemble};

const BLOBS: usize = 16;
const DT_CLAMP: f32 = 0.033;

// Viewport half-extents in field space. The vessel belly is 0.36 wide.
const X_SPAN: f32 = 0.45;
const Y_SPAN: f32 = 1.02;

// Volume samples per braille subpixel ray.
const DEPTH_SAMPLES: usize = 8;

#[derive(Clone, Copy)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}
impl Rgb {
    fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp1 = |x: u8, y: u8| -> u8 {
            (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgb {
            r: lerp1(a.r, b.r),
            g: lerp1(a.g, b.g),
            b: lerp1(a.b, b.b),
        }
    }
    fn from_unit(c: [f32; 3]) -> Rgb {
        let q = |v: f32| -> u8 { (v * 255.0).round().clamp(0.0, 255.0) as u8 };
        Rgb {
            r: q(c[0]),
            g: q(c[1]),
            b: q(c[2]),
        }
    }
    fn to_color(self) -> Color {
        Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

#[derive(Clone, Copy)]
struct Theme {
    bg_top: Rgb,
    bg_mid: Rgb,
    bg_bot: Rgb,
    glass_edge: Rgb,
    bg_global: Rgb,
    hud_fg: Rgb,
    hud_fg_dim: Rgb,
    hud_bg: Rgb,
}

const THEMES: [Theme; 3] = [
    // deep blue liquid, the classic look
    Theme {
        bg_top: Rgb { r: 10, g: 12, b: 18 },
        bg_mid: Rgb { r: 12, g: 18, b: 30 },
        bg_bot: Rgb { r: 22, g: 26, b: 40 },
        glass_edge: Rgb { r: 90, g: 100, b: 130 },
        bg_global: Rgb { r: 5, g: 6, b: 9 },
        hud_fg: Rgb { r: 210, g: 220, b: 245 },
        hud_fg_dim: Rgb { r: 170, g: 185, b: 210 },
        hud_bg: Rgb { r: 0, g: 0, b: 0 },
    },
    // amber liquid
    Theme {
        bg_top: Rgb { r: 16, g: 10, b: 6 },
        bg_mid: Rgb { r: 26, g: 16, b: 8 },
        bg_bot: Rgb { r: 38, g: 24, b: 12 },
        glass_edge: Rgb { r: 130, g: 105, b: 80 },
        bg_global: Rgb { r: 8, g: 6, b: 4 },
        hud_fg: Rgb { r: 240, g: 220, b: 195 },
        hud_fg_dim: Rgb { r: 195, g: 175, b: 150 },
        hud_bg: Rgb { r: 0, g: 0, b: 0 },
    },
    // near-black liquid, lets the wax glow carry the frame
    Theme {
        bg_top: Rgb { r: 6, g: 6, b: 8 },
        bg_mid: Rgb { r: 9, g: 8, b: 12 },
        bg_bot: Rgb { r: 14, g: 11, b: 16 },
        glass_edge: Rgb { r: 95, g: 85, b: 100 },
        bg_global: Rgb { r: 3, g: 3, b: 4 },
        hud_fg: Rgb { r: 225, g: 218, b: 230 },
        hud_fg_dim: Rgb { r: 175, g: 168, b: 182 },
        hud_bg: Rgb { r: 0, g: 0, b: 0 },
    },
];

fn theme_for(idx: usize) -> Theme {
    THEMES[idx % THEMES.len()]
}

#[derive(Clone)]
struct Cell {
    ch: char,
    fg: Rgb,
    bg: Rgb,
}

struct Diff {
    w: u16,
    h: u16,
    prev: Vec<Cell>,
    next: Vec<Cell>,
}
impl Diff {
    fn new(w: u16, h: u16) -> Self {
        let blank = Cell {
            ch: ' ',
            fg: Rgb { r: 255, g: 255, b: 255 },
            bg: Rgb { r: 0, g: 0, b: 0 },
        };
        let n = w as usize * h as usize;
        Self {
            w,
            h,
            prev: vec![blank.clone(); n],
            next: vec![blank; n],
        }
    }
    fn resize(&mut self, w: u16, h: u16) {
        if self.w == w && self.h == h {
            return;
        }
        *self = Self::new(w, h);
    }
    fn idx(&self, x: u16, y: u16) -> usize {
        y as usize * self.w as usize + x as usize
    }
    fn clear_next(&mut self, bg: Rgb) {
        for c in &mut self.next {
            c.ch = ' ';
            c.fg = Rgb { r: 255, g: 255, b: 255 };
            c.bg = bg;
        }
    }
    fn set_next(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        self.next[i] = cell;
    }
    fn char_at(&self, x: u16, y: u16) -> char {
        if x >= self.w || y >= self.h {
            return ' ';
        }
        self.next[self.idx(x, y)].ch
    }
    fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let mut last_fg: Option<Rgb> = None;
        let mut last_bg: Option<Rgb> = None;

        for y in 0..self.h {
            for x in 0..self.w {
                let i = self.idx(x, y);
                let a = &self.prev[i];
                let b = &self.next[i];
                if a.ch == b.ch
                    && a.fg.r == b.fg.r
                    && a.fg.g == b.fg.g
                    && a.fg.b == b.fg.b
                    && a.bg.r == b.bg.r
                    && a.bg.g == b.bg.g
                    && a.bg.b == b.bg.b
                {
                    continue;
                }

                queue!(out, cursor::MoveTo(x, y))?;

                if last_bg.map(|c| (c.r, c.g, c.b)) != Some((b.bg.r, b.bg.g, b.bg.b)) {
                    queue!(out, SetBackgroundColor(b.bg.to_color()))?;
                    last_bg = Some(b.bg);
                }
                if last_fg.map(|c| (c.r, c.g, c.b)) != Some((b.fg.r, b.fg.g, b.fg.b)) {
                    queue!(out, SetForegroundColor(b.fg.to_color()))?;
                    last_fg = Some(b.fg);
                }

                queue!(out, Print(b.ch))?;
            }
        }

        std::mem::swap(&mut self.prev, &mut self.next);
        Ok(())
    }
}

// Braille mapping: 2x4 subpixels per terminal cell.
// Dots are numbered:
// 1 4
// 2 5
// 3 6
// 7 8
fn braille_from_bits(bits: u8) -> char {
    let codepoint = 0x2800u32 + bits as u32;
    char::from_u32(codepoint).unwrap_or(' ')
}

fn dot_index(px: usize, py: usize) -> u8 {
    match (px, py) {
        (0, 0) => 0,
        (0, 1) => 1,
        (0, 2) => 2,
        (0, 3) => 6,
        (1, 0) => 3,
        (1, 1) => 4,
        (1, 2) => 5,
        (1, 3) => 7,
        _ => 0,
    }
}

fn quantize_bg(y01: f32, theme: Theme) -> Rgb {
    let t = y01.clamp(0.0, 1.0);
    if t < 0.6 {
        Rgb::lerp(theme.bg_top, theme.bg_mid, t / 0.6)
    } else {
        Rgb::lerp(theme.bg_mid, theme.bg_bot, (t - 0.6) / 0.4)
    }
}

struct App {
    rng: StdRng,
    ensemble: Ensemble,
    field: PointField,
    t: f32,
    yaw: f32,
    spin: bool,
    iso: f32,
    paused: bool,
    show_hud: bool,
    theme_idx: usize,
}

impl App {
    fn new() -> Self {
        let mut rng = StdRng::from_entropy();
        let ensemble = Ensemble::new(BLOBS, &mut rng);
        Self {
            rng,
            ensemble,
            field: PointField::new(),
            t: 0.0,
            yaw: 0.0,
            spin: true,
            iso: 1.0,
            paused: false,
            show_hud: true,
            theme_idx: 0,
        }
    }

    fn reseed(&mut self, count: usize) {
        let stir = self.ensemble.stir;
        self.ensemble = Ensemble::new(count, &mut self.rng);
        self.ensemble.stir = stir;
    }

    /// One frame of the core: advance the blobs, then refill the field so
    /// sampling sees this frame's final positions.
    fn tick(&mut self, dt: f32) {
        if !self.paused {
            self.t += dt;
            self.ensemble.step(dt, self.t);
            if self.spin {
                self.yaw += 0.25 * dt;
            }
        }
        field::emit(&self.ensemble, &mut self.field);
    }
}

fn main() -> io::Result<()> {
    let mut out = io::stdout();

    execute!(out, EnterAlternateScreen, DisableLineWrap, cursor::Hide)?;
    terminal::enable_raw_mode()?;

    let mut app = App::new();
    let mut last = Instant::now();

    let mut last_fps = Instant::now();
    let mut fps_smoothed = 30.0f32;
    let mut frames = 0u32;

    let mut size = terminal::size()?;
    let mut diff = Diff::new(size.0, size.1);

    let mut quit = false;

    while !quit {
        // Input
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => quit = true,
                    KeyCode::Char(' ') => app.paused = !app.paused,
                    KeyCode::Char('h') => app.show_hud = !app.show_hud,
                    KeyCode::Char('c') | KeyCode::Char('C') => {
                        app.theme_idx = app.theme_idx.wrapping_add(1);
                    }
                    KeyCode::Char('r') => {
                        let n = app.ensemble.len();
                        app.reseed(n);
                    }
                    KeyCode::Char('v') => app.spin = !app.spin,
                    KeyCode::Char('[') => {
                        let n = app.ensemble.len().saturating_sub(1).max(4);
                        app.reseed(n);
                    }
                    KeyCode::Char(']') => {
                        let n = (app.ensemble.len() + 1).min(32);
                        app.reseed(n);
                    }
                    KeyCode::Char(',') => {
                        app.ensemble.stir = (app.ensemble.stir - 0.05).clamp(0.0, 1.0)
                    }
                    KeyCode::Char('.') => {
                        app.ensemble.stir = (app.ensemble.stir + 0.05).clamp(0.0, 1.0)
                    }
                    KeyCode::Char('-') => app.iso = (app.iso + 0.1).clamp(0.2, 6.0),
                    KeyCode::Char('=') | KeyCode::Char('+') => {
                        app.iso = (app.iso - 0.1).clamp(0.2, 6.0)
                    }
                    _ => {}
                },
                Event::Resize(w, h) => {
                    size = (w, h);
                    diff.resize(w, h);
                }
                _ => {}
            }
        }

        // Time: the scheduler clamps dt before handing it to the core.
        let now = Instant::now();
        let dt = (now - last).as_secs_f32().min(DT_CLAMP);
        last = now;

        app.tick(dt);

        // FPS
        frames += 1;
        let fps_window = (now - last_fps).as_secs_f32();
        if fps_window >= 0.33 {
            let fps = frames as f32 / fps_window.max(1e-6);
            fps_smoothed = fps_smoothed * 0.85 + fps * 0.15;
            frames = 0;
            last_fps = now;
        }

        // Render
        let (w, h) = (size.0, size.1);
        let theme = theme_for(app.theme_idx);
        let bg_global = theme.bg_global;
        diff.clear_next(bg_global);

        let glass_pad_x = 2u16;
        let glass_pad_y = 1u16;
        let inner_w = w.saturating_sub(glass_pad_x * 2);
        let inner_h = h.saturating_sub(glass_pad_y * 2);

        draw_frame(&mut diff, w, h, theme);

        // Volume pass: each braille subpixel casts a short ray through the
        // rotating field and lights up where it crosses the iso threshold.
        let (yaw_sin, yaw_cos) = app.yaw.sin_cos();

        for y in 0..inner_h {
            let fy_cell = (y as f32 + 0.5) / inner_h.max(1) as f32;
            let wy_cell = (1.0 - 2.0 * fy_cell) * Y_SPAN;
            let prof_cell = radius_profile(wy_cell.clamp(-1.0, 1.0));
            let liquid_bg = quantize_bg(fy_cell, theme);

            for x in 0..inner_w {
                let fx_cell = (x as f32 + 0.5) / inner_w.max(1) as f32;
                let xv_cell = (fx_cell * 2.0 - 1.0) * X_SPAN;
                let inside_glass = wy_cell.abs() <= 1.0 && xv_cell.abs() <= prof_cell;
                let bg = if inside_glass { liquid_bg } else { bg_global };

                let mut bits: u8 = 0;
                let mut cov = 0.0f32;
                let mut wax = [0.0f32; 3];

                if inside_glass {
                    for py in 0..4 {
                        for px in 0..2 {
                            let fx =
                                (x as f32 + (px as f32 + 0.5) / 2.0) / inner_w.max(1) as f32;
                            let fy =
                                (y as f32 + (py as f32 + 0.5) / 4.0) / inner_h.max(1) as f32;
                            let xv = (fx * 2.0 - 1.0) * X_SPAN;
                            let wy = (1.0 - 2.0 * fy) * Y_SPAN;
                            if wy.abs() > 1.0 {
                                continue;
                            }
                            let prof = radius_profile(wy);
                            if xv.abs() > prof {
                                continue;
                            }

                            // ray spans the chord of the vessel at this height
                            let chord = (prof * prof - xv * xv).sqrt();
                            let mut best_v = 0.0f32;
                            let mut best_c = [0.0f32; 3];
                            for k in 0..DEPTH_SAMPLES {
                                let zv = ((k as f32 + 0.5) / DEPTH_SAMPLES as f32 * 2.0 - 1.0)
                                    * chord;
                                let wx = yaw_cos * xv - yaw_sin * zv;
                                let wz = yaw_sin * xv + yaw_cos * zv;
                                let (v, c) = app.field.sample_colored(wx, wy, wz);
                                if v > best_v {
                                    best_v = v;
                                    best_c = c;
                                }
                            }

                            if best_v > app.iso {
                                cov += 1.0;
                                wax[0] += best_c[0];
                                wax[1] += best_c[1];
                                wax[2] += best_c[2];
                                bits |= 1u8 << dot_index(px, py);
                            }
                        }
                    }
                }

                let (ch, fg) = if bits == 0 {
                    (' ', bg)
                } else {
                    let n = cov.max(1.0);
                    let wax_rgb = Rgb::from_unit([wax[0] / n, wax[1] / n, wax[2] / n]);
                    cov /= 8.0;
                    let fg = Rgb::lerp(bg, wax_rgb, (0.55 + 0.45 * cov).clamp(0.0, 1.0));
                    (braille_from_bits(bits), fg)
                };

                diff.set_next(x + glass_pad_x, y + glass_pad_y, Cell { ch, fg, bg });
            }
        }

        // Vessel silhouette: the same radius profile the blobs respect.
        for y in 0..inner_h {
            let fy_cell = (y as f32 + 0.5) / inner_h.max(1) as f32;
            let wy_cell = (1.0 - 2.0 * fy_cell) * Y_SPAN;
            if wy_cell.abs() > 1.0 {
                continue;
            }
            let prof = radius_profile(wy_cell);
            let col_of = |xv: f32| -> i32 {
                (((xv / X_SPAN + 1.0) * 0.5) * inner_w as f32 - 0.5).round() as i32
            };
            for (xv, ch) in [(-prof, '('), (prof, ')')] {
                let col = col_of(xv);
                if col < 0 || col >= inner_w as i32 {
                    continue;
                }
                let cx = col as u16 + glass_pad_x;
                let cy = y + glass_pad_y;
                if diff.char_at(cx, cy) == ' ' {
                    diff.set_next(
                        cx,
                        cy,
                        Cell {
                            ch,
                            fg: theme.glass_edge,
                            bg: bg_global,
                        },
                    );
                }
            }
        }

        // HUD
        if app.show_hud && h >= 3 {
            let line1 = format!(
                "Lava Lamp 3D  blobs:{}  iso:{:.1}  stir:{:>3}%  {:>5.0} fps{}",
                app.ensemble.len(),
                app.iso,
                (app.ensemble.stir * 100.0).round() as i32,
                fps_smoothed,
                if app.paused { "  [PAUSED]" } else { "" }
            );
            let line2 = "Keys: [-]/[+] iso  ,/. stir  [ / ] blobs  V spin  C theme  Space pause  R reseed  H hud  Q quit";

            for (i, ch) in line1.chars().take(w as usize).enumerate() {
                diff.set_next(
                    i as u16,
                    0,
                    Cell {
                        ch,
                        fg: theme.hud_fg,
                        bg: theme.hud_bg,
                    },
                );
            }
            if h >= 2 {
                for (i, ch) in line2.chars().take(w as usize).enumerate() {
                    diff.set_next(
                        i as u16,
                        1,
                        Cell {
                            ch,
                            fg: theme.hud_fg_dim,
                            bg: theme.hud_bg,
                        },
                    );
                }
            }
        }

        // Flush with flicker mitigation
        queue!(out, BeginSynchronizedUpdate)?;
        diff.flush(&mut out)?;
        queue!(out, ResetColor, EndSynchronizedUpdate)?;
        out.flush()?;

        // Cap frame rate
        std::thread::sleep(Duration::from_millis(8));
    }

    // Cleanup
    terminal::disable_raw_mode()?;
    execute!(
        out,
        ResetColor,
        cursor::Show,
        EnableLineWrap,
        LeaveAlternateScreen
    )?;
    Ok(())
}

fn draw_frame(diff: &mut Diff, w: u16, h: u16, theme: Theme) {
    let edge = theme.glass_edge;
    let bg = theme.bg_global;
    if w < 2 || h < 2 {
        return;
    }
    for x in 0..w {
        diff.set_next(x, 0, Cell { ch: '─', fg: edge, bg });
        diff.set_next(x, h - 1, Cell { ch: '─', fg: edge, bg });
    }
    for y in 0..h {
        diff.set_next(0, y, Cell { ch: '│', fg: edge, bg });
        diff.set_next(w - 1, y, Cell { ch: '│', fg: edge, bg });
    }
    diff.set_next(0, 0, Cell { ch: '╭', fg: edge, bg });
    diff.set_next(w - 1, 0, Cell { ch: '╮', fg: edge, bg });
    diff.set_next(0, h - 1, Cell { ch: '╰', fg: edge, bg });
    diff.set_next(w - 1, h - 1, Cell { ch: '╯', fg: edge, bg });
}
