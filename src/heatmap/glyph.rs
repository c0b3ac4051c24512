use once_cell::sync::Lazy;

use super::palette::{heat_color, Rgb, PALETTE};

/// Number of coverage steps a glyph can have (quarter .. full block).
pub const FILL_LEVELS: u8 = 4;
/// Partial blends scoring worse than this are not worth the visual noise.
const PARTIAL_SCORE_LIMIT: i32 = 50_000;
const SHADE_CHARS: [char; FILL_LEVELS as usize] = ['\u{2591}', '\u{2592}', '\u{2593}', '\u{2588}'];

/// Appearance of one strip cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    pub fg: u8,
    pub bg: u8,
    /// 1 = quarter coverage, 4 = full block
    pub fill: u8,
}

impl Glyph {
    pub fn symbol(self) -> char {
        SHADE_CHARS[(self.fill.clamp(1, FILL_LEVELS) - 1) as usize]
    }

    /// Color the cell appears as when `fill` quarters show `fg` over `bg`.
    pub fn blended(self) -> Rgb {
        let fg = PALETTE[self.fg as usize];
        let bg = PALETTE[self.bg as usize];
        let level = self.fill as i32;
        let rest = FILL_LEVELS as i32 - level;
        let mix = |f: u8, b: u8| ((f as i32 * level + b as i32 * rest) / FILL_LEVELS as i32) as u8;
        Rgb::new(mix(fg.r, bg.r), mix(fg.g, bg.g), mix(fg.b, bg.b))
    }
}

/// Squared RGB distance.
pub fn score(a: Rgb, b: Rgb) -> i32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    dr * dr + dg * dg + db * db
}

/// Exhaustive search for the glyph whose blend is closest to `target`.
///
/// Scan order is fill level descending, then foreground, then background;
/// only a strictly lower score replaces the current best.
pub fn best_match(target: Rgb) -> Glyph {
    let mut best = Glyph {
        fg: 0,
        bg: 0,
        fill: FILL_LEVELS,
    };
    let mut best_score = i32::MAX;
    for fill in (1..=FILL_LEVELS).rev() {
        for fg in 0..PALETTE.len() as u8 {
            for bg in 0..PALETTE.len() as u8 {
                let candidate = Glyph { fg, bg, fill };
                let s = score(candidate.blended(), target);
                let partial = fill > 1 && fill < FILL_LEVELS;
                if partial && s > PARTIAL_SCORE_LIMIT {
                    continue;
                }
                if s < best_score {
                    best_score = s;
                    best = candidate;
                }
            }
        }
    }
    best
}

/// Heat glyph for every byte intensity, built on first use.
pub static GLYPH_TABLE: Lazy<[Glyph; 256]> =
    Lazy::new(|| std::array::from_fn(|i| best_match(heat_color(i as f64 / 255.0))));

pub fn byte_to_glyph(intensity: u8) -> Glyph {
    GLYPH_TABLE[intensity as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_table_matches_direct_search() {
        for i in 0..=255u8 {
            let direct = best_match(heat_color(i as f64 / 255.0));
            assert_eq!(byte_to_glyph(i), direct, "intensity {i}");
        }
    }

    #[test]
    fn exact_palette_colors_use_full_block_first_hit() {
        assert_eq!(best_match(Rgb::new(0, 0, 0)), Glyph { fg: 0, bg: 0, fill: 4 });
        assert_eq!(best_match(Rgb::new(255, 255, 255)), Glyph { fg: 15, bg: 0, fill: 4 });
        assert_eq!(best_match(Rgb::new(0, 0, 255)), Glyph { fg: 9, bg: 0, fill: 4 });
    }

    #[test]
    fn half_blend_wins_when_it_is_exact() {
        // half of dark blue: no full block or 3/4 blend hits it, a 2/4 blend does
        let g = best_match(Rgb::new(0, 0, 0x40));
        assert_eq!(g, Glyph { fg: 0, bg: 1, fill: 2 });
        assert_eq!(g.blended(), Rgb::new(0, 0, 0x40));
    }

    #[test]
    fn partial_glyphs_in_table_stay_under_limit() {
        for i in 0..=255u8 {
            let g = byte_to_glyph(i);
            if g.fill == 2 || g.fill == 3 {
                let target = heat_color(i as f64 / 255.0);
                assert!(score(g.blended(), target) <= PARTIAL_SCORE_LIMIT);
            }
        }
    }

    #[test]
    fn extremes_render_black_and_white() {
        assert_eq!(byte_to_glyph(0), Glyph { fg: 0, bg: 0, fill: 4 });
        assert_eq!(byte_to_glyph(255), Glyph { fg: 15, bg: 0, fill: 4 });
        assert_eq!(byte_to_glyph(255).symbol(), '\u{2588}');
    }
}
