//! Fixed colors used by the strip: the 16-entry console palette and the
//! anchors of the heat gradient.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: (hex >> 16) as u8,
            g: (hex >> 8) as u8,
            b: hex as u8,
        }
    }
}

/// Console palette in classic console color order (black, dark blue, ... white).
/// A glyph's foreground/background index points into this table.
pub const PALETTE: [Rgb; 16] = [
    Rgb::from_hex(0x000000),
    Rgb::from_hex(0x000080),
    Rgb::from_hex(0x008000),
    Rgb::from_hex(0x008080),
    Rgb::from_hex(0x800000),
    Rgb::from_hex(0x800080),
    Rgb::from_hex(0x808000),
    Rgb::from_hex(0xC0C0C0),
    Rgb::from_hex(0x808080),
    Rgb::from_hex(0x0000FF),
    Rgb::from_hex(0x00FF00),
    Rgb::from_hex(0x00FFFF),
    Rgb::from_hex(0xFF0000),
    Rgb::from_hex(0xFF00FF),
    Rgb::from_hex(0xFFFF00),
    Rgb::from_hex(0xFFFFFF),
];

/// black -> blue -> cyan -> green -> yellow -> red -> white
pub const HEAT_ANCHORS: [Rgb; 7] = [
    Rgb::new(0, 0, 0),
    Rgb::new(0, 0, 0xFF),
    Rgb::new(0, 0xFF, 0xFF),
    Rgb::new(0, 0xFF, 0),
    Rgb::new(0xFF, 0xFF, 0),
    Rgb::new(0xFF, 0, 0),
    Rgb::new(0xFF, 0xFF, 0xFF),
];

/// Map a unit-interval fraction onto the heat gradient.
///
/// `fraction >= 1.0` returns the last anchor as is. Inputs the interpolation
/// cannot place (negative, NaN) fall back to the first anchor.
pub fn heat_color(fraction: f64) -> Rgb {
    if fraction >= 1.0 {
        return HEAT_ANCHORS[HEAT_ANCHORS.len() - 1];
    }
    interpolate(fraction).unwrap_or(HEAT_ANCHORS[0])
}

fn interpolate(fraction: f64) -> Option<Rgb> {
    let block_width = 1.0 / (HEAT_ANCHORS.len() - 1) as f64;
    let block = (fraction / block_width).trunc();
    if !(block >= 0.0) {
        return None;
    }
    let idx = block as usize;
    let from = HEAT_ANCHORS.get(idx)?;
    let to = HEAT_ANCHORS.get(idx + 1)?;
    let t = (fraction - block * block_width) / block_width;
    Some(Rgb {
        r: lerp(from.r, to.r, t)?,
        g: lerp(from.g, to.g, t)?,
        b: lerp(from.b, to.b, t)?,
    })
}

// truncates like a plain float -> byte cast, rejects anything outside a byte
fn lerp(from: u8, to: u8, t: f64) -> Option<u8> {
    let value = from as f64 + (to as f64 - from as f64) * t;
    (0.0..256.0).contains(&value).then(|| value as u8)
}
