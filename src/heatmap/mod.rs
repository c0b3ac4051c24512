// src/heatmap/mod.rs
pub mod glyph;
pub mod palette;

pub use glyph::{byte_to_glyph, Glyph, GLYPH_TABLE};
