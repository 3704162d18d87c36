use rand::seq::SliceRandom;

use crate::models::BookColor;

/// Chooses the color of a newly created book when the caller did not pick one.
pub trait Palette: Send + Sync {
    fn pick(&self) -> BookColor;
}

/// Uniform choice over every [`BookColor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPalette;

impl Palette for RandomPalette {
    fn pick(&self) -> BookColor {
        *BookColor::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&BookColor::Gray)
    }
}

/// Always the same color.
#[derive(Debug, Clone, Copy)]
pub struct FixedPalette(pub BookColor);

impl Palette for FixedPalette {
    fn pick(&self) -> BookColor {
        self.0
    }
}
