//! Synthetic guide frames for tests and offline simulation.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// A 2-D Gaussian point source injected into a synthetic frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSource {
    /// Column of the PSF center
    pub x: f64,
    /// Row of the PSF center
    pub y: f64,
    /// Peak height above background in DN
    pub amplitude: f64,
    /// PSF standard deviation in pixels
    pub sigma: f64,
}

impl SyntheticSource {
    pub fn new(x: f64, y: f64, amplitude: f64, sigma: f64) -> Self {
        Self {
            x,
            y,
            amplitude,
            sigma,
        }
    }

    /// Move the source by a pixel displacement.
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Create a synthetic frame with Gaussian PSFs, a flat background and
/// Gaussian read noise.
///
/// Each PSF is rendered out to 6 sigma. The result is rounded and clamped to
/// the `u16` range. The same seed always yields the same frame.
pub fn synthetic_star_frame(
    width: usize,
    height: usize,
    sources: &[SyntheticSource],
    background: f64,
    noise_std: f64,
    seed: u64,
) -> Array2<u16> {
    let mut frame = Array2::<f64>::from_elem((height, width), background);

    for source in sources {
        if source.sigma <= 0.0 {
            continue;
        }
        let radius = (6.0 * source.sigma).ceil() as i64;
        let two_sigma2 = 2.0 * source.sigma * source.sigma;

        let x_min = (source.x.round() as i64 - radius).max(0);
        let x_max = (source.x.round() as i64 + radius).min(width as i64 - 1);
        let y_min = (source.y.round() as i64 - radius).max(0);
        let y_max = (source.y.round() as i64 + radius).min(height as i64 - 1);

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f64 - source.x;
                let dy = y as f64 - source.y;
                frame[[y as usize, x as usize]] +=
                    source.amplitude * (-(dx * dx + dy * dy) / two_sigma2).exp();
            }
        }
    }

    if noise_std > 0.0 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        if let Ok(normal) = Normal::new(0.0, noise_std) {
            for pixel in frame.iter_mut() {
                *pixel += normal.sample(&mut rng);
            }
        }
    }

    frame.mapv(|v| v.round().clamp(0.0, u16::MAX as f64) as u16)
}
