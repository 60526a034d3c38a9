use fastnoise_lite::{FastNoiseLite, NoiseType};

/// Fractal sum over an OpenSimplex2 base sampler, normalised into `[0, 1]`.
///
/// The base sampler runs at frequency 1 so callers scale coordinates themselves.
pub struct FractalNoise {
    base: FastNoiseLite,
}

impl FractalNoise {
    pub fn new(seed: i32) -> Self {
        let mut base = FastNoiseLite::with_seed(seed);
        base.set_noise_type(Some(NoiseType::OpenSimplex2));
        base.set_frequency(Some(1.0));
        Self { base }
    }

    pub fn noise2(&self, x: f32, z: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
        let mut freq = 1.0f32;
        let mut amp = 1.0f32;
        let mut max = 1.0f32;
        let mut total = self.base.get_noise_2d(x, z);
        for _ in 0..octaves {
            freq *= lacunarity;
            amp *= persistence;
            max += amp;
            total += self.base.get_noise_2d(x * freq, z * freq) * amp;
        }
        (1.0 + total / max) / 2.0
    }

    pub fn noise3(
        &self,
        x: f32,
        y: f32,
        z: f32,
        octaves: u32,
        persistence: f32,
        lacunarity: f32,
    ) -> f32 {
        let mut freq = 1.0f32;
        let mut amp = 1.0f32;
        let mut max = 1.0f32;
        let mut total = self.base.get_noise_3d(x, y, z);
        for _ in 0..octaves {
            freq *= lacunarity;
            amp *= persistence;
            max += amp;
            total += self.base.get_noise_3d(x * freq, y * freq, z * freq) * amp;
        }
        (1.0 + total / max) / 2.0
    }
}
