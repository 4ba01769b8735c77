use crate::noise::improved_noise::GRADIENT;
use mcrs_random::Random;
use mcrs_random::legacy::LegacyRandom;

const SQRT_3: f64 = 1.7320508075688772;
const F2: f64 = 0.5 * (SQRT_3 - 1.0);
const G2: f64 = (3.0 - SQRT_3) / 6.0;

/// 2D simplex noise, only used for the end island shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexNoise {
    permutation: [u8; 256],
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
}

impl SimplexNoise {
    pub fn from_random<T>(random: &mut T) -> Self
    where
        T: Random,
    {
        let origin_x = random.next_f64() * 256.0;
        let origin_y = random.next_f64() * 256.0;
        let origin_z = random.next_f64() * 256.0;
        let mut permutation = [0u8; 256];
        for (i, p) in permutation.iter_mut().enumerate() {
            *p = i as u8;
        }
        for i in 0..256u32 {
            let j = random.next_u32_bound(256 - i);
            permutation.swap(i as usize, (i + j) as usize);
        }
        Self {
            permutation,
            origin_x,
            origin_y,
            origin_z,
        }
    }

    #[inline(always)]
    fn p(&self, index: i32) -> i32 {
        self.permutation[(index & 0xFF) as usize] as i32
    }

    fn corner(gradient: i32, x: f64, y: f64) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let g = &GRADIENT[gradient as usize];
            let t = t * t;
            t * t * (g[0] * x + g[1] * y)
        }
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * F2;
        let i = (x + skew).floor() as i32;
        let j = (y + skew).floor() as i32;
        let unskew = (i + j) as f64 * G2;
        let x0 = x - (i as f64 - unskew);
        let y0 = y - (j as f64 - unskew);
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };
        let x1 = x0 - i1 as f64 + G2;
        let y1 = y0 - j1 as f64 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;
        let ii = i & 0xFF;
        let jj = j & 0xFF;
        let g0 = self.p(ii + self.p(jj)) % 12;
        let g1 = self.p(ii + i1 + self.p(jj + j1)) % 12;
        let g2 = self.p(ii + 1 + self.p(jj + 1)) % 12;
        70.0 * (Self::corner(g0, x0, y0) + Self::corner(g1, x1, y1) + Self::corner(g2, x2, y2))
    }
}

const ISLAND_RANDOM_SKIP: usize = 17292;

/// Height field of the outer end islands, in density units.
#[derive(Debug, Clone, PartialEq)]
pub struct EndIslands {
    noise: SimplexNoise,
}

impl EndIslands {
    pub const MIN_VALUE: f64 = -0.84375;
    pub const MAX_VALUE: f64 = 0.5625;

    pub fn new(seed: u64) -> Self {
        let mut random = LegacyRandom::new(seed);
        random.consume(ISLAND_RANDOM_SKIP);
        Self {
            noise: SimplexNoise::from_random(&mut random),
        }
    }

    fn height(&self, x: i32, z: i32) -> f32 {
        let chunk_x = x / 2;
        let chunk_z = z / 2;
        let local_x = x % 2;
        let local_z = z % 2;
        let dist = (x.wrapping_mul(x).wrapping_add(z.wrapping_mul(z)) as f32).sqrt();
        let mut height = (100.0 - dist * 8.0).clamp(-100.0, 80.0);
        for dx in -12..=12 {
            for dz in -12..=12 {
                let cx = (chunk_x + dx) as i64;
                let cz = (chunk_z + dz) as i64;
                if cx * cx + cz * cz > 4096 && self.noise.sample(cx as f64, cz as f64) < -0.9f32 as f64 {
                    let falloff = ((cx as f32).abs() * 3439.0 + (cz as f32).abs() * 147.0) % 13.0 + 9.0;
                    let ox = (local_x - dx * 2) as f32;
                    let oz = (local_z - dz * 2) as f32;
                    let island = (100.0 - (ox * ox + oz * oz).sqrt() * falloff).clamp(-100.0, 80.0);
                    height = height.max(island);
                }
            }
        }
        height
    }

    pub fn sample(&self, x: i32, z: i32) -> f64 {
        (self.height(x / 8, z / 8) as f64 - 8.0) / 128.0
    }
}
