use crate::math::{lerp3, smoothstep};
use mcrs_random::Random;

pub(crate) const GRADIENT: [[f64; 3]; 16] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
    [1.0, 1.0, 0.0],
    [0.0, -1.0, 1.0],
    [-1.0, 1.0, 0.0],
    [0.0, -1.0, -1.0],
];

#[inline(always)]
pub(crate) fn grad_dot(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let g = &GRADIENT[(hash & 15) as usize];
    g[0] * x + g[1] * y + g[2] * z
}

/// One octave of classic Perlin noise over a shuffled 256-entry permutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovedNoise {
    permutation: [u8; 256],
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
}

impl ImprovedNoise {
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

    /// Samples the noise. A non-zero `y_scale` quantizes the y offset, which is how
    /// blended terrain noise smears vertically; `y_max` caps the quantized offset.
    #[inline(always)]
    pub fn sample(&self, x: f64, y: f64, z: f64, y_scale: f64, y_max: f64) -> f64 {
        let shifted_x = x + self.origin_x;
        let shifted_y = y + self.origin_y;
        let shifted_z = z + self.origin_z;
        let section_x = shifted_x.floor() as i32;
        let section_y = shifted_y.floor() as i32;
        let section_z = shifted_z.floor() as i32;
        let local_x = shifted_x - section_x as f64;
        let local_y = shifted_y - section_y as f64;
        let local_z = shifted_z - section_z as f64;
        let mut fade = 0.0;
        if y_scale != 0.0 {
            let t = if y_max >= 0.0 && y_max < local_y {
                y_max
            } else {
                local_y
            };
            fade = (t / y_scale + 1.0E-7).floor() * y_scale;
        }
        self.sample_and_lerp(
            section_x,
            section_y,
            section_z,
            local_x,
            local_y - fade,
            local_z,
            local_y,
        )
    }

    #[allow(clippy::too_many_arguments)]
    #[inline(always)]
    fn sample_and_lerp(
        &self,
        section_x: i32,
        section_y: i32,
        section_z: i32,
        local_x: f64,
        local_y: f64,
        local_z: f64,
        fade_local_y: f64,
    ) -> f64 {
        let p0 = self.p(section_x);
        let p1 = self.p(section_x.wrapping_add(1));
        let p00 = self.p(p0.wrapping_add(section_y));
        let p01 = self.p(p0.wrapping_add(section_y).wrapping_add(1));
        let p10 = self.p(p1.wrapping_add(section_y));
        let p11 = self.p(p1.wrapping_add(section_y).wrapping_add(1));

        let hash = |base: i32, dz: i32| self.p(base.wrapping_add(section_z).wrapping_add(dz)) as u8;

        let x1 = local_x - 1.0;
        let y1 = local_y - 1.0;
        let z1 = local_z - 1.0;

        let d000 = grad_dot(hash(p00, 0), local_x, local_y, local_z);
        let d100 = grad_dot(hash(p10, 0), x1, local_y, local_z);
        let d010 = grad_dot(hash(p01, 0), local_x, y1, local_z);
        let d110 = grad_dot(hash(p11, 0), x1, y1, local_z);
        let d001 = grad_dot(hash(p00, 1), local_x, local_y, z1);
        let d101 = grad_dot(hash(p10, 1), x1, local_y, z1);
        let d011 = grad_dot(hash(p01, 1), local_x, y1, z1);
        let d111 = grad_dot(hash(p11, 1), x1, y1, z1);

        lerp3(
            smoothstep(local_x),
            smoothstep(fade_local_y),
            smoothstep(local_z),
            d000,
            d100,
            d010,
            d110,
            d001,
            d101,
            d011,
            d111,
        )
    }
}
