#[inline]
pub fn lerp(delta: f64, start: f64, end: f64) -> f64 {
    start + delta * (end - start)
}

#[inline]
pub fn lerp2(dx: f64, dy: f64, v00: f64, v10: f64, v01: f64, v11: f64) -> f64 {
    lerp(dy, lerp(dx, v00, v10), lerp(dx, v01, v11))
}

#[allow(clippy::too_many_arguments)]
#[inline]
pub fn lerp3(
    dx: f64,
    dy: f64,
    dz: f64,
    v000: f64,
    v100: f64,
    v010: f64,
    v110: f64,
    v001: f64,
    v101: f64,
    v011: f64,
    v111: f64,
) -> f64 {
    lerp(
        dz,
        lerp2(dx, dy, v000, v100, v010, v110),
        lerp2(dx, dy, v001, v101, v011, v111),
    )
}

#[inline]
pub fn clamped_lerp(start: f64, end: f64, delta: f64) -> f64 {
    if delta < 0.0 {
        start
    } else if delta > 1.0 {
        end
    } else {
        lerp(delta, start, end)
    }
}

#[inline]
pub fn inverse_lerp(value: f64, start: f64, end: f64) -> f64 {
    (value - start) / (end - start)
}

#[inline]
pub fn map(value: f64, from_start: f64, from_end: f64, to_start: f64, to_end: f64) -> f64 {
    lerp(inverse_lerp(value, from_start, from_end), to_start, to_end)
}

#[inline]
pub fn clamped_map(value: f64, from_start: f64, from_end: f64, to_start: f64, to_end: f64) -> f64 {
    clamped_lerp(to_start, to_end, inverse_lerp(value, from_start, from_end))
}

#[inline]
pub fn smoothstep(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
pub fn floor_div(value: i32, divisor: i32) -> i32 {
    value.div_euclid(divisor)
}

#[inline]
pub fn floor(value: f64) -> i32 {
    value.floor() as i32
}

#[inline]
pub fn lfloor(value: f64) -> i64 {
    value.floor() as i64
}

#[inline]
pub fn quart_from_block(block: i32) -> i32 {
    block >> 2
}

#[inline]
pub fn quart_to_block(quart: i32) -> i32 {
    quart << 2
}

#[cfg(test)]
mod test {
    use crate::math::{clamped_map, floor_div, lerp3, map};

    #[test]
    fn floor_div_rounds_down() {
        assert_eq!(floor_div(-1, 12), -1);
        assert_eq!(floor_div(-12, 12), -1);
        assert_eq!(floor_div(-13, 12), -2);
        assert_eq!(floor_div(11, 12), 0);
    }

    #[test]
    fn maps() {
        assert_eq!(map(0.5, 0.0, 1.0, 10.0, 20.0), 15.0);
        assert_eq!(clamped_map(2.0, 0.0, 1.0, 10.0, 20.0), 20.0);
        assert_eq!(clamped_map(-2.0, 0.0, 1.0, 10.0, 20.0), 10.0);
    }

    #[test]
    fn lerp3_corners() {
        let corners = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let at = |dx, dy, dz| {
            lerp3(
                dx, dy, dz, corners[0], corners[1], corners[2], corners[3], corners[4],
                corners[5], corners[6], corners[7],
            )
        };
        assert_eq!(at(0.0, 0.0, 0.0), 1.0);
        assert_eq!(at(1.0, 0.0, 0.0), 2.0);
        assert_eq!(at(0.0, 1.0, 1.0), 7.0);
        assert_eq!(at(0.5, 0.5, 0.5), 4.5);
    }
}
