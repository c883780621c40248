/// Wraps an angle into `[-PI, PI]`.
pub fn clean_angle(angle: f32) -> f32 {
    let tau = std::f32::consts::TAU;
    let mut wrapped = angle % tau;
    if wrapped > std::f32::consts::PI {
        wrapped -= tau;
    } else if wrapped < -std::f32::consts::PI {
        wrapped += tau;
    }
    wrapped
}

/// Interpolates between two angles along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    from + clean_angle(to - from) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn wraps_into_signed_range() {
        assert!((clean_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((clean_angle(-3.0 * PI) + PI).abs() < 1e-5);
        assert_eq!(clean_angle(0.5), 0.5);
    }

    #[test]
    fn lerp_takes_shortest_arc() {
        let mid = lerp_angle(PI - 0.1, -PI + 0.1, 0.5);
        assert!(mid.abs() > PI - 0.2);
    }
}
