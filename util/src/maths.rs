//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Linearly interpolate between `a` and `b`, `t = 0` giving `a` and `t = 1` giving `b`.
pub fn lerp<T>(a: T, b: T, t: T) -> T
where
    T: Float
{
    a + (b - a) * t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle in radians into the range [-pi, pi).
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap();
    let tau_t = T::from(std::f64::consts::TAU).unwrap();

    rem_euclid(angle + pi_t, tau_t) - pi_t
}

/// Get the shortest signed angular distance from `from` to `to`, in radians.
///
/// Adding the result to `from` gives an angle equivalent to `to`. The result is
/// in the range [-pi, pi).
pub fn ang_dist<T>(from: T, to: T) -> T
where
    T: Float
{
    wrap_pi(to - from)
}

/// The unnormalised sinc function, `sin(x)/x`.
///
/// The removable singularity at zero is mapped to one, for very small `x` the
/// Taylor expansion is used so that no precision is lost near the origin.
pub fn sinc<T>(x: T) -> T
where
    T: Float
{
    let small = T::from(1e-6).unwrap();

    if x.abs() < small {
        T::one() - x * x / T::from(6.0).unwrap()
    }
    else {
        x.sin() / x
    }
}

/// Return `value` if it is finite, otherwise zero.
pub fn finite_or_zero<T>(value: T) -> T
where
    T: Float
{
    if value.is_finite() { value } else { T::zero() }
}

/// Limit the change from `prev` to `target` to at most `max_step`.
///
/// A non-positive `max_step` disables the limit.
pub fn slew<T>(prev: T, target: T, max_step: T) -> T
where
    T: Float
{
    if max_step <= T::zero() {
        return target
    }

    prev + (target - prev).max(-max_step).min(max_step)
}

/// Zero any value whose magnitude is below `band`.
pub fn deadband<T>(value: T, band: T) -> T
where
    T: Float
{
    if value.abs() < band { T::zero() } else { value }
}

/// Clamp the magnitude of `value` into `[min, max]`, keeping its sign.
///
/// Zero maps to zero, since it has no sign to keep.
pub fn clamp_magnitude<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    if value == T::zero() {
        return T::zero()
    }

    value.signum() * value.abs().max(min).min(max)
}

/// Sanitise an actuator demand: non-finite values become zero and the result
/// is clamped into [-1, 1].
pub fn actuator_demand<T>(value: T) -> T
where
    T: Float
{
    finite_or_zero(value).max(-T::one()).min(T::one())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ang_dist() {
        assert!(approx(ang_dist(1f64, 2f64), 1f64));
        assert!(approx(ang_dist(2f64, 1f64), -1f64));
        assert!(approx(ang_dist(0f64, 2.0 * PI), 0f64));

        // Shortest way round from -170 to 170 degrees is -20 degrees
        let d = ang_dist((-170f64).to_radians(), 170f64.to_radians());
        assert!(approx(d, (-20f64).to_radians()));

        // Multi-turn inputs still produce the short way round
        assert!(approx(ang_dist(0f64, 5.0 * PI + 0.5), -PI + 0.5));
    }

    #[test]
    fn test_sinc() {
        assert_eq!(sinc(0f64), 1f64);
        assert!(sinc(1e-9f64).is_finite());
        assert!(approx(sinc(PI / 2.0), 2.0 / PI));
        assert!(approx(sinc(-PI / 2.0), 2.0 / PI));
    }

    #[test]
    fn test_limits() {
        assert_eq!(slew(0.0, 1.0, 0.1), 0.1);
        assert_eq!(slew(0.5, -1.0, 0.2), 0.3);
        assert_eq!(slew(0.0, 1.0, 0.0), 1.0);

        assert_eq!(deadband(0.01, 0.05), 0.0);
        assert_eq!(deadband(-0.2, 0.05), -0.2);

        assert_eq!(clamp_magnitude(0.01, 0.1, 0.8), 0.1);
        assert_eq!(clamp_magnitude(-3.0, 0.1, 0.8), -0.8);
        assert_eq!(clamp_magnitude(0.0, 0.1, 0.8), 0.0);

        assert_eq!(actuator_demand(f64::NAN), 0.0);
        assert_eq!(actuator_demand(4.0), 1.0);
        assert_eq!(actuator_demand(-0.25), -0.25);
    }

    #[test]
    fn test_lerp() {
        assert!(approx(lerp(2.0, 4.0, 0.5), 3.0));
        assert!(approx(lerp(2.0, 4.0, 0.0), 2.0));
    }
}
