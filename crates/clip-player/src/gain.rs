//! Logarithmic volume control.
//!
//! Volume is expressed on a base-2 scale: `0.0` is unity, `-1.0` halves the
//! amplitude, `1.0` doubles it. No volume at all means the device level is used
//! untouched.

/// Linear amplitude factor applied to every rendered sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gain(f32);

impl Gain {
    pub const UNITY: Gain = Gain(1.0);

    /// Gain for a base-2 logarithmic `volume`; `None` leaves samples untouched.
    pub fn from_volume(volume: Option<f32>) -> Self {
        match volume {
            Some(v) if v.is_finite() => Gain(2f32.powf(v)),
            _ => Gain::UNITY,
        }
    }

    pub fn factor(self) -> f32 {
        self.0
    }

    pub fn is_unity(self) -> bool {
        self.0 == 1.0
    }

    #[inline]
    pub fn apply(self, sample: f32) -> f32 {
        sample * self.0
    }
}

impl Default for Gain {
    fn default() -> Self {
        Gain::UNITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_unity() {
        assert!(Gain::from_volume(None).is_unity());
        assert_eq!(Gain::from_volume(None).apply(0.3), 0.3);
    }

    #[test]
    fn volume_is_base_two() {
        assert_eq!(Gain::from_volume(Some(-1.0)).factor(), 0.5);
        assert_eq!(Gain::from_volume(Some(0.0)).factor(), 1.0);
        assert_eq!(Gain::from_volume(Some(2.0)).apply(0.25), 1.0);
    }

    #[test]
    fn non_finite_volume_falls_back_to_unity() {
        assert!(Gain::from_volume(Some(f32::NAN)).is_unity());
        assert!(Gain::from_volume(Some(f32::NEG_INFINITY)).is_unity());
    }
}
