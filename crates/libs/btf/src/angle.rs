//! Angle values and the angle conditions identifying one illumination/view
//! geometry.
//!
//! Angles are degrees throughout. Two representations exist side by side and
//! must not be unified: the packed archive stores angle tables produced by
//! numeric computation, compared with [`angles_close`]; directory archives
//! author angles as exact decimal text, quantized to [`Millidegrees`] and
//! compared exactly.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Absolute tolerance of [`angles_close`].
const ABS_TOL: f32 = 1.0e-8;

/// Relative tolerance of [`angles_close`].
const REL_TOL: f32 = 1.0e-5;

/// An angle stored as an integer number of thousandths of a degree.
///
/// The four-axis stage that positions the light and the camera resolves
/// 0.001 degree, so any two angle values that round to the same millidegree
/// denote the same measurement condition. Quantizing decimal text happens on
/// the decimal digits directly, without a round trip through binary floating
/// point; ties round half to even.
///
/// # Example
///
/// ```
/// use btf::Millidegrees;
///
/// let a: Millidegrees = "10.2501".parse().unwrap();
/// let b: Millidegrees = "10.2502".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.value(), 10250);
/// assert_eq!(a.to_string(), "10.250");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Millidegrees(i64);

impl Millidegrees {
    /// Zero angle.
    pub const ZERO: Self = Self(0);

    /// Creates an angle from a raw millidegree count.
    pub const fn new(millis: i64) -> Self { Self(millis) }

    /// Returns the raw millidegree count.
    pub const fn value(&self) -> i64 { self.0 }

    /// Quantizes a floating-point angle in degrees, rounding ties to even.
    pub fn from_degrees(degrees: f32) -> Self {
        Self((degrees as f64 * 1.0e3).round_ties_even() as i64)
    }

    /// Returns the angle in degrees.
    pub fn as_degrees(&self) -> f32 { self.0 as f32 * 1.0e-3 }
}

impl Display for Millidegrees {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:03}", sign, abs / 1000, abs % 1000)
    }
}

/// Error produced when decimal angle text cannot be quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseAngleError;

impl Display for ParseAngleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid decimal angle value")
    }
}

impl std::error::Error for ParseAngleError {}

impl FromStr for Millidegrees {
    type Err = ParseAngleError;

    /// Parses decimal text such as `20.25`, `0` or `-11.5`, quantized to
    /// millidegrees with ties rounded half to even.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseAngleError);
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseAngleError);
        }
        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| ParseAngleError)?
        };
        let frac = frac_part.as_bytes();
        let mut millis = 0i64;
        for i in 0..3 {
            millis = millis * 10 + frac.get(i).map_or(0, |b| (b - b'0') as i64);
        }
        // Digits past the stage resolution round half to even.
        if let Some(&first) = frac.get(3) {
            let first = first - b'0';
            let tail_nonzero = frac[4..].iter().any(|&b| b != b'0');
            if first > 5 || (first == 5 && (tail_nonzero || millis % 2 == 1)) {
                millis += 1;
            }
        }
        let magnitude = whole
            .checked_mul(1000)
            .and_then(|v| v.checked_add(millis))
            .ok_or(ParseAngleError)?;
        Ok(Self(if negative { -magnitude } else { magnitude }))
    }
}

/// The four quantized angles identifying one illumination/view geometry.
///
/// Field order is `(theta_light, phi_light, theta_view, phi_view)`. Equality
/// and hashing operate on the quantized fields, so two conditions compare
/// equal exactly when all four angles round to the same millidegree value;
/// the fixed-precision semantics of directory-archive keys are carried by
/// the type rather than by caller discipline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AngleCondition {
    /// Polar angle of the light direction.
    pub tl: Millidegrees,
    /// Azimuthal angle of the light direction.
    pub pl: Millidegrees,
    /// Polar angle of the view direction.
    pub tv: Millidegrees,
    /// Azimuthal angle of the view direction.
    pub pv: Millidegrees,
}

impl AngleCondition {
    /// Creates a condition from quantized angles.
    pub const fn new(
        tl: Millidegrees,
        pl: Millidegrees,
        tv: Millidegrees,
        pv: Millidegrees,
    ) -> Self {
        Self { tl, pl, tv, pv }
    }

    /// Quantizes four floating-point angles in degrees into a condition.
    pub fn from_degrees(tl: f32, pl: f32, tv: f32, pv: f32) -> Self {
        Self {
            tl: Millidegrees::from_degrees(tl),
            pl: Millidegrees::from_degrees(pl),
            tv: Millidegrees::from_degrees(tv),
            pv: Millidegrees::from_degrees(pv),
        }
    }
}

impl Display for AngleCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.tl, self.pl, self.tv, self.pv)
    }
}

/// Tolerant element-wise comparison of two angle tuples.
///
/// Angle tables of packed archives are produced by numeric computation and
/// carry round-off; a query matches a stored tuple when every component is
/// within a small absolute or relative tolerance of the stored value. This
/// is deliberately looser than [`AngleCondition`] equality and must stay
/// confined to the packed-archive path.
pub fn angles_close(a: &[f32; 4], b: &[f32; 4]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| approx::relative_eq!(*x, *y, epsilon = ABS_TOL, max_relative = REL_TOL))
}
