use crate::{FitcheckError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Nano-units per whole unit
const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Decimal SI suffixes from largest to smallest, with their base-10 exponent
const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("", 0),
    ("m", -3),
    ("u", -6),
    ("n", -9),
];

/// Binary SI suffixes from largest to smallest, with their base-2 exponent
const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ei", 60),
    ("Pi", 50),
    ("Ti", 40),
    ("Gi", 30),
    ("Mi", 20),
    ("Ki", 10),
];

/// Notation a quantity was written in, used when rendering it back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuantityFormat {
    /// Powers of ten with SI suffixes (e.g. "500m", "2k")
    #[default]
    DecimalSI,
    /// Powers of two with IEC suffixes (e.g. "128Mi")
    BinarySI,
    /// Scientific notation (e.g. "1e3")
    DecimalExponent,
}

/// A resource amount such as `500m` CPU or `1Gi` memory.
///
/// The value is held exactly as a signed count of nano-units, so addition and
/// comparison never lose precision. Anything finer than a nano-unit is rounded
/// up when parsing. Equality, ordering and hashing consider magnitude only:
/// `1Gi` equals `1073741824`.
///
/// `Quantity` is `Copy`; storing one into a map always stores an independent
/// value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    /// Create a quantity of whole units
    pub fn new(value: i64, format: QuantityFormat) -> Self {
        Self {
            nanos: value as i128 * NANOS_PER_UNIT,
            format,
        }
    }

    /// Create a quantity from thousandths of a unit (e.g. CPU millicores)
    pub fn from_milli(milli: i64) -> Self {
        Self {
            nanos: milli as i128 * 1_000_000,
            format: QuantityFormat::DecimalSI,
        }
    }

    /// Create a quantity from a raw nano-unit count
    pub fn from_nanos(nanos: i128, format: QuantityFormat) -> Self {
        Self { nanos, format }
    }

    /// Raw nano-unit count
    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Whole units, rounded away from zero (the ceiling for non-negative
    /// values) and saturated to `i64`
    pub fn value(&self) -> i64 {
        saturate(div_away_from_zero(self.nanos, NANOS_PER_UNIT))
    }

    /// Thousandths of a unit, rounded away from zero and saturated to `i64`
    pub fn milli_value(&self) -> i64 {
        saturate(div_away_from_zero(self.nanos, 1_000_000))
    }

    /// Add `other` in place, saturating at the representable range.
    ///
    /// A zero quantity adopts the format of the value added to it.
    pub fn add_quantity(&mut self, other: &Quantity) {
        if self.nanos == 0 {
            self.format = other.format;
        }
        self.nanos = self.nanos.saturating_add(other.nanos);
    }

    /// Subtract `other` in place, saturating at the representable range
    pub fn sub_quantity(&mut self, other: &Quantity) {
        if self.nanos == 0 {
            self.format = other.format;
        }
        self.nanos = self.nanos.saturating_sub(other.nanos);
    }

    fn write_decimal(&self, f: &mut fmt::Formatter<'_>, exponent_notation: bool) -> fmt::Result {
        for (suffix, exp) in DECIMAL_SUFFIXES {
            // exp >= -9, so the divisor is at least 1
            let unit = 10i128.pow((exp + 9) as u32);
            if self.nanos % unit == 0 {
                let mantissa = self.nanos / unit;
                return if !exponent_notation {
                    write!(f, "{}{}", mantissa, suffix)
                } else if exp == 0 {
                    write!(f, "{}", mantissa)
                } else {
                    write!(f, "{}e{}", mantissa, exp)
                };
            }
        }
        unreachable!("nano-unit divisor always divides")
    }

    fn write_binary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.nanos / NANOS_PER_UNIT;
        for (suffix, shift) in BINARY_SUFFIXES {
            let unit = 1i128 << shift;
            if units % unit == 0 {
                return write!(f, "{}{}", units / unit, suffix);
            }
        }
        write!(f, "{}", units)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl AddAssign<&Quantity> for Quantity {
    fn add_assign(&mut self, rhs: &Quantity) {
        self.add_quantity(rhs);
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.add_quantity(&rhs);
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(mut self, rhs: Quantity) -> Quantity {
        self.add_quantity(&rhs);
        self
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        self.sub_quantity(&rhs);
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(mut self, rhs: Quantity) -> Quantity {
        self.sub_quantity(&rhs);
        self
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }
        match self.format {
            // Small or fractional binary values read better in decimal
            QuantityFormat::BinarySI
                if self.nanos % NANOS_PER_UNIT == 0
                    && (self.nanos / NANOS_PER_UNIT).abs() >= 1024 =>
            {
                self.write_binary(f)
            }
            QuantityFormat::BinarySI | QuantityFormat::DecimalSI => self.write_decimal(f, false),
            QuantityFormat::DecimalExponent => self.write_decimal(f, true),
        }
    }
}

/// Multiplier applied to the parsed mantissa
enum Scale {
    Decimal(i32),
    Binary(u32),
}

impl FromStr for Quantity {
    type Err = FitcheckError;

    /// Parse a Kubernetes quantity string such as `"100m"`, `"1.5Gi"` or `"2e3"`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| FitcheckError::invalid_quantity(s, reason);

        let (negative, rest) = if let Some(r) = s.strip_prefix('-') {
            (true, r)
        } else if let Some(r) = s.strip_prefix('+') {
            (false, r)
        } else {
            (false, s)
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("missing numeric value"));
        }
        if fraction.contains('.') {
            return Err(invalid("more than one decimal point"));
        }

        let (scale, format) = parse_suffix(suffix).ok_or_else(|| invalid("unknown suffix"))?;

        let fraction = fraction.trim_end_matches('0');
        let digits = format!("{}{}", whole, fraction);
        let digits = digits.trim_start_matches('0');
        let mantissa: i128 = if digits.is_empty() {
            0
        } else if digits.len() > 38 {
            return Err(invalid("value out of range"));
        } else {
            digits.parse().map_err(|_| invalid("malformed number"))?
        };

        let fraction_digits = fraction.len() as i64;
        let magnitude = match scale {
            Scale::Decimal(exp) => scale_pow10(mantissa, 9 + exp as i64 - fraction_digits),
            Scale::Binary(shift) => mantissa
                .checked_mul(1i128 << shift)
                .and_then(|m| scale_pow10(m, 9 - fraction_digits)),
        }
        .ok_or_else(|| invalid("value out of range"))?;

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }
}

fn parse_suffix(suffix: &str) -> Option<(Scale, QuantityFormat)> {
    if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Scale::Decimal(*exp), QuantityFormat::DecimalSI));
    }
    if let Some((_, shift)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Scale::Binary(*shift), QuantityFormat::BinarySI));
    }
    // "E" alone is exa and was matched above
    let exponent = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    let digits = exponent
        .strip_prefix('-')
        .or_else(|| exponent.strip_prefix('+'))
        .unwrap_or(exponent);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exp: i32 = exponent.parse().ok()?;
    Some((Scale::Decimal(exp), QuantityFormat::DecimalExponent))
}

/// Multiply a non-negative value by 10^exp, rounding up when exp is negative.
/// Returns None on overflow.
fn scale_pow10(value: i128, exp: i64) -> Option<i128> {
    if value == 0 {
        return Some(0);
    }
    if exp >= 0 {
        let factor = 10i128.checked_pow(u32::try_from(exp).ok()?)?;
        value.checked_mul(factor)
    } else {
        match 10i128.checked_pow(u32::try_from(-exp).ok()?) {
            Some(divisor) => Some(div_away_from_zero(value, divisor)),
            // Divisor exceeds any representable value: the smallest step remains
            None => Some(1),
        }
    }
}

fn div_away_from_zero(n: i128, d: i128) -> i128 {
    let q = n / d;
    if n % d != 0 {
        q + n.signum()
    } else {
        q
    }
}

fn saturate(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = FitcheckError;

    fn try_from(q: &K8sQuantity) -> Result<Self> {
        q.0.parse()
    }
}

impl From<Quantity> for K8sQuantity {
    fn from(q: Quantity) -> Self {
        K8sQuantity(q.to_string())
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a quantity string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Quantity, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Quantity, E> {
        Ok(Quantity::new(v, QuantityFormat::DecimalSI))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Quantity, E> {
        Ok(Quantity::from_nanos(
            v as i128 * NANOS_PER_UNIT,
            QuantityFormat::DecimalSI,
        ))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Quantity, E> {
        v.to_string().parse().map_err(E::custom)
    }
}
