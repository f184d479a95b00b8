//! Engineering quantities and value-with-unit parsing.
//!
//! Netlist values carry units: `10k_Ohm`, `5_V`, `1.5_mF`, `60_Hz`,
//! `0_rad`. A value is `<number>[_<multiplier>]_<unit>`, with the
//! multiplier optionally glued to the unit (`10kOhm`). A bare number is
//! dimensionless.

use std::f64::consts::TAU;
use std::fmt;

/// Physical quantity a netlist value denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Current,
    Voltage,
    Resistance,
    Capacitance,
    Inductance,
    Time,
    Frequency,
    Angle,
    /// A bare number with no unit.
    Dimensionless,
}

impl Quantity {
    /// Base unit symbol.
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Current => "A",
            Quantity::Voltage => "V",
            Quantity::Resistance => "Ohm",
            Quantity::Capacitance => "F",
            Quantity::Inductance => "H",
            Quantity::Time => "s",
            Quantity::Frequency => "Hz",
            Quantity::Angle => "rad",
            Quantity::Dimensionless => "",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Current => "current",
            Quantity::Voltage => "voltage",
            Quantity::Resistance => "resistance",
            Quantity::Capacitance => "capacitance",
            Quantity::Inductance => "inductance",
            Quantity::Time => "time",
            Quantity::Frequency => "frequency",
            Quantity::Angle => "angle",
            Quantity::Dimensionless => "dimensionless",
        };
        f.write_str(name)
    }
}

/// Unit symbol -> (quantity, ratio to the base unit).
fn unit_info(unit: &str) -> Option<(Quantity, f64)> {
    let info = match unit {
        "A" => (Quantity::Current, 1.0),
        "V" => (Quantity::Voltage, 1.0),
        "Ohm" | "Ω" => (Quantity::Resistance, 1.0),
        "F" => (Quantity::Capacitance, 1.0),
        "H" => (Quantity::Inductance, 1.0),
        "s" => (Quantity::Time, 1.0),
        "min" => (Quantity::Time, 60.0),
        "Hz" => (Quantity::Frequency, 1.0),
        "rad" => (Quantity::Angle, 1.0),
        "deg" | "°" => (Quantity::Angle, TAU / 360.0),
        "grad" => (Quantity::Angle, TAU / 400.0),
        _ => return None,
    };
    Some(info)
}

/// SI multiplier prefix -> scale factor.
fn multiplier(prefix: &str) -> Option<f64> {
    let factor = match prefix {
        "E" => 1e18,
        "P" => 1e15,
        "T" => 1e12,
        "G" => 1e9,
        "M" => 1e6,
        "k" => 1e3,
        "" => 1.0,
        "m" => 1e-3,
        "u" | "μ" => 1e-6,
        "n" => 1e-9,
        "p" => 1e-12,
        "f" => 1e-15,
        "a" => 1e-18,
        _ => return None,
    };
    Some(factor)
}

/// Parse a value-with-unit literal into its quantity and base-unit value.
///
/// Returns `None` for malformed numbers, unknown units, and a multiplier
/// with no unit (`10k` alone is invalid; `10` alone is dimensionless).
pub fn parse_value(input: &str) -> Option<(Quantity, f64)> {
    // Numeric part: digits and at most the dots `f64::parse` accepts;
    // underscores inside the number are ignored.
    let mut number = String::new();
    let mut rest = input;
    for (pos, ch) in input.char_indices() {
        if ch == '_' {
            continue;
        }
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
        } else {
            rest = &input[pos..];
            break;
        }
        rest = &input[pos + ch.len_utf8()..];
    }

    if number.is_empty() {
        return None;
    }
    let value: f64 = number.parse().ok()?;

    if rest.is_empty() {
        return Some((Quantity::Dimensionless, value));
    }

    // `mV` or `m_V`: an explicit underscore separates multiplier and unit;
    // otherwise try the whole token as a unit first (`min` is a unit, not
    // `m` + `in`), then fall back to first-character multiplier.
    let (prefix, unit) = match rest.find('_') {
        Some(pos) if pos + 1 == rest.len() => return None,
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => {
            if let Some((quantity, ratio)) = unit_info(rest) {
                return Some((quantity, value * ratio));
            }
            let first = rest.chars().next()?;
            rest.split_at(first.len_utf8())
        }
    };

    let (quantity, ratio) = unit_info(unit)?;
    let factor = multiplier(prefix)?;
    Some((quantity, value * ratio * factor))
}
