use serde_json::Value;
use tracing::warn;

/// Display unit reported in the device locale settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Round to the vendor's Celsius precision (0.5 increments).
pub fn round_half_celsius(c: f64) -> f64 {
    (c * 2.0).round() / 2.0
}

/// Bridges the vendor's internal Celsius representation and the Celsius
/// value the home-automation layer should show.
///
/// Fahrenheit units carry a firmware lookup table mapping each half-degree
/// internal Celsius value to the Fahrenheit number the unit itself displays.
/// The table does not round symmetrically, so the conversion preserves the
/// physical Fahrenheit display value instead of applying the arithmetic
/// formula, so the round trip can be lossy. The reverse direction is
/// a table scan because forward and reverse rounding are not exact inverses.
///
/// A value missing from the table is logged and passed through unchanged;
/// the bridge never fails across its boundary.
#[derive(Debug, Default)]
pub struct TemperatureBridge {
    unit: DisplayUnit,
    /// (internal Celsius in half-degree steps as `c * 2`, firmware Fahrenheit)
    table: Vec<(i32, i32)>,
}

impl TemperatureBridge {
    /// Identity bridge for Celsius locales.
    pub fn celsius() -> Self {
        Self {
            unit: DisplayUnit::Celsius,
            table: Vec::new(),
        }
    }

    pub fn fahrenheit(pairs: &[(f64, i32)]) -> Self {
        let table = pairs
            .iter()
            .map(|&(c, f)| ((c * 2.0).round() as i32, f))
            .collect();
        Self {
            unit: DisplayUnit::Fahrenheit,
            table,
        }
    }

    /// Build from the device's self-reported model metadata: a JSON object
    /// mapping internal Celsius values (as string keys, e.g. `"18.5"`) to
    /// the firmware's Fahrenheit display number.
    pub fn from_metadata(unit: DisplayUnit, mapping: &Value) -> Self {
        if unit == DisplayUnit::Celsius {
            return Self::celsius();
        }
        let mut pairs = Vec::new();
        if let Value::Object(map) = mapping {
            for (key, value) in map {
                let c: f64 = match key.parse() {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                let f = match value.as_f64() {
                    Some(f) => f.round() as i32,
                    None => continue,
                };
                pairs.push((c, f));
            }
        }
        if pairs.is_empty() {
            warn!("empty Celsius-to-Fahrenheit table in model metadata");
        }
        Self::fahrenheit(&pairs)
    }

    pub fn unit(&self) -> DisplayUnit {
        self.unit
    }

    /// Vendor-internal Celsius -> display Celsius.
    pub fn to_display(&self, internal_c: f64) -> f64 {
        if self.unit == DisplayUnit::Celsius {
            return internal_c;
        }
        let key = (round_half_celsius(internal_c) * 2.0).round() as i32;
        match self.table.iter().find(|(c, _)| *c == key) {
            Some(&(_, f)) => round_half_celsius((f64::from(f) - 32.0) * (5.0 / 9.0)),
            None => {
                warn!(
                    celsius = internal_c,
                    "no Fahrenheit table entry; passing value through unchanged"
                );
                internal_c
            }
        }
    }

    /// Display Celsius -> vendor-internal Celsius.
    pub fn to_internal(&self, display_c: f64) -> f64 {
        if self.unit == DisplayUnit::Celsius {
            return display_c;
        }
        let f = (display_c * (9.0 / 5.0) + 32.0).round() as i32;
        match self.table.iter().find(|(_, tf)| *tf == f) {
            Some(&(c, _)) => f64::from(c) / 2.0,
            None => {
                warn!(
                    celsius = display_c,
                    fahrenheit = f,
                    "no matching Fahrenheit table entry; passing value through unchanged"
                );
                display_c
            }
        }
    }
}
