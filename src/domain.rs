//! Compiled-in IPN domain table and the colour palettes used by the plots.

use serde::Serialize;

/// Domain id as stored in rows. `0` marks a missing or out-of-range value.
pub type DomainId = u8;

pub const UNKNOWN_DOMAIN: DomainId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainInfo {
    pub id: DomainId,
    pub code: &'static str,
    pub full_name: &'static str,
    pub color: Rgb,
}

pub const DOMAINS: [DomainInfo; 6] = [
    DomainInfo { id: 1, code: "Di", full_name: "Dorsal IPN, subdomain i", color: Rgb::from_hex(0xC1514A) },
    DomainInfo { id: 2, code: "Dii", full_name: "Dorsal IPN, subdomain ii", color: Rgb::from_hex(0xE8C547) },
    DomainInfo { id: 3, code: "I", full_name: "Intermediate IPN", color: Rgb::from_hex(0x808080) },
    DomainInfo { id: 4, code: "Vi", full_name: "Ventral IPN, subdomain i", color: Rgb::from_hex(0x90C468) },
    DomainInfo { id: 5, code: "Vii", full_name: "Ventral IPN, subdomain ii", color: Rgb::from_hex(0x5DADE2) },
    DomainInfo { id: 6, code: "Viii", full_name: "Ventral IPN, subdomain iii", color: Rgb::from_hex(0x9B7EBD) },
];

pub fn domain_info(id: DomainId) -> Option<&'static DomainInfo> {
    DOMAINS.get((id as usize).checked_sub(1)?)
}

/// Short code for a domain, falling back to the raw number when unknown.
pub fn domain_code(id: DomainId) -> String {
    match domain_info(id) {
        Some(info) => info.code.to_string(),
        None => id.to_string(),
    }
}

/// Coerces a parsed number into a domain id, mapping anything outside 1..=6 to unknown.
pub fn coerce_domain(value: f64) -> DomainId {
    if value.is_finite() && value.fract() == 0.0 && (1.0..=6.0).contains(&value) {
        value as DomainId
    } else {
        UNKNOWN_DOMAIN
    }
}

pub const CLUSTER_PALETTE: [Rgb; 14] = [
    Rgb::from_hex(0xC1514A),
    Rgb::from_hex(0xE89C47),
    Rgb::from_hex(0xC9A942),
    Rgb::from_hex(0xA8B55C),
    Rgb::from_hex(0x6EB859),
    Rgb::from_hex(0x4FA65A),
    Rgb::from_hex(0x4B9B99),
    Rgb::from_hex(0x5FB8D4),
    Rgb::from_hex(0x5DADE2),
    Rgb::from_hex(0x7BA3D4),
    Rgb::from_hex(0x9B8BC7),
    Rgb::from_hex(0xB88BA8),
    Rgb::from_hex(0xC17BA3),
    Rgb::from_hex(0x4A4A4A),
];

/// Colour for the `ordinal`-th cluster in numeric order.
pub fn cluster_color(ordinal: usize) -> Rgb {
    CLUSTER_PALETTE[ordinal % CLUSTER_PALETTE.len()]
}

const EXPRESSION_STOPS: [(f64, Rgb); 5] = [
    (0.0, Rgb::from_hex(0xF0F0F0)),
    (0.25, Rgb::from_hex(0xFEE0D2)),
    (0.5, Rgb::from_hex(0xFC9272)),
    (0.75, Rgb::from_hex(0xDE2D26)),
    (1.0, Rgb::from_hex(0x67000D)),
];

/// Maps `value` onto the expression scale spanning `min..=max`.
pub fn expression_color(value: f64, min: f64, max: f64) -> Rgb {
    let t = if max > min && value.is_finite() {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    for pair in EXPRESSION_STOPS.windows(2) {
        let (lo, lo_color) = pair[0];
        let (hi, hi_color) = pair[1];
        if t <= hi {
            return lo_color.lerp(hi_color, (t - lo) / (hi - lo));
        }
    }
    EXPRESSION_STOPS[EXPRESSION_STOPS.len() - 1].1
}
