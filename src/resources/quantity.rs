//! Kubernetes resource quantities.
//!
//! The API server stores quantities in canonical form (`2000m` reads back
//! as `2`, `10240Mi` as `10Gi`), so quantities are compared by value.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Nano-units per unit.
const NANO: u128 = 1_000_000_000;

/// Value of a quantity in nano-units. `None` when it can't be parsed.
///
/// Accepts decimal SI suffixes (`n`, `u`, `m`, `k`, `M`, `G`, `T`, `P`,
/// `E`), binary suffixes (`Ki` to `Ei`) and decimal exponents (`1e3`).
/// Precision below one nano-unit is truncated.
pub fn parse_quantity(quantity: &str) -> Option<u128> {
    let quantity = quantity.trim();
    let quantity = quantity.strip_prefix('+').unwrap_or(quantity);
    let split = quantity
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let scale = multiplier(suffix)?;

    let mut value = whole.checked_mul(scale)?;
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let denominator = 10u128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
        value = value.checked_add(digits.checked_mul(scale)? / denominator)?;
    }
    Some(value)
}

fn multiplier(suffix: &str) -> Option<u128> {
    let binary = |shift: u32| (1u128 << shift).checked_mul(NANO);
    match suffix {
        "n" => Some(1),
        "u" => Some(1_000),
        "m" => Some(1_000_000),
        "" => Some(NANO),
        "k" => Some(NANO * 1_000),
        "M" => Some(NANO * 1_000_000),
        "G" => Some(NANO * 1_000_000_000),
        "T" => Some(NANO * 1_000_000_000_000),
        "P" => Some(NANO * 1_000_000_000_000_000),
        "E" => Some(NANO * 1_000_000_000_000_000_000),
        "Ki" => binary(10),
        "Mi" => binary(20),
        "Gi" => binary(30),
        "Ti" => binary(40),
        "Pi" => binary(50),
        "Ei" => binary(60),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            let exponent: u32 = exponent.strip_prefix('+').unwrap_or(exponent).parse().ok()?;
            10u128.checked_pow(exponent)?.checked_mul(NANO)
        }
    }
}

/// Whether two quantities are the same amount. Unparseable quantities
/// only match their exact spelling.
pub fn quantity_matches(deployed: &Quantity, required: &Quantity) -> bool {
    match (parse_quantity(&deployed.0), parse_quantity(&required.0)) {
        (Some(d), Some(r)) => d == r,
        _ => deployed.0 == required.0,
    }
}

/// Whether two resource lists hold the same keys with the same amounts.
pub fn quantities_match(
    deployed: &BTreeMap<String, Quantity>,
    required: &BTreeMap<String, Quantity>,
) -> bool {
    deployed.len() == required.len()
        && required.iter().all(|(name, quantity)| {
            deployed
                .get(name)
                .is_some_and(|d| quantity_matches(d, quantity))
        })
}
