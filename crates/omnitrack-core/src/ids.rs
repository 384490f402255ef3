//! Deterministic delivery id derivation.

use crate::platform::Platform;

/// Derive the globally unique delivery id for `(platform, external id)`.
///
/// Format: `"<prefix>_<external_id>"`, with `"_shipment_<sub_id>"` appended
/// for multi-shipment orders (Amazon splits one order across shipments).
/// Pure and stable: the same inputs always produce the same id, so refetches
/// and webhook updates converge on one record.
#[must_use]
pub fn derive_delivery_id(platform: Platform, external_id: &str, sub_id: Option<&str>) -> String {
    match sub_id {
        Some(sub) => format!("{}_{}_shipment_{}", platform.id_prefix(), external_id, sub),
        None => format!("{}_{}", platform.id_prefix(), external_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_stable() {
        let a = derive_delivery_id(Platform::Doordash, "8842", None);
        let b = derive_delivery_id(Platform::Doordash, "8842", None);
        assert_eq!(a, b);
        assert_eq!(a, "dd_8842");
    }

    #[test]
    fn shipment_sub_id_is_appended() {
        let id = derive_delivery_id(Platform::Amazon, "114-552", Some("2"));
        assert_eq!(id, "am_114-552_shipment_2");
    }

    #[test]
    fn different_platforms_never_collide() {
        let a = derive_delivery_id(Platform::Instacart, "77", None);
        let b = derive_delivery_id(Platform::Costco, "77", None);
        assert_ne!(a, b);
    }
}
