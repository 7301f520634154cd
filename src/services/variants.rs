//! Resolution of the effective priced variant for a product.
//!
//! Cart lines without a pinned variant id track catalog changes (a new
//! default after a price update moves them automatically); lines with a
//! pinned id are stable and fail loudly when the pin no longer resolves.

use crate::entities::product_variant;
use crate::errors::ServiceError;
use serde::Serialize;
use uuid::Uuid;

/// How the effective variant was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The caller pinned this exact variant id.
    Pinned,
    /// The variant flagged both default and active.
    Default,
    /// No active default; cheapest active variant.
    CheapestActive,
    /// Last resort: nothing active, first variant regardless. Callers
    /// may want to surface a warning before quoting this price.
    Inactive,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedVariant {
    pub variant: product_variant::Model,
    pub source: ResolutionSource,
}

impl ResolvedVariant {
    pub fn may_be_stale(&self) -> bool {
        self.source == ResolutionSource::Inactive
    }
}

/// Resolves the single effective priced variant for a product.
///
/// A requested id must belong to the product and be active, otherwise
/// the resolver fails with `VariantUnavailable` rather than silently
/// substituting another variant.
pub fn resolve(
    product_id: Uuid,
    variants: &[product_variant::Model],
    requested: Option<Uuid>,
) -> Result<ResolvedVariant, ServiceError> {
    if let Some(requested_id) = requested {
        let variant = variants
            .iter()
            .find(|v| v.id == requested_id && v.product_id == product_id && v.is_active)
            .cloned()
            .ok_or_else(|| ServiceError::VariantUnavailable(requested_id.to_string()))?;
        return Ok(ResolvedVariant {
            variant,
            source: ResolutionSource::Pinned,
        });
    }

    let owned = || variants.iter().filter(|v| v.product_id == product_id);

    if let Some(variant) = owned().find(|v| v.is_default && v.is_active) {
        return Ok(ResolvedVariant {
            variant: variant.clone(),
            source: ResolutionSource::Default,
        });
    }

    if let Some(variant) = owned().filter(|v| v.is_active).min_by_key(|v| v.price) {
        return Ok(ResolvedVariant {
            variant: variant.clone(),
            source: ResolutionSource::CheapestActive,
        });
    }

    if let Some(variant) = owned().next() {
        return Ok(ResolvedVariant {
            variant: variant.clone(),
            source: ResolutionSource::Inactive,
        });
    }

    Err(ServiceError::PricingUnresolved(format!(
        "product {} has no variants",
        product_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn variant(
        product_id: Uuid,
        price: i64,
        is_default: bool,
        is_active: bool,
    ) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id,
            price: Decimal::from(price),
            original_price: None,
            weight: None,
            unit: None,
            image_url: None,
            is_default,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pinned_active_variant_wins() {
        let pid = Uuid::new_v4();
        let variants = vec![variant(pid, 100, true, true), variant(pid, 50, false, true)];
        let resolved = resolve(pid, &variants, Some(variants[1].id)).unwrap();
        assert_eq!(resolved.variant.id, variants[1].id);
        assert_eq!(resolved.source, ResolutionSource::Pinned);
    }

    #[test]
    fn pinned_inactive_variant_never_substitutes() {
        let pid = Uuid::new_v4();
        let variants = vec![variant(pid, 100, true, true), variant(pid, 50, false, false)];
        let err = resolve(pid, &variants, Some(variants[1].id)).unwrap_err();
        assert_matches!(err, ServiceError::VariantUnavailable(_));
    }

    #[test]
    fn pinned_id_from_another_product_is_unavailable() {
        let pid = Uuid::new_v4();
        let foreign = variant(Uuid::new_v4(), 10, true, true);
        let variants = vec![variant(pid, 100, true, true), foreign.clone()];
        let err = resolve(pid, &variants, Some(foreign.id)).unwrap_err();
        assert_matches!(err, ServiceError::VariantUnavailable(_));
    }

    #[test]
    fn default_and_active_preferred() {
        let pid = Uuid::new_v4();
        let variants = vec![
            variant(pid, 60, false, true),
            variant(pid, 80, true, true),
            variant(pid, 40, false, true),
        ];
        let resolved = resolve(pid, &variants, None).unwrap();
        assert_eq!(resolved.variant.id, variants[1].id);
        assert_eq!(resolved.source, ResolutionSource::Default);
    }

    #[test]
    fn inactive_default_falls_through_to_cheapest_active() {
        let pid = Uuid::new_v4();
        let variants = vec![
            variant(pid, 80, true, false),
            variant(pid, 60, false, true),
            variant(pid, 45, false, true),
        ];
        let resolved = resolve(pid, &variants, None).unwrap();
        assert_eq!(resolved.variant.id, variants[2].id);
        assert_eq!(resolved.source, ResolutionSource::CheapestActive);
    }

    #[test]
    fn last_resort_is_tagged_inactive() {
        let pid = Uuid::new_v4();
        let variants = vec![variant(pid, 80, false, false), variant(pid, 60, false, false)];
        let resolved = resolve(pid, &variants, None).unwrap();
        assert_eq!(resolved.variant.id, variants[0].id);
        assert_eq!(resolved.source, ResolutionSource::Inactive);
        assert!(resolved.may_be_stale());
    }

    #[test]
    fn no_variants_is_pricing_unresolved() {
        let pid = Uuid::new_v4();
        let err = resolve(pid, &[], None).unwrap_err();
        assert_matches!(err, ServiceError::PricingUnresolved(_));
    }
}
