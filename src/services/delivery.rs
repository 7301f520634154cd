//! Geo-pricing: great-circle distance from the store, mapped through
//! configured fee bands.
//!
//! Pure and stateless; callers that cannot supply usable coordinates
//! fall back to the configured flat fee instead.

use crate::config::DeliveryConfig;
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(ServiceError::ValidationError(
                "coordinates must be finite numbers".into(),
            ));
        }
        if self.latitude.abs() > 90.0 || self.longitude.abs() > 180.0 {
            return Err(ServiceError::ValidationError(format!(
                "coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryQuote {
    /// Distance in kilometers, rounded to 2 decimal places.
    pub distance_km: f64,
    pub fee: Decimal,
}

fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Quotes the delivery fee for a destination.
///
/// Band upper bounds are inclusive (`distance <= max_km`); anything
/// beyond the last band pays `beyond_fee`.
pub fn quote(cfg: &DeliveryConfig, dest: Coordinates) -> Result<DeliveryQuote, ServiceError> {
    let store = Coordinates::new(cfg.store_latitude, cfg.store_longitude);
    store.validate()?;
    dest.validate()?;

    let distance_km = (haversine_km(store, dest) * 100.0).round() / 100.0;

    let fee = cfg
        .bands
        .iter()
        .find(|band| distance_km <= band.max_km)
        .map(|band| band.fee)
        .unwrap_or(cfg.beyond_fee);

    Ok(DeliveryQuote { distance_km, fee })
}

/// Small-cart surcharge policy: applied when the subtotal is under the
/// configured threshold. Unrelated to the distance banding.
pub fn surcharge_for(cfg: &DeliveryConfig, subtotal: Decimal) -> Option<Decimal> {
    if subtotal < cfg.small_cart_threshold {
        Some(cfg.small_cart_surcharge)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryBand;
    use rust_decimal_macros::dec;

    // Store pinned near Ahmedabad for realistic distances.
    fn test_config() -> DeliveryConfig {
        DeliveryConfig {
            store_latitude: 22.9987,
            store_longitude: 72.6012,
            ..Default::default()
        }
    }

    // Roughly 1 degree of latitude = 111.19 km at this radius.
    fn dest_at_km(cfg: &DeliveryConfig, km: f64) -> Coordinates {
        Coordinates::new(cfg.store_latitude + km / 111.19, cfg.store_longitude)
    }

    #[test]
    fn zero_fee_inside_smallest_band() {
        let cfg = test_config();
        for km in [0.0, 1.0, 2.5, 4.9] {
            let q = quote(&cfg, dest_at_km(&cfg, km)).unwrap();
            assert_eq!(q.fee, Decimal::ZERO, "fee at {} km", km);
        }
    }

    #[test]
    fn fee_is_monotone_across_bands() {
        let cfg = test_config();
        let mut last_fee = Decimal::MIN;
        for km in [1.0, 4.0, 6.0, 7.9, 9.0, 11.9, 13.0, 50.0] {
            let q = quote(&cfg, dest_at_km(&cfg, km)).unwrap();
            assert!(q.fee >= last_fee, "fee decreased at {} km", km);
            last_fee = q.fee;
        }
    }

    #[test]
    fn band_upper_bound_is_inclusive() {
        let cfg = DeliveryConfig {
            bands: vec![
                DeliveryBand { max_km: 5.0, fee: Decimal::ZERO },
                DeliveryBand { max_km: 8.0, fee: dec!(40) },
            ],
            beyond_fee: dec!(100),
            ..test_config()
        };
        // 5.00 km exactly stays in the free band.
        let q = quote(&cfg, dest_at_km(&cfg, 5.0)).unwrap();
        assert!((q.distance_km - 5.0).abs() < 0.01);
        assert_eq!(q.fee, Decimal::ZERO);
    }

    #[test]
    fn beyond_last_band_uses_beyond_fee() {
        let cfg = test_config();
        let q = quote(&cfg, dest_at_km(&cfg, 30.0)).unwrap();
        assert_eq!(q.fee, dec!(100));
    }

    #[test]
    fn distance_is_rounded_to_two_decimals() {
        let cfg = test_config();
        let q = quote(&cfg, dest_at_km(&cfg, 3.456789)).unwrap();
        assert_eq!(q.distance_km, (q.distance_km * 100.0).round() / 100.0);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let cfg = test_config();
        assert!(quote(&cfg, Coordinates::new(f64::NAN, 72.6)).is_err());
        assert!(quote(&cfg, Coordinates::new(22.9, f64::INFINITY)).is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let cfg = test_config();
        assert!(quote(&cfg, Coordinates::new(91.0, 0.0)).is_err());
        assert!(quote(&cfg, Coordinates::new(0.0, -181.0)).is_err());
    }

    #[test]
    fn quote_is_deterministic() {
        let cfg = test_config();
        let dest = dest_at_km(&cfg, 6.3);
        let a = quote(&cfg, dest).unwrap();
        let b = quote(&cfg, dest).unwrap();
        assert_eq!(a.distance_km, b.distance_km);
        assert_eq!(a.fee, b.fee);
    }

    #[test]
    fn surcharge_applies_only_below_threshold() {
        let cfg = test_config();
        assert_eq!(surcharge_for(&cfg, dec!(200)), Some(dec!(40)));
        assert_eq!(surcharge_for(&cfg, dec!(349.99)), Some(dec!(40)));
        assert_eq!(surcharge_for(&cfg, dec!(350)), None);
        assert_eq!(surcharge_for(&cfg, dec!(500)), None);
    }
}
