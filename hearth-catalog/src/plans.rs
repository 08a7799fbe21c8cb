use hearth_core::account::SubscriptionPlan;

/// Maximum concurrent listings per plan. `None` means unlimited.
pub fn listing_limit(plan: SubscriptionPlan) -> Option<u64> {
    match plan {
        SubscriptionPlan::Base => Some(4),
        SubscriptionPlan::Gold => Some(10),
        SubscriptionPlan::Vip => None,
    }
}

/// Upgrade price in cents, charged as a subscription payment.
pub fn plan_price_cents(plan: SubscriptionPlan) -> i64 {
    match plan {
        SubscriptionPlan::Base => 0,
        SubscriptionPlan::Gold => 2_900,
        SubscriptionPlan::Vip => 9_900,
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("listing limit reached for the {plan} plan ({limit} listings)")]
    LimitReached { plan: &'static str, limit: u64 },
}

/// Check whether an agent with `current_listings` live listings may add one
/// more under `plan`.
pub fn ensure_can_list(plan: SubscriptionPlan, current_listings: u64) -> Result<(), QuotaError> {
    match listing_limit(plan) {
        Some(limit) if current_listings >= limit => Err(QuotaError::LimitReached {
            plan: plan.as_str(),
            limit,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_plan_limit() {
        assert!(ensure_can_list(SubscriptionPlan::Base, 3).is_ok());
        assert_eq!(
            ensure_can_list(SubscriptionPlan::Base, 4),
            Err(QuotaError::LimitReached { plan: "base", limit: 4 })
        );
    }

    #[test]
    fn test_gold_plan_limit() {
        assert!(ensure_can_list(SubscriptionPlan::Gold, 9).is_ok());
        assert!(ensure_can_list(SubscriptionPlan::Gold, 10).is_err());
    }

    #[test]
    fn test_vip_is_unlimited() {
        assert!(ensure_can_list(SubscriptionPlan::Vip, 10_000).is_ok());
    }
}
