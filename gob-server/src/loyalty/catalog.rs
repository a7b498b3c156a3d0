//! Reward Catalog Gate
//!
//! One source of truth for "is reward X redeemable right now". The plan limit
//! is a static lookup and greying is recomputed on every read — changing the
//! merchant's plan instantly changes which rewards are redeemable, with no
//! migration step. Both the display path and redemption creation call this
//! module so the two can never disagree.

use shared::models::{Plan, Reward, RewardView};

/// Maximum simultaneously redeemable rewards per plan. None = unlimited.
pub fn plan_reward_limit(plan: &Plan) -> Option<usize> {
    match plan {
        Plan::Starter => Some(3),
        Plan::Growth => Some(10),
        Plan::Pro => None,
    }
}

/// Reward ids split into redeemable and greyed sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardVisibility {
    pub redeemable: Vec<i64>,
    pub greyed: Vec<i64>,
}

/// Compute visibility for a merchant's active rewards.
///
/// Ordering: sort_order, then points_cost, then id — the first N within the
/// plan limit are redeemable, the remainder are greyed.
pub fn reward_visibility(plan: &Plan, rewards: &[Reward]) -> RewardVisibility {
    let mut ordered: Vec<&Reward> = rewards.iter().filter(|r| r.is_active).collect();
    ordered.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then(a.points_cost.cmp(&b.points_cost))
            .then(a.id.cmp(&b.id))
    });

    let cutoff = plan_reward_limit(plan).unwrap_or(ordered.len());
    let (active, greyed) = if cutoff >= ordered.len() {
        (ordered.as_slice(), &[][..])
    } else {
        ordered.split_at(cutoff)
    };
    RewardVisibility {
        redeemable: active.iter().map(|r| r.id).collect(),
        greyed: greyed.iter().map(|r| r.id).collect(),
    }
}

/// Whether a single reward is currently redeemable. Redemption creation
/// re-checks this at request time, not just at catalog display time.
pub fn is_redeemable(plan: &Plan, rewards: &[Reward], reward_id: i64) -> bool {
    reward_visibility(plan, rewards)
        .redeemable
        .contains(&reward_id)
}

/// Catalog display view: every active reward with its computed greying flag,
/// in display order.
pub fn catalog_view(plan: &Plan, rewards: Vec<Reward>) -> Vec<RewardView> {
    let visibility = reward_visibility(plan, &rewards);
    let mut views: Vec<RewardView> = rewards
        .into_iter()
        .map(|reward| {
            let redeemable = visibility.redeemable.contains(&reward.id);
            RewardView { reward, redeemable }
        })
        .collect();
    views.sort_by(|a, b| {
        a.reward
            .sort_order
            .cmp(&b.reward.sort_order)
            .then(a.reward.points_cost.cmp(&b.reward.points_cost))
            .then(a.reward.id.cmp(&b.reward.id))
    });
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::RewardType;

    fn reward(id: i64, sort_order: i64, points_cost: i64) -> Reward {
        Reward {
            id,
            merchant_id: 1,
            name: format!("r{id}"),
            description: None,
            points_cost,
            reward_type: RewardType::Traditional,
            usdc_amount: None,
            is_active: true,
            sort_order,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn starter_plan_greys_beyond_three() {
        let rewards = vec![
            reward(1, 0, 100),
            reward(2, 0, 200),
            reward(3, 1, 50),
            reward(4, 2, 10),
        ];
        let v = reward_visibility(&Plan::Starter, &rewards);
        assert_eq!(v.redeemable, vec![1, 2, 3]);
        assert_eq!(v.greyed, vec![4]);
    }

    #[test]
    fn ordering_is_sort_order_then_cost() {
        // Same sort_order → cheaper first
        let rewards = vec![reward(1, 0, 300), reward(2, 0, 100), reward(3, 0, 200)];
        let v = reward_visibility(&Plan::Starter, &rewards);
        assert_eq!(v.redeemable, vec![2, 3, 1]);
    }

    #[test]
    fn pro_plan_is_unlimited() {
        let rewards: Vec<Reward> = (1..=20).map(|i| reward(i, i, 100)).collect();
        let v = reward_visibility(&Plan::Pro, &rewards);
        assert_eq!(v.redeemable.len(), 20);
        assert!(v.greyed.is_empty());
    }

    #[test]
    fn plan_change_instantly_changes_visibility() {
        let rewards: Vec<Reward> = (1..=5).map(|i| reward(i, i, 100)).collect();
        assert!(!is_redeemable(&Plan::Starter, &rewards, 5));
        assert!(is_redeemable(&Plan::Growth, &rewards, 5));
    }

    #[test]
    fn inactive_rewards_never_redeemable() {
        let mut r = reward(1, 0, 100);
        r.is_active = false;
        let rewards = vec![r, reward(2, 1, 100)];
        let v = reward_visibility(&Plan::Starter, &rewards);
        assert_eq!(v.redeemable, vec![2]);
        assert!(!is_redeemable(&Plan::Starter, &rewards, 1));
    }

    #[test]
    fn catalog_view_flags_greyed_tail() {
        let rewards: Vec<Reward> = (1..=4).map(|i| reward(i, i, 100)).collect();
        let views = catalog_view(&Plan::Starter, rewards);
        assert_eq!(views.len(), 4);
        assert!(views[0..3].iter().all(|v| v.redeemable));
        assert!(!views[3].redeemable);
    }
}
