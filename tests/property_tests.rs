/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use consorcio_api::cache::cache_key;
use consorcio_api::models::{paginate, Contract, ContractStatus, Pagination, Plan};
use proptest::prelude::*;

fn plan_with(installments: u32) -> Plan {
    Plan {
        id: 1,
        name: "any".to_string(),
        credit_value: 1000.0,
        installments,
        admin_fee_percent: 10.0,
    }
}

fn contract_with(paid: u32) -> Contract {
    Contract {
        id: 1,
        person_id: 1,
        plan_id: 1,
        contracted_at: "2024-01-01".to_string(),
        status: ContractStatus::Active,
        paid_installments: paid,
    }
}

proptest! {
    #[test]
    fn progress_is_always_between_zero_and_hundred(
        paid in 0u32..10_000,
        installments in 1u32..1_000
    ) {
        let pct = contract_with(paid).progress_percent(&plan_with(installments));
        prop_assert!(pct >= 0.0);
        prop_assert!(pct <= 100.0);
    }

    #[test]
    fn progress_is_monotonic_in_paid_installments(
        paid in 0u32..500,
        installments in 1u32..1_000
    ) {
        let plan = plan_with(installments);
        let lower = contract_with(paid).progress_percent(&plan);
        let higher = contract_with(paid + 1).progress_percent(&plan);
        prop_assert!(higher >= lower);
    }
}

proptest! {
    #[test]
    fn paginate_never_exceeds_limit(
        total in 0usize..200,
        limit in 0usize..50,
        offset in 0usize..300
    ) {
        let items: Vec<usize> = (0..total).collect();
        let page = paginate(&items, Pagination { limit: Some(limit), offset: Some(offset) });
        prop_assert!(page.nodes.len() <= limit);
        prop_assert_eq!(page.page_info.total_count, total);
    }

    #[test]
    fn paginate_has_more_is_consistent(
        total in 0usize..200,
        limit in 1usize..50,
        offset in 0usize..300
    ) {
        let items: Vec<usize> = (0..total).collect();
        let page = paginate(&items, Pagination { limit: Some(limit), offset: Some(offset) });
        // has_more is true exactly when another non-empty page exists.
        let remaining = total.saturating_sub(offset + limit);
        prop_assert_eq!(page.page_info.has_more, remaining > 0);
    }

    #[test]
    fn paginate_nodes_match_the_window(
        total in 0usize..200,
        limit in 1usize..50,
        offset in 0usize..300
    ) {
        let items: Vec<usize> = (0..total).collect();
        let page = paginate(&items, Pagination { limit: Some(limit), offset: Some(offset) });
        let expected: Vec<usize> = (offset..total.min(offset + limit)).collect();
        prop_assert_eq!(page.nodes, expected);
    }
}

proptest! {
    #[test]
    fn cache_key_is_deterministic(op in "[a-z]{1,12}", limit in 0usize..100, admin in any::<bool>()) {
        let args = serde_json::json!({ "limit": limit });
        prop_assert_eq!(cache_key(&op, &args, admin), cache_key(&op, &args, admin));
    }

    #[test]
    fn cache_key_separates_privilege_for_any_args(op in "[a-z]{1,12}", limit in 0usize..100) {
        let args = serde_json::json!({ "limit": limit });
        prop_assert_ne!(cache_key(&op, &args, true), cache_key(&op, &args, false));
    }
}
