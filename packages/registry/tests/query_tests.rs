//! Integration tests for filtered, sorted, paginated listings and the
//! settlement analytics reads.

mod common;

use crate::common::{first_page, harness, settlement_input, settlement_input_with_steward};
use registry_core::common::{PageRequest, RegistryError};
use registry_core::domains::settlements::SettlementFilter;

// =============================================================================
// Paging
// =============================================================================

/// Page totals reflect the filtered set, not the page slice.
#[tokio::test]
async fn page_reports_totals_over_filtered_set() {
    let ctx = harness();

    for i in 0..5 {
        ctx.settlements
            .create(settlement_input(&format!("Town {i}"), i as f32, 0.0))
            .await
            .unwrap();
    }

    let page = ctx
        .settlements
        .page(
            &SettlementFilter::default(),
            &[],
            None,
            None,
            PageRequest {
                page: Some(1),
                size: Some(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.page, 1);
}

/// With no sort terms at all, results come back in ascending id order.
#[tokio::test]
async fn default_order_is_ascending_id() {
    let ctx = harness();

    let mut ids = Vec::new();
    for i in 0..4 {
        let created = ctx
            .settlements
            .create(settlement_input(&format!("Town {i}"), i as f32, 0.0))
            .await
            .unwrap();
        ids.push(created.id);
    }
    ids.sort();

    let page = ctx
        .settlements
        .page(
            &SettlementFilter::default(),
            &[],
            None,
            None,
            first_page(),
        )
        .await
        .unwrap();

    let got: Vec<_> = page.items.iter().map(|i| i.id).collect();
    assert_eq!(got, ids);
}

/// Filter and sort compose: only matching rows, in the requested order.
#[tokio::test]
async fn filter_and_sort_compose() {
    let ctx = harness();

    for (name, population) in [("Alpha", 100), ("Albany", 300), ("Beta", 200)] {
        let mut input = settlement_input(name, population as f32, 0.0);
        input.population = population;
        ctx.settlements.create(input).await.unwrap();
    }

    let filter = SettlementFilter {
        name_contains: Some("al".to_string()),
        ..Default::default()
    };
    let page = ctx
        .settlements
        .page(
            &filter,
            &["population,desc".to_string()],
            None,
            None,
            first_page(),
        )
        .await
        .unwrap();

    let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Albany", "Alpha"]);
}

/// Relation-path sort orders by the joined steward value.
#[tokio::test]
async fn sorts_by_steward_height_path() {
    let ctx = harness();

    ctx.settlements
        .create(settlement_input_with_steward("Tall", 1.0, 0.0, 2.0))
        .await
        .unwrap();
    ctx.settlements
        .create(settlement_input_with_steward("Short", 2.0, 0.0, 1.5))
        .await
        .unwrap();
    ctx.settlements
        .create(settlement_input("None", 3.0, 0.0))
        .await
        .unwrap();

    let page = ctx
        .settlements
        .page(
            &SettlementFilter::default(),
            &[],
            Some("stewardHeight"),
            Some("asc"),
            first_page(),
        )
        .await
        .unwrap();

    let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Short", "Tall", "None"]);
}

/// The strict single-key form rejects unknown fields.
#[tokio::test]
async fn single_key_sort_rejects_unknown_field() {
    let ctx = harness();

    let err = ctx
        .settlements
        .page(
            &SettlementFilter::default(),
            &[],
            Some("flavor"),
            None,
            first_page(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
}

/// Bad enum text in the filter names the allowed values.
#[tokio::test]
async fn filter_rejects_unknown_climate() {
    let ctx = harness();

    let filter = SettlementFilter {
        climate: Some("DESERT".to_string()),
        ..Default::default()
    };
    let err = ctx
        .settlements
        .page(&filter, &[], None, None, first_page())
        .await
        .unwrap_err();
    match err {
        RegistryError::InvalidFilter(message) => assert!(message.contains("RAIN_FOREST")),
        other => panic!("expected InvalidFilter, got {other:?}"),
    }
}

// =============================================================================
// Location listing
// =============================================================================

#[tokio::test]
async fn locations_page_sorts_by_coordinate() {
    let ctx = harness();

    for x in [3.0_f32, 1.0, 2.0] {
        ctx.locations
            .create(registry_core::domains::locations::models::LocationInput { x, y: 0.0 })
            .await
            .unwrap();
    }

    let page = ctx
        .locations
        .page(
            &registry_core::domains::locations::LocationFilter::default(),
            Some("x"),
            Some("desc"),
            first_page(),
        )
        .await
        .unwrap();

    let xs: Vec<_> = page.items.iter().map(|l| l.x).collect();
    assert_eq!(xs, vec![3.0, 2.0, 1.0]);
}

// =============================================================================
// Analytics
// =============================================================================

/// Average telephone code over set values; 0.0 with no data.
#[tokio::test]
async fn average_telephone_code() {
    let ctx = harness();

    assert_eq!(ctx.settlements.average_telephone_code().await.unwrap(), 0.0);

    let mut a = settlement_input("Alpha", 1.0, 0.0);
    a.telephone_code = Some(100);
    let mut b = settlement_input("Beta", 2.0, 0.0);
    b.telephone_code = Some(300);
    let mut c = settlement_input("Gamma", 3.0, 0.0);
    c.telephone_code = None;
    for input in [a, b, c] {
        ctx.settlements.create(input).await.unwrap();
    }

    assert_eq!(
        ctx.settlements.average_telephone_code().await.unwrap(),
        200.0
    );
}

#[tokio::test]
async fn name_prefix_search_and_distinct_elevations() {
    let ctx = harness();

    let mut a = settlement_input("Alpha", 1.0, 0.0);
    a.meters_above_sea_level = Some(300);
    let mut b = settlement_input("Albany", 2.0, 0.0);
    b.meters_above_sea_level = Some(100);
    let mut c = settlement_input("Beta", 3.0, 0.0);
    c.meters_above_sea_level = Some(300);
    for input in [a, b, c] {
        ctx.settlements.create(input).await.unwrap();
    }

    let hits = ctx.settlements.find_by_name_prefix("Al").await.unwrap();
    assert_eq!(hits.len(), 2);

    let elevations = ctx.settlements.distinct_elevations().await.unwrap();
    assert_eq!(elevations, vec![100, 300]);
}

/// Distance reads fail with NotFound when there is no usable data.
#[tokio::test]
async fn distance_reads() {
    let ctx = harness();

    assert!(matches!(
        ctx.settlements.distance_to_largest_area(0.0, 0.0).await,
        Err(RegistryError::NotFound { .. })
    ));

    let mut big = settlement_input("Big", 3.0, 4.0);
    big.area = 900;
    ctx.settlements.create(big).await.unwrap();
    let mut old = settlement_input("Old", 6.0, 8.0);
    old.establishment_date = chrono::NaiveDate::from_ymd_opt(1200, 1, 1);
    ctx.settlements.create(old).await.unwrap();

    let d = ctx
        .settlements
        .distance_to_largest_area(0.0, 0.0)
        .await
        .unwrap();
    assert!((d - 5.0).abs() < 1e-9);

    let d = ctx
        .settlements
        .distance_from_origin_to_oldest()
        .await
        .unwrap();
    assert!((d - 10.0).abs() < 1e-9);
}
