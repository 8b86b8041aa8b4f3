//! Spending-limit alerts: fired per expense write, in the same
//! transaction, exactly when the sum first exceeds the threshold.

use api::store::{
    AlertScope, Money, MovementKind, NotificationKind, alert, movement,
    outbox, principal,
};
use test_helpers::{TEST_USER, money, spawn_app};

async fn setup(app: &test_helpers::TestApp) -> anyhow::Result<()> {
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("100000.00"),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn daily_alert_fires_at_the_crossing_write() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;
    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("10000.00"),
    )
    .await?;

    // 7000 spent: under the limit, nothing fires
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("7000.00"),
        "",
    )
    .await?;
    assert!(
        outbox::list_unprocessed(&app.pool, Some(TEST_USER))
            .await?
            .is_empty()
    );

    // +4000 crosses 10000: exactly one alert, with the structured payload
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("4000.00"),
        "",
    )
    .await?;
    let pending =
        outbox::list_unprocessed(&app.pool, Some(TEST_USER)).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, NotificationKind::Alert);
    let payload = pending[0].payload_json().expect("alert payload");
    assert_eq!(payload["scope"], "daily");
    assert_eq!(payload["threshold"], "10000.00");
    assert_eq!(payload["spent"], "11000.00");
    assert_eq!(payload["excess"], "1000.00");

    Ok(())
}

#[tokio::test]
async fn alerts_fire_per_write_not_debounced() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;
    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("100.00"),
    )
    .await?;

    for _ in 0..3 {
        movement::add_movement(
            &app.pool,
            &app.time_source,
            TEST_USER,
            MovementKind::Expense,
            "Comida",
            money("200.00"),
            "",
        )
        .await?;
    }
    let pending =
        outbox::list_unprocessed(&app.pool, Some(TEST_USER)).await?;
    assert_eq!(pending.len(), 3);

    Ok(())
}

#[tokio::test]
async fn savings_and_income_never_trip_alerts() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;
    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("1.00"),
    )
    .await?;

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Saving,
        "Ahorros",
        money("5000.00"),
        "",
    )
    .await?;
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Income,
        "Salario",
        money("5000.00"),
        "",
    )
    .await?;
    assert!(
        outbox::list_unprocessed(&app.pool, Some(TEST_USER))
            .await?
            .is_empty()
    );

    Ok(())
}

#[tokio::test]
async fn monthly_alert_spans_the_whole_month() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;
    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Monthly,
        money("500.00"),
    )
    .await?;

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("300.00"),
        "",
    )
    .await?;
    // a different day, same month
    app.time_source.advance(jiff::Span::new().days(2));
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("300.00"),
        "",
    )
    .await?;

    let pending =
        outbox::list_unprocessed(&app.pool, Some(TEST_USER)).await?;
    assert_eq!(pending.len(), 1);
    let payload = pending[0].payload_json().expect("alert payload");
    assert_eq!(payload["scope"], "monthly");
    assert_eq!(payload["spent"], "600.00");

    Ok(())
}

#[tokio::test]
async fn upsert_replaces_and_deactivate_silences() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;

    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("100.00"),
    )
    .await?;
    let replaced = alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("900.00"),
    )
    .await?;
    assert_eq!(replaced.threshold, money("900.00"));

    let active = alert::list_active_alerts(&app.pool, TEST_USER).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].threshold, money("900.00"));

    alert::deactivate_alert(&app.pool, replaced.id, TEST_USER).await?;
    assert!(alert::list_active_alerts(&app.pool, TEST_USER).await?.is_empty());

    // deactivated alerts never fire
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("5000.00"),
        "",
    )
    .await?;
    assert!(
        outbox::list_unprocessed(&app.pool, Some(TEST_USER))
            .await?
            .is_empty()
    );

    Ok(())
}

#[tokio::test]
async fn outbox_marks_processed() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;
    alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        money("1.00"),
    )
    .await?;
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("10.00"),
        "",
    )
    .await?;

    let pending =
        outbox::list_unprocessed(&app.pool, Some(TEST_USER)).await?;
    assert_eq!(pending.len(), 1);
    outbox::mark_processed(&app.pool, pending[0].id).await?;
    assert!(
        outbox::list_unprocessed(&app.pool, Some(TEST_USER))
            .await?
            .is_empty()
    );

    Ok(())
}

#[tokio::test]
async fn zero_threshold_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    setup(&app).await?;

    let result = alert::upsert_alert(
        &app.pool,
        &app.time_source,
        TEST_USER,
        AlertScope::Daily,
        Money::ZERO,
    )
    .await;
    assert!(matches!(result, Err(api::store::StoreError::InvalidAmount)));

    Ok(())
}
