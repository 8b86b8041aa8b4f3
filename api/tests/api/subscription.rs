//! Subscription charge dates and the charge transaction.

use api::store::{Money, category, movement, principal, subscription};
use test_helpers::{TEST_USER, money, spawn_app};

#[tokio::test]
async fn netflix_scenario_charges_and_advances() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("100000.00"),
    )
    .await?;
    category::add_category(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Entretenimiento",
        api::store::MovementKind::Expense,
    )
    .await?;

    // created on 2024-03-12 with charge day 10: first charge next month
    app.time_source.set("2024-03-12T10:00:00Z".parse()?);
    let subscription = subscription::add_subscription(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Netflix",
        money("15000.00"),
        "Entretenimiento",
        10,
    )
    .await?;
    assert_eq!(subscription.next_charge_date, "2024-04-10".parse()?);

    // not due yet
    assert!(
        subscription::list_due_subscriptions(&app.pool, &app.time_source)
            .await?
            .is_empty()
    );

    // on 2024-04-10 it is due; processing inserts the expense and
    // advances one month
    app.time_source.set("2024-04-10T09:00:00Z".parse()?);
    let due =
        subscription::list_due_subscriptions(&app.pool, &app.time_source)
            .await?;
    assert_eq!(due.len(), 1);

    let processed = subscription::process_subscription(
        &app.pool,
        &app.time_source,
        subscription.id,
    )
    .await?
    .expect("active subscription");
    assert_eq!(processed.next_charge_date, "2024-05-10".parse()?);

    let movements = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Some(4),
        Some(2024),
        None,
    )
    .await?;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].amount, money("15000.00"));
    assert_eq!(movements[0].category, "Entretenimiento");
    assert_eq!(movements[0].description, "Subscription: Netflix");

    // the charge is reflected in summary and balance
    let summary = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Some(4),
        Some(2024),
    )
    .await?;
    assert_eq!(summary.expense, money("15000.00"));
    assert_eq!(
        movement::current_balance(&app.pool, TEST_USER).await?,
        money("85000.00")
    );

    Ok(())
}

#[tokio::test]
async fn day_31_clamps_into_february() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("100000.00"),
    )
    .await?;

    // initialized in January with charge day 31
    app.time_source.set("2024-01-15T10:00:00Z".parse()?);
    let subscription = subscription::add_subscription(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Gimnasio",
        money("30000.00"),
        "Servicios",
        31,
    )
    .await?;
    assert_eq!(subscription.next_charge_date, "2024-01-31".parse()?);

    // processed on the 31st: next charge is the last day of February
    app.time_source.set("2024-01-31T10:00:00Z".parse()?);
    let processed = subscription::process_subscription(
        &app.pool,
        &app.time_source,
        subscription.id,
    )
    .await?
    .expect("active subscription");
    assert_eq!(processed.next_charge_date, "2024-02-29".parse()?);

    Ok(())
}

#[tokio::test]
async fn deactivated_subscriptions_do_not_charge() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("1000.00"),
    )
    .await?;

    let subscription = subscription::add_subscription(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Spotify",
        money("10.00"),
        "Servicios",
        20,
    )
    .await?;
    subscription::deactivate_subscription(
        &app.pool,
        subscription.id,
        TEST_USER,
    )
    .await?;

    app.time_source.advance(jiff::Span::new().days(40));
    assert!(
        subscription::list_due_subscriptions(&app.pool, &app.time_source)
            .await?
            .is_empty()
    );
    assert!(
        subscription::process_subscription(
            &app.pool,
            &app.time_source,
            subscription.id,
        )
        .await?
        .is_none()
    );
    assert_eq!(
        movement::current_balance(&app.pool, TEST_USER).await?,
        money("1000.00")
    );

    Ok(())
}

#[tokio::test]
async fn invalid_charge_day_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    for day in [0, 32] {
        let result = subscription::add_subscription(
            &app.pool,
            &app.time_source,
            TEST_USER,
            "Mal",
            money("10.00"),
            "Servicios",
            day,
        )
        .await;
        assert!(matches!(
            result,
            Err(api::store::StoreError::InvalidChargeDay)
        ));
    }

    Ok(())
}
