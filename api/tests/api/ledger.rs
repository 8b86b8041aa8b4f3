//! Ledger invariants: the balance identity, derived-cache coherence, and
//! movement period agreement.

use api::store::movement::{self, Movement};
use api::store::{Money, MovementKind, category, principal};
use test_helpers::{TEST_USER, money, spawn_app};

#[tokio::test]
async fn fresh_principal_has_initial_balance_and_zero_summary(
) -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("100000.00"),
    )
    .await?;

    let balance = movement::current_balance(&app.pool, TEST_USER).await?;
    assert_eq!(balance, money("100000.00"));

    let summary = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
    )
    .await?;
    assert_eq!(summary.income, Money::ZERO);
    assert_eq!(summary.expense, Money::ZERO);
    assert_eq!(summary.saving, Money::ZERO);
    assert_eq!(summary.balance, money("100000.00"));

    Ok(())
}

#[tokio::test]
async fn expense_moves_balance_and_summary() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("100000.00"),
    )
    .await?;

    let movement = movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("5000.00"),
        "almuerzo",
    )
    .await?;
    assert_eq!(movement.date, app.time_source.today());

    let balance = movement::current_balance(&app.pool, TEST_USER).await?;
    assert_eq!(balance, money("95000.00"));

    let summary = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Some(3),
        Some(2024),
    )
    .await?;
    assert_eq!(summary.expense, money("5000.00"));
    assert_eq!(summary.balance, money("95000.00"));

    Ok(())
}

#[tokio::test]
async fn balance_identity_over_mixed_kinds() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("1000.00"),
    )
    .await?;

    let writes = [
        (MovementKind::Income, "Salario", "2500.00"),
        (MovementKind::Expense, "Comida", "300.50"),
        (MovementKind::Saving, "Ahorros", "400.00"),
        (MovementKind::Expense, "Transporte", "99.99"),
        (MovementKind::Income, "Freelance", "150.01"),
    ];
    for (kind, cat, amount) in writes {
        movement::add_movement(
            &app.pool,
            &app.time_source,
            TEST_USER,
            kind,
            cat,
            money(amount),
            "",
        )
        .await?;
    }

    // 1000 + 2500 + 150.01 − 300.50 − 99.99 − 400
    let balance = movement::current_balance(&app.pool, TEST_USER).await?;
    assert_eq!(balance, money("2849.52"));

    // savings reduce the balance but are not expenses
    let daily = movement::daily_balance(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
    )
    .await?;
    assert_eq!(daily.income, money("2650.01"));
    assert_eq!(daily.expense, money("400.49"));
    assert_eq!(daily.saving, money("400.00"));
    assert_eq!(daily.balance, balance);

    Ok(())
}

#[tokio::test]
async fn monthly_cache_stays_coherent_across_writes() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("100.00"),
        "",
    )
    .await?;
    // reading materializes the cache row
    let first = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
    )
    .await?;
    assert_eq!(first.expense, money("100.00"));

    // a second write must invalidate it; the next read re-aggregates
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("50.00"),
        "",
    )
    .await?;
    let second = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
    )
    .await?;
    assert_eq!(second.expense, money("150.00"));

    // the cache row equals re-aggregation over the movements
    let cached: (Money, Money, Money) = sqlx::query_as(
        "SELECT income, expense, saving FROM monthly_summaries
        WHERE user_id = $1 AND month = 3 AND year = 2024",
    )
    .bind(TEST_USER)
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(cached.1, money("150.00"));

    Ok(())
}

#[tokio::test]
async fn movement_period_agrees_with_date() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Income,
        "Salario",
        money("10.00"),
        "",
    )
    .await?;
    app.time_source.advance(jiff::Span::new().days(20));
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Income,
        "Salario",
        money("10.00"),
        "",
    )
    .await?;

    let rows = sqlx::query_as::<_, Movement>(
        "SELECT * FROM movements WHERE user_id = $1",
    )
    .bind(TEST_USER)
    .fetch_all(&app.pool)
    .await?;
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.month, row.date.month() as i32);
        assert_eq!(row.year, row.date.year() as i32);
    }

    Ok(())
}

#[tokio::test]
async fn delete_movement_restores_balance_and_caches() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        money("500.00"),
    )
    .await?;

    let movement_row = movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("200.00"),
        "",
    )
    .await?;
    movement::delete_movement(&app.pool, movement_row.id, TEST_USER).await?;

    let balance = movement::current_balance(&app.pool, TEST_USER).await?;
    assert_eq!(balance, money("500.00"));
    let summary = movement::month_summary(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
    )
    .await?;
    assert_eq!(summary.expense, Money::ZERO);
    let daily = movement::daily_balance(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
    )
    .await?;
    assert_eq!(daily.expense, Money::ZERO);

    // deleting it again reports not-found
    let result =
        movement::delete_movement(&app.pool, movement_row.id, TEST_USER)
            .await;
    assert!(matches!(
        result,
        Err(api::store::StoreError::MovementNotFound)
    ));

    Ok(())
}

#[tokio::test]
async fn out_of_range_amounts_do_not_mutate_state() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    let result = movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        Money::ZERO,
        "",
    )
    .await;
    assert!(matches!(result, Err(api::store::StoreError::InvalidAmount)));

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM movements")
            .fetch_one(&app.pool)
            .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn long_descriptions_are_truncated_with_ellipsis() -> anyhow::Result<()>
{
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    let movement_row = movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("10.00"),
        &"x".repeat(600),
    )
    .await?;
    assert_eq!(movement_row.description.chars().count(), 503);
    assert!(movement_row.description.ends_with("..."));

    Ok(())
}

#[tokio::test]
async fn categories_upsert_and_totals() -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    // first insert true, duplicate false
    assert!(
        category::add_category(
            &app.pool,
            &app.time_source,
            TEST_USER,
            "Comida",
            MovementKind::Expense,
        )
        .await?
    );
    assert!(
        !category::add_category(
            &app.pool,
            &app.time_source,
            TEST_USER,
            "Comida",
            MovementKind::Expense,
        )
        .await?
    );
    // same name under another kind is a distinct category
    assert!(
        category::add_category(
            &app.pool,
            &app.time_source,
            TEST_USER,
            "Comida",
            MovementKind::Income,
        )
        .await?
    );
    category::add_category(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Transporte",
        MovementKind::Expense,
    )
    .await?;

    let names =
        category::list_categories(&app.pool, TEST_USER, MovementKind::Expense)
            .await?;
    assert_eq!(names, vec!["Comida".to_string(), "Transporte".to_string()]);

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Transporte",
        money("80.00"),
        "",
    )
    .await?;
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("20.00"),
        "",
    )
    .await?;

    let totals = category::list_categories_with_totals(
        &app.pool,
        TEST_USER,
        MovementKind::Expense,
        3,
        2024,
    )
    .await?;
    assert_eq!(totals[0].name, "Transporte");
    assert_eq!(totals[0].total, money("80.00"));
    assert_eq!(totals[1].name, "Comida");

    // deactivated categories drop out of listings
    category::deactivate_category(
        &app.pool,
        TEST_USER,
        "Comida",
        MovementKind::Expense,
    )
    .await?;
    let names =
        category::list_categories(&app.pool, TEST_USER, MovementKind::Expense)
            .await?;
    assert_eq!(names, vec!["Transporte".to_string()]);

    Ok(())
}

#[tokio::test]
async fn list_movements_defaults_to_current_month_newest_first(
) -> anyhow::Result<()> {
    let app = spawn_app().await;
    principal::create_principal(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Money::ZERO,
    )
    .await?;

    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("1.00"),
        "first",
    )
    .await?;
    app.time_source.advance(jiff::Span::new().days(1));
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("2.00"),
        "second",
    )
    .await?;
    // next month: not listed by default
    app.time_source.advance(jiff::Span::new().days(30));
    movement::add_movement(
        &app.pool,
        &app.time_source,
        TEST_USER,
        MovementKind::Expense,
        "Comida",
        money("3.00"),
        "april",
    )
    .await?;

    let march = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        Some(3),
        Some(2024),
        None,
    )
    .await?;
    assert_eq!(march.len(), 2);
    assert_eq!(march[0].description, "second");
    assert_eq!(march[1].description, "first");

    let current = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
        None,
    )
    .await?;
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].description, "april");

    Ok(())
}
