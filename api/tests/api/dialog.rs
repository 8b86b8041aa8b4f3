//! The conversational state machine end to end: authorization, multi-step
//! flows, validation retries, and the fast-path commands.

use api::dialog::Inbound;
use api::store::{
    AlertScope, DebtDirection, MovementKind, alert, category, debt, movement,
    outbox, principal, reminder, subscription,
};
use test_helpers::{STRANGER, TEST_USER, money, spawn_app};

#[tokio::test]
async fn unauthorized_principals_leave_no_trace() -> anyhow::Result<()> {
    let app = spawn_app().await;

    // commands answer only "unauthorized"; text and callbacks are silent
    let reply = app
        .dispatcher
        .dispatch(
            STRANGER,
            Inbound::Command { name: "start".into(), args: String::new() },
        )
        .await
        .expect("command reply");
    assert_eq!(reply.text, "🚫 No autorizado");
    assert!(
        app.dispatcher
            .dispatch(STRANGER, Inbound::Text("1000".into()))
            .await
            .is_none()
    );
    assert!(
        app.dispatcher
            .dispatch(STRANGER, Inbound::Callback("balance_actual".into()))
            .await
            .is_none()
    );

    // nothing was written anywhere
    assert!(!principal::principal_exists(&app.pool, STRANGER).await?);
    let outbox_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_notifications")
            .fetch_one(&app.pool)
            .await?;
    assert_eq!(outbox_rows, 0);

    Ok(())
}

#[tokio::test]
async fn first_time_setup_flow() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let reply = app.send_command("start", "").await.expect("welcome");
    assert!(reply.text.contains("balance inicial"));

    // a bad amount keeps the step alive
    let retry = app.send_text("no sé").await.expect("retry");
    assert!(retry.text.starts_with('❌'));

    let done = app.send_text("100000").await.expect("done");
    assert!(done.text.contains("Configuración Completada"));
    assert!(principal::is_configured(&app.pool, TEST_USER).await?);
    assert_eq!(
        movement::current_balance(&app.pool, TEST_USER).await?,
        money("100000.00")
    );

    // /start now shows the main menu with today's figures
    let menu = app.send_command("start", "").await.expect("menu");
    assert!(menu.text.contains("Menú Principal"));
    assert!(menu.keyboard.is_some());

    Ok(())
}

#[tokio::test]
async fn guided_expense_flow_with_new_category() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("50000").await;

    // open the category picker and create a custom category
    let picker = app
        .send_callback("agregar_expense")
        .await
        .expect("category picker");
    let keyboard = picker.keyboard.expect("keyboard");
    assert!(keyboard.rows.iter().flatten().any(|b| {
        b.callback == "nueva_categoria_expense"
    }));

    app.send_callback("nueva_categoria_expense").await.expect("name prompt");
    let amount_prompt =
        app.send_text("Mascotas").await.expect("amount prompt");
    assert!(amount_prompt.text.contains("Mascotas"));

    // invalid amount retries, then a valid one moves to the description
    let retry = app.send_text("-12").await.expect("retry");
    assert!(retry.text.starts_with('❌'));
    app.send_text("1250.50").await.expect("description prompt");

    let done = app.send_text("croquetas").await.expect("saved");
    assert!(done.text.contains("Gasto registrado"));
    assert!(done.text.contains("48,749.50"));

    let movements = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
        None,
    )
    .await?;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].category, "Mascotas");
    assert_eq!(movements[0].amount, money("1250.50"));
    assert_eq!(movements[0].description, "croquetas");

    // the flow cleared its state
    assert!(app.states.get(TEST_USER).is_none());

    Ok(())
}

#[tokio::test]
async fn skip_keywords_leave_description_empty() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("1000").await;
    category::add_category(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Comida",
        MovementKind::Expense,
    )
    .await?;

    app.send_callback("select_cat_expense_Comida").await.expect("amount");
    app.send_text("25.50").await.expect("description prompt");
    app.send_text("omitir").await.expect("saved");

    let movements = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
        None,
    )
    .await?;
    assert_eq!(movements[0].description, "");

    Ok(())
}

#[tokio::test]
async fn fast_path_creates_fallback_category() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("10000").await;

    let reply = app
        .send_command("expense", "4000 almuerzo con amigos")
        .await
        .expect("saved");
    assert!(reply.text.contains("Gasto registrado"));

    let movements = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
        None,
    )
    .await?;
    assert_eq!(movements[0].category, "Otros");
    assert_eq!(movements[0].amount, money("4000.00"));
    assert_eq!(movements[0].description, "almuerzo con amigos");

    // /income works symmetrically and reuses the first active category
    category::add_category(
        &app.pool,
        &app.time_source,
        TEST_USER,
        "Salario",
        MovementKind::Income,
    )
    .await?;
    app.send_command("income", "2000").await.expect("saved");
    let incomes = movement::list_movements(
        &app.pool,
        &app.time_source,
        TEST_USER,
        None,
        None,
        Some(MovementKind::Income),
    )
    .await?;
    assert_eq!(incomes[0].category, "Salario");

    Ok(())
}

#[tokio::test]
async fn subscription_flow_end_to_end() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("50000").await;

    app.send_callback("agregar_suscripcion").await.expect("name prompt");
    app.send_text("Netflix").await.expect("amount prompt");
    let categories_reply =
        app.send_text("15000").await.expect("category keyboard");
    // with no expense categories, the defaults were seeded
    let keyboard = categories_reply.keyboard.expect("keyboard");
    assert!(keyboard.rows.iter().flatten().any(|b| {
        b.callback == "subscription_cat_Entretenimiento"
    }));

    app.send_callback("subscription_cat_Entretenimiento")
        .await
        .expect("day prompt");
    let bad_day = app.send_text("45").await.expect("retry");
    assert!(bad_day.text.starts_with('❌'));
    let done = app.send_text("10").await.expect("saved");
    assert!(done.text.contains("Suscripción Registrada"));

    let subscriptions =
        subscription::list_active_subscriptions(&app.pool, TEST_USER).await?;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].name, "Netflix");
    assert_eq!(subscriptions[0].charge_day, 10);
    // created on 2024-03-15 with day 10: first charge on April 10th
    assert_eq!(
        subscriptions[0].next_charge_date,
        "2024-04-10".parse()?
    );

    Ok(())
}

#[tokio::test]
async fn reminder_flow_parses_short_dates() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("0").await;

    app.send_callback("agregar_recordatorio").await.expect("prompt");
    app.send_text("Pagar tarjeta").await.expect("date prompt");
    let bad = app.send_text("2024-03-20").await.expect("retry");
    assert!(bad.text.starts_with('❌'));
    // DD/MM with the current year implied
    app.send_text("20/03").await.expect("saved");

    let reminders =
        reminder::list_active_reminders(&app.pool, TEST_USER).await?;
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].due_date, "2024-03-20".parse()?);

    Ok(())
}

#[tokio::test]
async fn debt_flow_keeps_magnitude_and_direction() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("0").await;

    app.send_callback("agregar_deuda").await.expect("name prompt");
    let directions = app.send_text("Juan").await.expect("direction keyboard");
    assert!(directions.keyboard.is_some());

    app.send_callback("debt_type_owed_by_principal")
        .await
        .expect("amount prompt");
    app.send_text("-25000").await.expect("saved");

    let debts = debt::list_active_debts(&app.pool, TEST_USER).await?;
    assert_eq!(debts.len(), 1);
    assert_eq!(debts[0].amount, money("25000.00"));
    assert_eq!(debts[0].direction, DebtDirection::OwedByPrincipal);
    assert_eq!(debts[0].signed_amount(), -money("25000.00"));

    debt::mark_debt_settled(&app.pool, debts[0].id, TEST_USER).await?;
    assert!(debt::list_active_debts(&app.pool, TEST_USER).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn alert_flow_then_alert_fires_on_overspend() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("100000").await;

    app.send_callback("agregar_alerta").await.expect("scope keyboard");
    app.send_callback("alert_type_daily").await.expect("threshold prompt");
    let done = app.send_text("10000").await.expect("saved");
    assert!(done.text.contains("Alerta Configurada"));

    let alerts = alert::list_active_alerts(&app.pool, TEST_USER).await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].scope, AlertScope::Daily);

    // overspending through the fast path lands an outbox alert
    app.send_command("expense", "12000 compras").await.expect("saved");
    let pending =
        outbox::list_unprocessed(&app.pool, Some(TEST_USER)).await?;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].message.contains("LÍMITE DIARIO SUPERADO"));

    Ok(())
}

#[tokio::test]
async fn back_to_menu_cancels_any_flow() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("0").await;

    app.send_callback("agregar_suscripcion").await.expect("prompt");
    assert!(app.states.get(TEST_USER).is_some());

    let menu = app.send_callback("back_to_menu").await.expect("menu");
    assert!(menu.text.contains("Menú Principal"));
    assert!(app.states.get(TEST_USER).is_none());

    // free text afterwards is just the help hint
    let hint = app.send_text("15000").await.expect("hint");
    assert!(hint.text.contains("No entiendo"));

    Ok(())
}

#[tokio::test]
async fn backup_command_attaches_csv_document() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("1000").await;

    // nothing to export yet
    let empty = app.send_command("backup", "").await.expect("notice");
    assert!(empty.text.contains("No hay movimientos"));
    assert!(empty.document.is_none());

    app.send_command("expense", "100 pan").await.expect("saved");
    let reply = app.send_command("backup", "").await.expect("document");
    let document = reply.document.expect("csv attachment");
    assert!(document.filename.starts_with("backup_finanzas_"));
    assert!(document.filename.ends_with(".csv"));
    let text = String::from_utf8(document.content)?;
    assert!(text.lines().count() >= 2);

    Ok(())
}

#[tokio::test]
async fn views_render_from_the_menu() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.configure_principal("5000").await;
    app.send_command("expense", "750 mercado").await.expect("saved");

    let balance = app.send_callback("balance_actual").await.expect("balance");
    assert!(balance.text.contains("4,250.00"));

    let summary = app.send_callback("resumen_mes").await.expect("summary");
    assert!(summary.text.contains("Resumen 03/2024"));
    assert!(summary.text.contains("750.00"));

    let list = app.send_callback("ver_expense_mes").await.expect("list");
    assert!(list.text.contains("mercado"));

    let history = app.send_callback("menu_history").await.expect("history");
    assert!(history.text.contains("03/2024"));

    Ok(())
}
