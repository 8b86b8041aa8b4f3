//! User-facing message rendering. Everything the principal reads is built
//! here, in Spanish, with the `❌` glyph prefixing retryable input errors
//! so the transport can restyle them.

use crate::store::debt::Debt;
use crate::store::movement::{DailyBalance, MonthSummary, Movement};
use crate::store::reminder::Reminder;
use crate::store::subscription::Subscription;
use crate::store::{AlertScope, Money, MovementKind, alert::Alert};

pub fn kind_label(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Income => "ingreso",
        MovementKind::Expense => "gasto",
        MovementKind::Saving => "ahorro",
    }
}

pub fn kind_label_plural(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Income => "ingresos",
        MovementKind::Expense => "gastos",
        MovementKind::Saving => "ahorros",
    }
}

pub fn kind_emoji(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Income => "💵",
        MovementKind::Expense => "💸",
        MovementKind::Saving => "💳",
    }
}

pub fn scope_label(scope: AlertScope) -> &'static str {
    match scope {
        AlertScope::Daily => "diario",
        AlertScope::Monthly => "mensual",
    }
}

pub fn welcome() -> String {
    "👋 **¡Bienvenido a tu bot de finanzas!**\n\n\
    Para empezar necesito tu balance inicial.\n\
    💰 ¿Con cuánto dinero cuentas hoy?\n\n\
    **Ejemplo:** 100000 o 0 si empiezas desde cero"
        .to_string()
}

pub fn setup_done(balance: Money) -> String {
    format!(
        "✅ **¡Configuración Completada!**\n\n\
        💰 Balance inicial: ${balance}\n\n\
        ✨ Ya puedes usar todas las funciones del bot.\n\
        Envía /start para ver el menú principal"
    )
}

pub fn main_menu(daily: &DailyBalance) -> String {
    format!(
        "🏠 **Menú Principal**\n\n\
        💰 Balance actual: ${}\n\n\
        📅 Hoy: 💵 ${} | 💸 ${} | 💳 ${}\n\n\
        Elige una opción:",
        daily.balance, daily.income, daily.expense, daily.saving
    )
}

pub fn balance(balance: Money) -> String {
    format!("💰 **Balance total: ${balance}**")
}

pub fn month_summary(summary: &MonthSummary) -> String {
    format!(
        "📊 **Resumen {:02}/{}**\n\n\
        📈 **Movimientos:**\n   \
        💵 Ingresos: ${}\n   \
        💸 Gastos: ${}\n   \
        💳 Ahorros: ${}\n\n\
        💰 **Balance final: ${}**\n\
        💡 Neto del mes: ${}",
        summary.month,
        summary.year,
        summary.income,
        summary.expense,
        summary.saving,
        summary.balance,
        summary.net()
    )
}

pub fn monthly_broadcast(summary: &MonthSummary) -> String {
    format!(
        "{}\n\n¡Nuevo mes, nuevas oportunidades! 💪",
        month_summary(summary)
    )
}

pub fn amount_prompt(kind: MovementKind, category: &str) -> String {
    format!(
        "{} **Nuevo {}**\n\n\
        🏷️ Categoría: {category}\n\n\
        💰 ¿Cuál es el monto?\n\
        **Ejemplo:** 50000 o 25.50",
        kind_emoji(kind),
        kind_label(kind)
    )
}

pub fn description_prompt(
    kind: MovementKind,
    category: &str,
    amount: Money,
) -> String {
    format!(
        "{} **{} de ${amount}**\n\n\
        🏷️ {category}\n\n\
        📝 Agrega una descripción, o escribe *no* para omitirla.",
        kind_emoji(kind),
        capitalize(kind_label(kind))
    )
}

pub fn movement_saved(
    kind: MovementKind,
    category: &str,
    amount: Money,
    description: &str,
    new_balance: Money,
) -> String {
    let mut text = format!(
        "✅ **{} registrado**\n\n\
        {} {category}: ${amount}\n",
        capitalize(kind_label(kind)),
        kind_emoji(kind)
    );
    if !description.is_empty() {
        text.push_str(&format!("📝 {description}\n"));
    }
    text.push_str(&format!("\n💰 Nuevo balance: ${new_balance}"));
    text
}

pub fn month_movements(
    movements: &[Movement],
    kind: MovementKind,
) -> String {
    if movements.is_empty() {
        return format!(
            "{} No hay {} registrados este mes.",
            kind_emoji(kind),
            kind_label_plural(kind)
        );
    }
    let total: Money = movements.iter().map(|m| m.amount).sum();
    let mut text = format!(
        "{} **{} del mes** (total ${total})\n\n",
        kind_emoji(kind),
        capitalize(kind_label_plural(kind))
    );
    for m in movements {
        text.push_str(&format!(
            "• {} — {} ${}",
            m.date.strftime("%d/%m"),
            m.category,
            m.amount
        ));
        if !m.description.is_empty() {
            text.push_str(&format!(" ({})", m.description));
        }
        text.push('\n');
    }
    text
}

pub fn subscription_name_prompt() -> String {
    "📄 **Nueva Suscripción**\n\n\
    ¿Cómo se llama? (Netflix, Spotify, ...)"
        .to_string()
}

pub fn subscription_amount_prompt(name: &str) -> String {
    format!(
        "📄 **{name}**\n\n\
        💰 ¿Cuánto cuesta al mes?\n\
        **Ejemplo:** 15000 o 9.99"
    )
}

pub fn subscription_category_prompt(name: &str, amount: Money) -> String {
    format!(
        "📄 **{name}** — ${amount}/mes\n\n\
        🏷️ Elige la categoría de gasto:"
    )
}

pub fn subscription_day_prompt(name: &str) -> String {
    format!(
        "📄 **{name}**\n\n\
        📅 ¿Qué día del mes se cobra? (1-31)\n\
        **Ejemplo:** 15 (para el día 15 de cada mes)"
    )
}

pub fn subscription_saved(subscription: &Subscription) -> String {
    format!(
        "✅ **Suscripción Registrada**\n\n\
        📄 {}\n\
        💰 ${}/mes\n\
        🏷️ {}\n\
        📅 Próximo cobro: {}",
        subscription.name,
        subscription.amount,
        subscription.category,
        subscription.next_charge_date.strftime("%d/%m/%Y")
    )
}

pub fn subscription_charged(subscription: &Subscription) -> String {
    format!(
        "📄 **Suscripción Cobrada**\n\n\
        💳 {}\n\
        💰 ${}\n\
        🏷️ Categoría: {}\n\n\
        Se ha descontado automáticamente de tu balance.",
        subscription.name, subscription.amount, subscription.category
    )
}

pub fn active_subscriptions(subscriptions: &[Subscription]) -> String {
    if subscriptions.is_empty() {
        return "📄 No tienes suscripciones activas.".to_string();
    }
    let total: Money = subscriptions.iter().map(|s| s.amount).sum();
    let mut text = format!(
        "📄 **Suscripciones activas** (${total}/mes)\n\n"
    );
    for s in subscriptions {
        text.push_str(&format!(
            "• {} — ${} el día {}\n",
            s.name, s.amount, s.charge_day
        ));
    }
    text
}

pub fn reminder_description_prompt() -> String {
    "🔔 **Nuevo Recordatorio**\n\n\
    📝 ¿Qué quieres recordar?"
        .to_string()
}

pub fn reminder_date_prompt() -> String {
    "📅 ¿Para qué fecha?\n\
    **Usa:** DD/MM/YYYY o DD/MM (año actual)\n\
    **Ejemplo:** 15/03/2024 o 15/03"
        .to_string()
}

pub fn reminder_saved(reminder: &Reminder) -> String {
    format!(
        "✅ **Recordatorio Registrado**\n\n\
        🔔 {}\n\
        📅 {}",
        reminder.description,
        reminder.due_date.strftime("%d/%m/%Y")
    )
}

pub fn reminder_due(reminder: &Reminder) -> String {
    let mut text = format!("🔔 **Recordatorio**\n\n{}", reminder.description);
    if let Some(amount) = reminder.amount {
        text.push_str(&format!("\n💰 Monto estimado: ${amount}"));
    }
    text
}

pub fn active_reminders(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "🔔 No tienes recordatorios activos.".to_string();
    }
    let mut text = "🔔 **Recordatorios activos**\n\n".to_string();
    for r in reminders {
        text.push_str(&format!(
            "• {} — {}\n",
            r.due_date.strftime("%d/%m/%Y"),
            r.description
        ));
    }
    text
}

pub fn debt_name_prompt() -> String {
    "💰 **Nueva Deuda**\n\n\
    ¿Con quién es la deuda?"
        .to_string()
}

pub fn debt_direction_prompt(counterparty: &str) -> String {
    format!("💰 **Deuda con: {counterparty}**\n\n¿Quién le debe a quién?")
}

pub fn debt_amount_prompt(counterparty: &str) -> String {
    format!(
        "💰 **Deuda con: {counterparty}**\n\n\
        ¿De cuánto es la deuda?\n\
        **Ejemplo:** 50000 o 25000.50"
    )
}

pub fn debt_saved(debt: &Debt) -> String {
    let direction_text = match debt.direction {
        crate::store::DebtDirection::OwedToPrincipal => "te debe",
        crate::store::DebtDirection::OwedByPrincipal => "le debes",
    };
    format!(
        "✅ **Deuda Registrada**\n\n\
        💰 **{}** {direction_text}\n\
        💵 ${}",
        debt.counterparty, debt.amount
    )
}

pub fn active_debts(debts: &[Debt]) -> String {
    if debts.is_empty() {
        return "💰 No tienes deudas registradas.".to_string();
    }
    let net: Money = debts.iter().map(|d| d.signed_amount()).sum();
    let mut text = "💰 **Deudas activas**\n\n".to_string();
    for d in debts {
        let signed = d.signed_amount();
        let arrow = if signed.0 >= 0 { "⬅️" } else { "➡️" };
        text.push_str(&format!("{arrow} {} — ${signed}\n", d.counterparty));
    }
    text.push_str(&format!("\n💡 Neto: ${net}"));
    text
}

pub fn alert_scope_prompt() -> String {
    "🚨 **Nueva Alerta de Gastos**\n\n\
    ¿Qué límite quieres vigilar?"
        .to_string()
}

pub fn alert_threshold_prompt(scope: AlertScope) -> String {
    format!(
        "🚨 **Alerta de gasto {}**\n\n\
        💰 ¿Cuál es el límite?\n\
        **Ejemplo:** 50000",
        scope_label(scope)
    )
}

pub fn alert_saved(alert: &Alert) -> String {
    format!(
        "✅ **Alerta Configurada**\n\n\
        🚨 Límite {}: ${}\n\n\
        Te avisaré cuando tus gastos lo superen.",
        scope_label(alert.scope),
        alert.threshold
    )
}

pub fn active_alerts(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "🚨 No tienes alertas configuradas.".to_string();
    }
    let mut text = "🚨 **Alertas activas**\n\n".to_string();
    for a in alerts {
        text.push_str(&format!(
            "• Límite {}: ${}\n",
            scope_label(a.scope),
            a.threshold
        ));
    }
    text
}

pub fn historical(summaries: &[MonthSummary]) -> String {
    if summaries.is_empty() {
        return "📊 Todavía no hay datos históricos.".to_string();
    }
    let mut text = "📊 **Histórico de los últimos meses**\n\n".to_string();
    for s in summaries {
        text.push_str(&format!(
            "**{:02}/{}** — 💵 ${} | 💸 ${} | 💳 ${}\n",
            s.month, s.year, s.income, s.expense, s.saving
        ));
    }
    text
}

pub fn change_balance_prompt() -> String {
    "⚙️ **Cambiar Balance Inicial**\n\n\
    💰 ¿Cuál es el nuevo balance inicial?\n\
    **Ejemplo:** 100000 o 0"
        .to_string()
}

pub fn balance_updated(balance: Money) -> String {
    format!(
        "✅ **Balance inicial actualizado**\n\n\
        💰 Nuevo balance inicial: ${balance}"
    )
}

pub fn config_menu() -> String {
    "⚙️ **Configuración**\n\nElige una opción:".to_string()
}

pub fn nothing_to_back_up() -> String {
    "📄 No hay movimientos para respaldar todavía.".to_string()
}

pub fn invalid_amount() -> String {
    "❌ Por favor ingresa un número válido mayor a 0.\n\
    **Ejemplo:** 50000 o 25.50"
        .to_string()
}

pub fn invalid_balance() -> String {
    "❌ Por favor ingresa un número válido.\n\
    **Ejemplo:** 100000 o 0 si empiezas desde cero"
        .to_string()
}

pub fn invalid_date() -> String {
    "❌ Formato de fecha inválido.\n\
    **Usa:** DD/MM/YYYY o DD/MM (año actual)\n\
    **Ejemplo:** 15/03/2024 o 15/03"
        .to_string()
}

pub fn invalid_day() -> String {
    "❌ Por favor ingresa un día válido entre 1 y 31.\n\
    **Ejemplo:** 15 (para el día 15 de cada mes)"
        .to_string()
}

pub fn invalid_name(max: usize) -> String {
    format!("❌ El nombre debe tener entre 2 y {max} caracteres.")
}

pub fn invalid_description(max: usize) -> String {
    format!("❌ La descripción debe tener entre 2 y {max} caracteres.")
}

pub fn use_the_buttons() -> String {
    "💡 Usa los botones de arriba para continuar, o /start para volver \
    al menú."
        .to_string()
}

pub fn no_active_flow() -> String {
    "💡 No entiendo ese mensaje.\n\n\
    Usa /start para ver el menú principal o /help para más información."
        .to_string()
}

pub fn help() -> String {
    "💡 **Guía rápida**\n\n\
    /start — menú principal\n\
    /balance — balance total\n\
    /expense <monto> [descripción] — gasto rápido\n\
    /income <monto> [descripción] — ingreso rápido\n\
    /summary — resumen del mes actual\n\
    /backup — exporta tus movimientos en CSV\n\
    /help — esta guía\n\n\
    Desde el menú puedes registrar ingresos, gastos y ahorros por \
    categoría, administrar suscripciones, recordatorios, deudas y \
    alertas de gasto."
        .to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
