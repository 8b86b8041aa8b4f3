//! Inline keyboard builders. Callback data is namespaced
//! (`menu_*`, `agregar_*`, `ver_*`, `select_cat_<kind>_<name>`, ...); the
//! dispatcher is authoritative over what each string means in context.

use super::{Button, Keyboard};
use crate::store::{DebtDirection, MovementKind};

fn back_row() -> Vec<Button> {
    vec![Button::new("🏠 Menú Principal", "back_to_menu")]
}

pub fn main_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![
                Button::new("💰 Balance", "balance_actual"),
                Button::new("📊 Resumen", "resumen_mes"),
            ],
            vec![
                Button::new("💵 Ingresos", "menu_income"),
                Button::new("💸 Gastos", "menu_expense"),
                Button::new("💳 Ahorros", "menu_saving"),
            ],
            vec![
                Button::new("📄 Suscripciones", "menu_subscriptions"),
                Button::new("🔔 Recordatorios", "menu_reminders"),
            ],
            vec![
                Button::new("💰 Deudas", "menu_debts"),
                Button::new("🚨 Alertas", "menu_alerts"),
            ],
            vec![
                Button::new("📊 Histórico", "menu_history"),
                Button::new("⚙️ Configurar", "menu_settings"),
            ],
        ],
    }
}

pub fn back_to_menu() -> Keyboard {
    Keyboard { rows: vec![back_row()] }
}

pub fn movement_menu(kind: MovementKind) -> Keyboard {
    let label = super::format::kind_label(kind);
    Keyboard {
        rows: vec![
            vec![Button::new(
                format!("➕ Agregar {label}"),
                format!("agregar_{}", kind.as_str()),
            )],
            vec![Button::new(
                format!("📋 Ver {label}s del mes"),
                format!("ver_{}_mes", kind.as_str()),
            )],
            back_row(),
        ],
    }
}

/// Category picker for a new movement: one button per active category,
/// plus the escape hatch into the new-category step.
pub fn categories(kind: MovementKind, names: &[String]) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = Vec::new();
    for pair in names.chunks(2) {
        rows.push(
            pair.iter()
                .map(|name| {
                    Button::new(
                        name.clone(),
                        format!("select_cat_{}_{name}", kind.as_str()),
                    )
                })
                .collect(),
        );
    }
    rows.push(vec![Button::new(
        "✏️ Nueva categoría",
        format!("nueva_categoria_{}", kind.as_str()),
    )]);
    rows.push(back_row());
    Keyboard { rows }
}

pub fn subscriptions_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new("➕ Nueva Suscripción", "agregar_suscripcion")],
            vec![Button::new("📋 Ver Suscripciones", "ver_suscripciones")],
            back_row(),
        ],
    }
}

pub fn subscription_categories(names: &[String]) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = names
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|name| {
                    Button::new(name.clone(), format!("subscription_cat_{name}"))
                })
                .collect()
        })
        .collect();
    rows.push(back_row());
    Keyboard { rows }
}

pub fn reminders_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new("➕ Nuevo Recordatorio", "agregar_recordatorio")],
            vec![Button::new("📋 Ver Recordatorios", "ver_recordatorios")],
            back_row(),
        ],
    }
}

pub fn debts_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new("➕ Nueva Deuda", "agregar_deuda")],
            vec![Button::new("📋 Ver Deudas", "ver_deudas")],
            back_row(),
        ],
    }
}

pub fn debt_directions() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new(
                "⬅️ Me deben",
                format!("debt_type_{}", direction_str(DebtDirection::OwedToPrincipal)),
            )],
            vec![Button::new(
                "➡️ Yo debo",
                format!("debt_type_{}", direction_str(DebtDirection::OwedByPrincipal)),
            )],
            back_row(),
        ],
    }
}

pub fn alerts_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new("➕ Nueva Alerta", "agregar_alerta")],
            vec![Button::new("📋 Ver Alertas", "ver_alertas")],
            back_row(),
        ],
    }
}

pub fn alert_scopes() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new("📅 Límite diario", "alert_type_daily")],
            vec![Button::new("📊 Límite mensual", "alert_type_monthly")],
            back_row(),
        ],
    }
}

pub fn settings_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new(
                "💰 Cambiar Balance Inicial",
                "config_balance",
            )],
            back_row(),
        ],
    }
}

/// Shown after a movement commits: repeat the flow or go home.
pub fn movement_saved(kind: MovementKind) -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::new(
                format!("➕ Otro {}", super::format::kind_label(kind)),
                format!("agregar_{}", kind.as_str()),
            )],
            back_row(),
        ],
    }
}

fn direction_str(direction: DebtDirection) -> &'static str {
    match direction {
        DebtDirection::OwedToPrincipal => "owed_to_principal",
        DebtDirection::OwedByPrincipal => "owed_by_principal",
    }
}
