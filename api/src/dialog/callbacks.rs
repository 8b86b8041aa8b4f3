//! Inline-button callback handling. Each namespaced callback either
//! renders a view or advances a multi-step flow; an unrecognized callback
//! falls back to the main menu.

use std::str::FromStr;

use super::{DialogStep, Reply, format, keyboard};
use crate::store::{
    AlertScope, DebtDirection, MovementKind, StoreError, UserId, alert,
    category, debt, movement, reminder, subscription,
};

impl super::Dispatcher {
    pub(super) async fn handle_callback(
        &self,
        user_id: UserId,
        data: &str,
    ) -> Result<Reply, StoreError> {
        if data == "back_to_menu" {
            self.states.clear(user_id);
            return self.main_menu_reply(user_id).await;
        }
        if data == "balance_actual" {
            let balance =
                movement::current_balance(&self.pool, user_id).await?;
            return Ok(Reply::with_keyboard(
                format::balance(balance),
                keyboard::back_to_menu(),
            ));
        }
        if data == "resumen_mes" {
            let summary = movement::month_summary(
                &self.pool,
                &self.time_source,
                user_id,
                None,
                None,
            )
            .await?;
            return Ok(Reply::with_keyboard(
                format::month_summary(&summary),
                keyboard::back_to_menu(),
            ));
        }

        if let Some(rest) = data.strip_prefix("menu_") {
            return self.show_menu(user_id, rest).await;
        }
        if let Some(rest) = data.strip_prefix("select_cat_") {
            return self.select_category(user_id, rest).await;
        }
        if let Some(kind) = data.strip_prefix("nueva_categoria_") {
            return self.start_new_category(user_id, kind);
        }
        if let Some(rest) = data.strip_prefix("ver_") {
            return self.show_view(user_id, rest).await;
        }
        if let Some(name) = data.strip_prefix("subscription_cat_") {
            return self.select_subscription_category(user_id, name);
        }
        if let Some(direction) = data.strip_prefix("debt_type_") {
            return self.select_debt_direction(user_id, direction);
        }
        if let Some(scope) = data.strip_prefix("alert_type_") {
            return self.select_alert_scope(user_id, scope);
        }

        match data {
            "agregar_income" | "agregar_expense" | "agregar_saving" => {
                let kind = data
                    .strip_prefix("agregar_")
                    .and_then(|k| MovementKind::from_str(k).ok())
                    .expect("matched above");
                self.choose_category_reply(user_id, kind).await
            }
            "agregar_suscripcion" => {
                self.touch(user_id, DialogStep::SubscriptionName);
                Ok(Reply::text(format::subscription_name_prompt()))
            }
            "agregar_recordatorio" => {
                self.touch(user_id, DialogStep::ReminderDescription);
                Ok(Reply::text(format::reminder_description_prompt()))
            }
            "agregar_deuda" => {
                self.touch(user_id, DialogStep::DebtName);
                Ok(Reply::text(format::debt_name_prompt()))
            }
            "agregar_alerta" => Ok(Reply::with_keyboard(
                format::alert_scope_prompt(),
                keyboard::alert_scopes(),
            )),
            "config_balance" => {
                self.touch(user_id, DialogStep::ChangeInitialBalance);
                Ok(Reply::text(format::change_balance_prompt()))
            }
            _ => {
                tracing::warn!(callback = data, "unrecognized callback");
                self.main_menu_reply(user_id).await
            }
        }
    }

    async fn show_menu(
        &self,
        user_id: UserId,
        which: &str,
    ) -> Result<Reply, StoreError> {
        match which {
            "income" | "expense" | "saving" => {
                let kind = MovementKind::from_str(which).expect("matched");
                Ok(Reply::with_keyboard(
                    format!(
                        "{} **Menú de {}**",
                        format::kind_emoji(kind),
                        format::kind_label_plural(kind)
                    ),
                    keyboard::movement_menu(kind),
                ))
            }
            "subscriptions" => Ok(Reply::with_keyboard(
                "📄 **Suscripciones**".to_string(),
                keyboard::subscriptions_menu(),
            )),
            "reminders" => Ok(Reply::with_keyboard(
                "🔔 **Recordatorios**".to_string(),
                keyboard::reminders_menu(),
            )),
            "debts" => Ok(Reply::with_keyboard(
                "💰 **Deudas**".to_string(),
                keyboard::debts_menu(),
            )),
            "alerts" => Ok(Reply::with_keyboard(
                "🚨 **Alertas de gasto**".to_string(),
                keyboard::alerts_menu(),
            )),
            "history" => self.show_history(user_id).await,
            "settings" => Ok(Reply::with_keyboard(
                format::config_menu(),
                keyboard::settings_menu(),
            )),
            _ => self.main_menu_reply(user_id).await,
        }
    }

    /// Read views over the ledger, all ending back at the main menu.
    async fn show_view(
        &self,
        user_id: UserId,
        which: &str,
    ) -> Result<Reply, StoreError> {
        let text = match which {
            "suscripciones" => {
                let subscriptions = subscription::list_active_subscriptions(
                    &self.pool, user_id,
                )
                .await?;
                format::active_subscriptions(&subscriptions)
            }
            "recordatorios" => {
                let reminders =
                    reminder::list_active_reminders(&self.pool, user_id)
                        .await?;
                format::active_reminders(&reminders)
            }
            "deudas" => {
                let debts =
                    debt::list_active_debts(&self.pool, user_id).await?;
                format::active_debts(&debts)
            }
            "alertas" => {
                let alerts =
                    alert::list_active_alerts(&self.pool, user_id).await?;
                format::active_alerts(&alerts)
            }
            "income_mes" | "expense_mes" | "saving_mes" => {
                let kind = which
                    .strip_suffix("_mes")
                    .and_then(|k| MovementKind::from_str(k).ok())
                    .expect("matched above");
                let movements = movement::list_movements(
                    &self.pool,
                    &self.time_source,
                    user_id,
                    None,
                    None,
                    Some(kind),
                )
                .await?;
                format::month_movements(&movements, kind)
            }
            _ => return self.main_menu_reply(user_id).await,
        };
        Ok(Reply::with_keyboard(text, keyboard::back_to_menu()))
    }

    /// Summaries for the last six months, current month first.
    async fn show_history(
        &self,
        user_id: UserId,
    ) -> Result<Reply, StoreError> {
        let mut period = self.time_source.today().first_of_month();
        let mut summaries = Vec::with_capacity(6);
        for _ in 0..6 {
            let summary = movement::month_summary(
                &self.pool,
                &self.time_source,
                user_id,
                Some(period.month() as i32),
                Some(period.year() as i32),
            )
            .await?;
            summaries.push(summary);
            period = match period.yesterday() {
                Ok(prev) => prev.first_of_month(),
                Err(_) => break,
            };
        }
        Ok(Reply::with_keyboard(
            format::historical(&summaries),
            keyboard::back_to_menu(),
        ))
    }

    /// Render the category picker for a movement flow. Selection happens
    /// via `select_cat_*`, so no dialog state is needed yet.
    pub(super) async fn choose_category_reply(
        &self,
        user_id: UserId,
        kind: MovementKind,
    ) -> Result<Reply, StoreError> {
        let categories =
            category::list_categories(&self.pool, user_id, kind).await?;
        Ok(Reply::with_keyboard(
            format!(
                "{} **Nuevo {}**\n\n🏷️ Elige una categoría:",
                format::kind_emoji(kind),
                format::kind_label(kind)
            ),
            keyboard::categories(kind, &categories),
        ))
    }

    /// `select_cat_<kind>_<name>`: category picked, move on to the amount.
    async fn select_category(
        &self,
        user_id: UserId,
        rest: &str,
    ) -> Result<Reply, StoreError> {
        let Some((kind, name)) = rest.split_once('_') else {
            return self.main_menu_reply(user_id).await;
        };
        let Ok(kind) = MovementKind::from_str(kind) else {
            return self.main_menu_reply(user_id).await;
        };
        self.touch(
            user_id,
            DialogStep::MovementAmount {
                kind,
                category: name.to_string(),
            },
        );
        Ok(Reply::text(format::amount_prompt(kind, name)))
    }

    fn start_new_category(
        &self,
        user_id: UserId,
        kind: &str,
    ) -> Result<Reply, StoreError> {
        let Ok(kind) = MovementKind::from_str(kind) else {
            return Ok(Reply::text(format::no_active_flow()));
        };
        self.touch(user_id, DialogStep::NewCategory { kind });
        Ok(Reply::text(format!(
            "✏️ Escribe el nombre de la nueva categoría de {}:",
            format::kind_label(kind)
        )))
    }

    /// `subscription_cat_<name>`: only valid while the subscription flow
    /// is waiting on a category.
    fn select_subscription_category(
        &self,
        user_id: UserId,
        category: &str,
    ) -> Result<Reply, StoreError> {
        let Some(DialogStep::SubscriptionCategory { name, amount }) =
            self.current_step(user_id)
        else {
            tracing::warn!("subscription category outside its flow");
            self.states.clear(user_id);
            return Ok(Reply::text(format::no_active_flow()));
        };
        let prompt = format::subscription_day_prompt(&name);
        self.touch(
            user_id,
            DialogStep::SubscriptionDay {
                name,
                amount,
                category: category.to_string(),
            },
        );
        Ok(Reply::text(prompt))
    }

    fn select_debt_direction(
        &self,
        user_id: UserId,
        direction: &str,
    ) -> Result<Reply, StoreError> {
        let Some(DialogStep::DebtDirection { counterparty }) =
            self.current_step(user_id)
        else {
            tracing::warn!("debt direction outside its flow");
            self.states.clear(user_id);
            return Ok(Reply::text(format::no_active_flow()));
        };
        let direction = match direction {
            "owed_to_principal" => DebtDirection::OwedToPrincipal,
            "owed_by_principal" => DebtDirection::OwedByPrincipal,
            _ => return Ok(Reply::text(format::no_active_flow())),
        };
        let prompt = format::debt_amount_prompt(&counterparty);
        self.touch(
            user_id,
            DialogStep::DebtAmount { counterparty, direction },
        );
        Ok(Reply::text(prompt))
    }

    fn select_alert_scope(
        &self,
        user_id: UserId,
        scope: &str,
    ) -> Result<Reply, StoreError> {
        let scope = match scope {
            "daily" => AlertScope::Daily,
            "monthly" => AlertScope::Monthly,
            _ => return Ok(Reply::text(format::no_active_flow())),
        };
        self.touch(user_id, DialogStep::AlertThreshold { scope });
        Ok(Reply::text(format::alert_threshold_prompt(scope)))
    }
}
