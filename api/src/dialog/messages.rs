//! Free-text handling: the per-step transition function of the dialog
//! machine. Invalid input answers with a `❌` message and holds the
//! current step so the principal can retry; every commit clears the state.

use super::{DialogStep, Reply, format, keyboard};
use crate::store::{
    MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, Money,
    MovementKind, StoreError, UserId, alert, category, debt, movement,
    principal, reminder, subscription,
};
use crate::validate;

/// Typing any of these instead of a description commits with an empty one.
const SKIP_DESCRIPTION_KEYWORDS: [&str; 4] =
    ["no", "skip", "omitir", "sin descripcion"];

impl super::Dispatcher {
    pub(super) async fn handle_text(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(step) = self.current_step(user_id) else {
            return Ok(Reply::text(format::no_active_flow()));
        };
        let text = validate::sanitize_text(text, MAX_DESCRIPTION_LEN + 10);

        match step {
            DialogStep::InitialBalance => {
                self.set_initial_balance(user_id, &text, true).await
            }
            DialogStep::ChangeInitialBalance => {
                self.set_initial_balance(user_id, &text, false).await
            }
            DialogStep::NewCategory { kind } => {
                self.create_category(user_id, kind, &text).await
            }
            DialogStep::MovementAmount { kind, category } => {
                self.movement_amount(user_id, kind, category, &text)
            }
            DialogStep::MovementDescription { kind, category, amount } => {
                self.commit_movement(user_id, kind, category, amount, &text)
                    .await
            }
            DialogStep::SubscriptionName => {
                self.subscription_name(user_id, &text)
            }
            DialogStep::SubscriptionAmount { name } => {
                self.subscription_amount(user_id, name, &text).await
            }
            DialogStep::SubscriptionDay { name, amount, category } => {
                self.commit_subscription(
                    user_id, name, amount, category, &text,
                )
                .await
            }
            DialogStep::ReminderDescription => {
                self.reminder_description(user_id, &text)
            }
            DialogStep::ReminderDate { description } => {
                self.commit_reminder(user_id, description, &text).await
            }
            DialogStep::DebtName => self.debt_name(user_id, &text),
            DialogStep::DebtAmount { counterparty, direction } => {
                self.commit_debt(user_id, counterparty, direction, &text)
                    .await
            }
            DialogStep::AlertThreshold { scope } => {
                self.commit_alert(user_id, scope, &text).await
            }
            // These steps advance via buttons; text does not move them.
            DialogStep::SubscriptionCategory { .. }
            | DialogStep::DebtDirection { .. } => {
                Ok(Reply::text(format::use_the_buttons()))
            }
        }
    }

    /// Shared by first-time setup and the settings flow; setup also marks
    /// the principal configured.
    async fn set_initial_balance(
        &self,
        user_id: UserId,
        text: &str,
        first_time: bool,
    ) -> Result<Reply, StoreError> {
        let Some(amount) = validate::parse_amount(text, true) else {
            return Ok(Reply::text(format::invalid_balance()));
        };
        principal::update_initial_balance(&self.pool, user_id, amount)
            .await?;
        self.states.clear(user_id);
        if first_time {
            principal::mark_configured(&self.pool, user_id).await?;
            Ok(Reply::text(format::setup_done(amount)))
        } else {
            Ok(Reply::text(format::balance_updated(amount)))
        }
    }

    async fn create_category(
        &self,
        user_id: UserId,
        kind: MovementKind,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(name) = validate::valid_category_name(text) else {
            return Ok(Reply::text(format::invalid_name(
                MAX_CATEGORY_NAME_LEN,
            )));
        };
        category::add_category(
            &self.pool,
            &self.time_source,
            user_id,
            name,
            kind,
        )
        .await?;
        // continue straight into the movement flow with the new category
        self.touch(
            user_id,
            DialogStep::MovementAmount { kind, category: name.to_string() },
        );
        Ok(Reply::text(format::amount_prompt(kind, name)))
    }

    fn movement_amount(
        &self,
        user_id: UserId,
        kind: MovementKind,
        category: String,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(amount) = validate::parse_amount(text, false) else {
            return Ok(Reply::text(format::invalid_amount()));
        };
        let prompt = format::description_prompt(kind, &category, amount);
        self.touch(
            user_id,
            DialogStep::MovementDescription { kind, category, amount },
        );
        Ok(Reply::text(prompt))
    }

    async fn commit_movement(
        &self,
        user_id: UserId,
        kind: MovementKind,
        category: String,
        amount: Money,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let description = if SKIP_DESCRIPTION_KEYWORDS
            .contains(&text.to_lowercase().as_str())
        {
            ""
        } else {
            text
        };
        movement::add_movement(
            &self.pool,
            &self.time_source,
            user_id,
            kind,
            &category,
            amount,
            description,
        )
        .await?;
        self.states.clear(user_id);
        let balance =
            movement::current_balance(&self.pool, user_id).await?;
        Ok(Reply::with_keyboard(
            format::movement_saved(
                kind,
                &category,
                amount,
                description,
                balance,
            ),
            keyboard::movement_saved(kind),
        ))
    }

    fn subscription_name(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(name) = validate::valid_subscription_name(text) else {
            return Ok(Reply::text(format::invalid_name(MAX_NAME_LEN)));
        };
        let prompt = format::subscription_amount_prompt(name);
        self.touch(
            user_id,
            DialogStep::SubscriptionAmount { name: name.to_string() },
        );
        Ok(Reply::text(prompt))
    }

    async fn subscription_amount(
        &self,
        user_id: UserId,
        name: String,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(amount) = validate::parse_amount(text, false) else {
            return Ok(Reply::text(format::invalid_amount()));
        };
        let categories = category::expense_categories_with_defaults(
            &self.pool,
            &self.time_source,
            user_id,
        )
        .await?;
        let prompt = format::subscription_category_prompt(&name, amount);
        self.touch(
            user_id,
            DialogStep::SubscriptionCategory { name, amount },
        );
        Ok(Reply::with_keyboard(
            prompt,
            keyboard::subscription_categories(&categories),
        ))
    }

    async fn commit_subscription(
        &self,
        user_id: UserId,
        name: String,
        amount: Money,
        category: String,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(day) = validate::parse_day(text) else {
            return Ok(Reply::text(format::invalid_day()));
        };
        let subscription = subscription::add_subscription(
            &self.pool,
            &self.time_source,
            user_id,
            &name,
            amount,
            &category,
            day,
        )
        .await?;
        self.states.clear(user_id);
        Ok(Reply::with_keyboard(
            format::subscription_saved(&subscription),
            keyboard::subscriptions_menu(),
        ))
    }

    fn reminder_description(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(description) = validate::valid_description(text) else {
            return Ok(Reply::text(format::invalid_description(
                MAX_DESCRIPTION_LEN,
            )));
        };
        self.touch(
            user_id,
            DialogStep::ReminderDate { description: description.to_string() },
        );
        Ok(Reply::text(format::reminder_date_prompt()))
    }

    async fn commit_reminder(
        &self,
        user_id: UserId,
        description: String,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let current_year = self.time_source.today().year();
        let Some(due_date) = validate::parse_date(text, current_year) else {
            return Ok(Reply::text(format::invalid_date()));
        };
        let reminder = reminder::add_reminder(
            &self.pool,
            &self.time_source,
            user_id,
            &description,
            due_date,
            None,
        )
        .await?;
        self.states.clear(user_id);
        Ok(Reply::with_keyboard(
            format::reminder_saved(&reminder),
            keyboard::reminders_menu(),
        ))
    }

    fn debt_name(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(counterparty) = validate::valid_counterparty_name(text)
        else {
            return Ok(Reply::text(format::invalid_name(MAX_NAME_LEN)));
        };
        let prompt = format::debt_direction_prompt(counterparty);
        self.touch(
            user_id,
            DialogStep::DebtDirection {
                counterparty: counterparty.to_string(),
            },
        );
        Ok(Reply::with_keyboard(prompt, keyboard::debt_directions()))
    }

    async fn commit_debt(
        &self,
        user_id: UserId,
        counterparty: String,
        direction: crate::store::DebtDirection,
        text: &str,
    ) -> Result<Reply, StoreError> {
        // a typed sign is ignored, the chosen direction carries it
        let cleaned = text.replace('-', "");
        let Some(amount) = validate::parse_amount(&cleaned, false) else {
            return Ok(Reply::text(format::invalid_amount()));
        };
        let debt = debt::add_debt(
            &self.pool,
            &self.time_source,
            user_id,
            &counterparty,
            amount,
            direction,
            "",
        )
        .await?;
        self.states.clear(user_id);
        Ok(Reply::with_keyboard(
            format::debt_saved(&debt),
            keyboard::debts_menu(),
        ))
    }

    async fn commit_alert(
        &self,
        user_id: UserId,
        scope: crate::store::AlertScope,
        text: &str,
    ) -> Result<Reply, StoreError> {
        let Some(threshold) = validate::parse_amount(text, false) else {
            return Ok(Reply::text(format::invalid_amount()));
        };
        let alert = alert::upsert_alert(
            &self.pool,
            &self.time_source,
            user_id,
            scope,
            threshold,
        )
        .await?;
        self.states.clear(user_id);
        Ok(Reply::with_keyboard(
            format::alert_saved(&alert),
            keyboard::alerts_menu(),
        ))
    }
}
