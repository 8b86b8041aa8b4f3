//! Slash-command handling, including the `/expense` and `/income` fast
//! paths that skip the multi-step flows.

use super::{DialogStep, Document, Reply, format, keyboard};
use crate::store::{
    MovementKind, StoreError, UserId, category, export, movement, principal,
};

impl super::Dispatcher {
    pub(super) async fn handle_command(
        &self,
        user_id: UserId,
        name: &str,
        args: &str,
    ) -> Result<Reply, StoreError> {
        match name {
            "start" => self.cmd_start(user_id).await,
            "balance" => self.cmd_balance(user_id).await,
            "expense" | "gasto" => {
                self.fast_movement(user_id, MovementKind::Expense, args).await
            }
            "income" | "ingreso" => {
                self.fast_movement(user_id, MovementKind::Income, args).await
            }
            "summary" | "resumen" => self.cmd_summary(user_id).await,
            "backup" => self.cmd_backup(user_id).await,
            "help" | "ayuda" => Ok(Reply::text(format::help())),
            _ => Ok(Reply::text(format::no_active_flow())),
        }
    }

    /// Entry point: first-time setup for a new principal, otherwise the
    /// main menu. Always abandons any in-flight flow.
    async fn cmd_start(&self, user_id: UserId) -> Result<Reply, StoreError> {
        self.states.clear(user_id);

        if !principal::principal_exists(&self.pool, user_id).await? {
            principal::create_principal(
                &self.pool,
                &self.time_source,
                user_id,
                crate::store::Money::ZERO,
            )
            .await?;
            self.touch(user_id, DialogStep::InitialBalance);
            return Ok(Reply::text(format::welcome()));
        }
        if !principal::is_configured(&self.pool, user_id).await? {
            self.touch(user_id, DialogStep::InitialBalance);
            return Ok(Reply::text(format::welcome()));
        }
        self.main_menu_reply(user_id).await
    }

    async fn cmd_balance(&self, user_id: UserId) -> Result<Reply, StoreError> {
        let balance =
            movement::current_balance(&self.pool, user_id).await?;
        Ok(Reply::text(format::balance(balance)))
    }

    async fn cmd_summary(&self, user_id: UserId) -> Result<Reply, StoreError> {
        let summary = movement::month_summary(
            &self.pool,
            &self.time_source,
            user_id,
            None,
            None,
        )
        .await?;
        Ok(Reply::text(format::month_summary(&summary)))
    }

    /// `/backup` renders the CSV export and attaches it as a document. An
    /// empty ledger gets a plain "nothing to back up" answer instead.
    async fn cmd_backup(&self, user_id: UserId) -> Result<Reply, StoreError> {
        let export =
            export::export_movements(&self.pool, user_id).await?;
        if export.rows == 0 {
            return Ok(Reply::text(format::nothing_to_back_up()));
        }
        let stamp = self.time_source.zoned_now().strftime("%Y%m%d_%H%M");
        let generated =
            self.time_source.zoned_now().strftime("%d/%m/%Y %H:%M");
        Ok(Reply {
            text: String::new(),
            keyboard: None,
            document: Some(Document {
                filename: format!("backup_finanzas_{stamp}.csv"),
                content: export.data,
                caption: format!("📄 Backup de movimientos - {generated}"),
            }),
        })
    }

    /// `/expense <amount> [description]`: commits directly against the
    /// first active category of the kind, creating the fallback category
    /// when none exists. Without arguments it opens the guided flow.
    async fn fast_movement(
        &self,
        user_id: UserId,
        kind: MovementKind,
        args: &str,
    ) -> Result<Reply, StoreError> {
        if args.is_empty() {
            return self.choose_category_reply(user_id, kind).await;
        }
        let mut parts = args.split_whitespace();
        let amount = parts.next().and_then(|raw| {
            crate::validate::parse_amount(raw, false)
        });
        let Some(amount) = amount else {
            return Ok(Reply::text(format::invalid_amount()));
        };
        let description = parts.collect::<Vec<_>>().join(" ");

        let category = category::first_or_fallback_category(
            &self.pool,
            &self.time_source,
            user_id,
            kind,
        )
        .await?;
        movement::add_movement(
            &self.pool,
            &self.time_source,
            user_id,
            kind,
            &category,
            amount,
            &description,
        )
        .await?;
        let balance =
            movement::current_balance(&self.pool, user_id).await?;
        Ok(Reply::with_keyboard(
            format::movement_saved(
                kind,
                &category,
                amount,
                &description,
                balance,
            ),
            keyboard::movement_saved(kind),
        ))
    }

    pub(super) async fn main_menu_reply(
        &self,
        user_id: UserId,
    ) -> Result<Reply, StoreError> {
        let daily = movement::daily_balance(
            &self.pool,
            &self.time_source,
            user_id,
            None,
        )
        .await?;
        Ok(Reply::with_keyboard(
            format::main_menu(&daily),
            keyboard::main_menu(),
        ))
    }
}
