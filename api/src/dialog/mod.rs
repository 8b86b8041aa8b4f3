//! The conversational layer: per-principal dialog state and the
//! deterministic state machine that collects input across messages.
//!
//! The chat transport is an external collaborator. It hands every inbound
//! event to [`Dispatcher::dispatch`] and renders the returned [`Reply`]
//! (text, optional inline keyboard, optional document); it also drains the
//! notification outbox on its own schedule. Nothing in here knows how
//! messages are delivered.

pub mod callbacks;
pub mod commands;
pub mod format;
pub mod keyboard;
pub mod messages;
pub mod state;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::store::{AlertScope, DebtDirection, Money, MovementKind, UserId};
use crate::telemetry::log_error;
use crate::time::TimeSource;
use state::StateStore;

/// An inbound chat event, already stripped of transport details.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A `/command`, with everything after the command name as `args`.
    Command { name: String, args: String },
    /// Free text, fed to whatever step the principal is on.
    Text(String),
    /// An inline-button callback, e.g. `select_cat_expense_Comida`.
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub callback: String,
}

impl Button {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self { label: label.into(), callback: callback.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// A file attachment, used by `/backup`.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content: Vec<u8>,
    pub caption: String,
}

/// What the transport should render back to the principal.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub document: Option<Document>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None, document: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self { text: text.into(), keyboard: Some(keyboard), document: None }
    }
}

/// Where a multi-step flow currently stands. One entry per principal in
/// the state store; every variant carries the data collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogStep {
    /// First-time setup: waiting for the starting balance.
    InitialBalance,
    /// Settings flow: waiting for the replacement starting balance.
    ChangeInitialBalance,
    NewCategory {
        kind: MovementKind,
    },
    MovementAmount {
        kind: MovementKind,
        category: String,
    },
    MovementDescription {
        kind: MovementKind,
        category: String,
        amount: Money,
    },
    SubscriptionName,
    SubscriptionAmount {
        name: String,
    },
    /// Waiting for a `subscription_cat_*` button press.
    SubscriptionCategory {
        name: String,
        amount: Money,
    },
    SubscriptionDay {
        name: String,
        amount: Money,
        category: String,
    },
    ReminderDescription,
    ReminderDate {
        description: String,
    },
    DebtName,
    /// Waiting for a `debt_type_*` button press.
    DebtDirection {
        counterparty: String,
    },
    DebtAmount {
        counterparty: String,
        direction: DebtDirection,
    },
    AlertThreshold {
        scope: AlertScope,
    },
}

/// Routes inbound chat events into ledger operations.
pub struct Dispatcher {
    pool: SqlitePool,
    time_source: TimeSource,
    states: Arc<StateStore>,
    authorized_user: UserId,
}

impl Dispatcher {
    pub fn new(
        pool: SqlitePool,
        time_source: TimeSource,
        states: Arc<StateStore>,
        authorized_user: UserId,
    ) -> Self {
        Self { pool, time_source, states, authorized_user }
    }

    /// Exact-match allowlist check.
    pub fn is_authorized(&self, user_id: UserId) -> bool {
        user_id == self.authorized_user
    }

    /// Handle one inbound event. `None` means the event is dropped
    /// silently (unauthorized free text or button presses). Unauthorized
    /// commands get nothing richer than "no autorizado".
    pub async fn dispatch(
        &self,
        user_id: UserId,
        inbound: Inbound,
    ) -> Option<Reply> {
        if !self.is_authorized(user_id) {
            tracing::warn!(user_id = %user_id, "unauthorized access attempt");
            return match inbound {
                Inbound::Command { .. } => {
                    Some(Reply::text("🚫 No autorizado"))
                }
                _ => None,
            };
        }

        let result = match inbound {
            Inbound::Command { name, args } => {
                self.handle_command(user_id, &name, args.trim()).await
            }
            Inbound::Callback(data) => {
                self.handle_callback(user_id, &data).await
            }
            Inbound::Text(text) => self.handle_text(user_id, &text).await,
        };

        Some(match result {
            Ok(reply) => reply,
            Err(e) => {
                log_error(anyhow::Error::new(e).context("dispatch failed"));
                Reply::text("❌ Error en la operación")
            }
        })
    }

    /// Store the principal's dialog step, stamping it with the current
    /// time for TTL-based expiry.
    pub(crate) fn touch(&self, user_id: UserId, step: DialogStep) {
        self.states.set(user_id, step, self.time_source.now());
    }

    pub(crate) fn current_step(&self, user_id: UserId) -> Option<DialogStep> {
        self.states.get(user_id).map(|entry| entry.step)
    }
}
