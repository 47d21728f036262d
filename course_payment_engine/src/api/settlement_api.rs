use log::{debug, info, warn};

use crate::{
    api::objects::LedgerSnapshot,
    db_types::{Actor, Cart, CartItemRef, CartStatus, NewCart, Payout, PayoutStatus, Role, Setting},
    notify::{MailMessage, Notifier},
    traits::{CartBatchOutcome, PayoutDraft, SettlementDatabase, SettlementError},
};

/// The high-level orchestration layer for every state-changing settlement flow.
///
/// `SettlementApi` validates the caller's role and the requested transition, delegates the atomic record
/// mutations to the backend, and sends the flow notifications. Notifications are sent *after* the financial
/// transaction commits; if one fails, the money has already moved and the failure is surfaced to the caller
/// as a hard error. See the individual methods for where this bites.
pub struct SettlementApi<B, N> {
    db: B,
    notifier: N,
    admin_email: String,
}

impl<B: Clone, N: Clone> Clone for SettlementApi<B, N> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), notifier: self.notifier.clone(), admin_email: self.admin_email.clone() }
    }
}

impl<B, N> SettlementApi<B, N>
where
    B: SettlementDatabase,
    N: Notifier,
{
    pub fn new<S: Into<String>>(db: B, notifier: N, admin_email: S) -> Self {
        Self { db, notifier, admin_email: admin_email.into() }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Creates the ledger singleton. Meant to be run once, from the migrate endpoint.
    pub async fn bootstrap_ledger(&self) -> Result<Setting, SettlementError> {
        let setting = self.db.bootstrap_ledger().await?;
        info!("🗃️ Ledger bootstrapped with instructor ratio {}%.", setting.instructor_ratio);
        Ok(setting)
    }

    pub async fn fetch_ledger(&self) -> Result<Setting, SettlementError> {
        self.db.fetch_ledger().await
    }

    pub async fn ledger_snapshot(&self) -> Result<LedgerSnapshot, SettlementError> {
        Ok(self.db.ledger_snapshot().await?)
    }

    /// Adds a course to the acting student's cart.
    pub async fn add_course_to_cart(&self, actor: Actor, course_id: i64) -> Result<Cart, SettlementError> {
        let cart = self.db.create_cart(NewCart { course_id, student_id: actor.user_id }).await?;
        debug!("🛒️ Cart {} created for user {} (course {course_id}).", cart.cart_no, actor.user_id);
        Ok(cart)
    }

    pub async fn delete_cart(&self, cart_id: i64) -> Result<(), SettlementError> {
        self.db.delete_cart(cart_id).await
    }

    /// Moves a batch of cart items to `target` atomically.
    ///
    /// Moving to `New` is never allowed, whatever the source status. When the batch completes sales
    /// (`target == Completed`), the student is sent a confirmation mail after the transaction has committed;
    /// a mail failure at that point is returned as an error even though the purchases and ledger credit
    /// stand.
    pub async fn update_cart_statuses(
        &self,
        actor: Actor,
        target: CartStatus,
        items: &[CartItemRef],
    ) -> Result<CartBatchOutcome, SettlementError> {
        if target == CartStatus::New {
            return Err(SettlementError::CartTargetNew);
        }
        let outcome = self.db.update_cart_statuses(target, items).await?;
        if target == CartStatus::Completed {
            let student =
                self.db.fetch_active_user(actor.user_id).await?.ok_or(SettlementError::UserNotFound)?;
            let courses = outcome.course_names.join(", ");
            let body = format!(
                "Hello, {}! Your buy courses success, please check info in list courses was purchased: {courses}",
                student.name
            );
            let message = MailMessage::new(&student.email, "Buy courses success", body);
            if let Err(e) = self.notifier.send(message).await {
                warn!(
                    "🛒️ Cart batch for user {} committed, but the confirmation mail failed. The purchases and \
                     ledger credit stand; the student was not notified. {e}",
                    actor.user_id
                );
                return Err(e.into());
            }
            info!("🛒️ {} cart item(s) completed for user {}.", items.len(), actor.user_id);
        }
        Ok(outcome)
    }

    /// Creates a payout batch over the given purchases.
    ///
    /// Admins must name the instructor being paid out; instructors can only create payouts for themselves.
    pub async fn create_payout(
        &self,
        actor: Actor,
        instructor_id: Option<i64>,
        purchase_ids: Vec<i64>,
    ) -> Result<Payout, SettlementError> {
        if purchase_ids.is_empty() {
            return Err(SettlementError::PurchaseNotClaimable);
        }
        let instructor_id = match actor.role {
            Role::Admin => instructor_id.ok_or(SettlementError::InstructorIdRequired)?,
            _ => actor.user_id,
        };
        self.db.fetch_active_user(instructor_id).await?.ok_or(SettlementError::InstructorNotFound)?;
        let payout = self.db.create_payout(PayoutDraft { instructor_id, purchase_ids }).await?;
        info!(
            "💰️ Payout {} created for instructor {instructor_id}: {} gross, {} to instructor.",
            payout.payout_no, payout.balance_origin, payout.balance_instructor_received
        );
        Ok(payout)
    }

    /// Drives the payout state machine.
    ///
    /// * `RequestPayout` is how an instructor asks to be paid; the admin is mailed the instructor's banking
    ///   details before the status is saved.
    /// * `Completed` and `Rejected` are admin-only verdicts. Rejection requires a non-empty `comment`.
    ///   Completion first runs the financial settlement transaction, then mails the instructor, then saves
    ///   the payout status. A mail failure after settlement leaves the payout still in `RequestPayout` while
    ///   the ledger and balances already reflect the completion.
    pub async fn update_payout_status(
        &self,
        actor: Actor,
        payout_id: i64,
        target: PayoutStatus,
        comment: Option<&str>,
    ) -> Result<Payout, SettlementError> {
        let payout = self.db.fetch_payout(payout_id).await?.ok_or(SettlementError::PayoutNotFound)?;
        if payout.status == PayoutStatus::Completed {
            return Err(SettlementError::PayoutAlreadyCompleted(payout.payout_no));
        }
        if !PayoutStatus::is_valid_transition(payout.status, target) {
            return Err(SettlementError::InvalidPayoutTransition {
                payout_no: payout.payout_no.clone(),
                from: payout.status,
                to: target,
            });
        }
        let instructor =
            self.db.fetch_active_user(payout.instructor_id).await?.ok_or(SettlementError::InstructorNotFound)?;
        match target {
            PayoutStatus::RequestPayout => {
                if actor.role == Role::Instructor {
                    let bank_name = instructor.bank_name.as_deref().unwrap_or("(no bank name on file)");
                    let bank_account_no = instructor.bank_account_no.as_deref().unwrap_or("(no account on file)");
                    let body = format!(
                        "Instructor {} ({}) requests payout '{}' of {}. Bank: {bank_name}, account: \
                         {bank_account_no}.",
                        instructor.name, instructor.email, payout.payout_no, payout.balance_instructor_received
                    );
                    let message = MailMessage::new(&self.admin_email, "Instructor request payout", body);
                    self.notifier.send(message).await?;
                }
            },
            PayoutStatus::Completed | PayoutStatus::Rejected => {
                if !actor.is_admin() {
                    return Err(SettlementError::AdminOnlyTransition);
                }
                let reject_reason = match target {
                    PayoutStatus::Rejected => Some(
                        comment
                            .map(str::trim)
                            .filter(|c| !c.is_empty())
                            .ok_or(SettlementError::RejectCommentRequired)?
                            .to_string(),
                    ),
                    _ => None,
                };
                if target == PayoutStatus::Completed {
                    self.db.settle_payout(&payout).await?;
                    info!(
                        "💰️ Payout {} settled. {} paid to instructor {}, {} retained.",
                        payout.payout_no,
                        payout.balance_instructor_received,
                        payout.instructor_id,
                        payout.balance_instructor_paid
                    );
                }
                let (subject, body) = match reject_reason {
                    Some(reason) => (
                        "Payout rejected",
                        format!(
                            "Hello, {}! Your payout '{}' was rejected. Reason: {reason}",
                            instructor.name, payout.payout_no
                        ),
                    ),
                    None => (
                        "Payout completed",
                        format!(
                            "Hello, {}! Your payout '{}' of {} has been paid out.",
                            instructor.name, payout.payout_no, payout.balance_instructor_received
                        ),
                    ),
                };
                if let Err(e) = self.notifier.send(MailMessage::new(&instructor.email, subject, body)).await {
                    if target == PayoutStatus::Completed {
                        warn!(
                            "💰️ Payout {} settlement committed, but the completion mail failed. The payout \
                             status has NOT been saved and still reads {}. {e}",
                            payout.payout_no, payout.status
                        );
                    }
                    return Err(e.into());
                }
            },
            // The whitelist never admits a move back to New.
            PayoutStatus::New => {
                return Err(SettlementError::InvalidPayoutTransition {
                    payout_no: payout.payout_no.clone(),
                    from: payout.status,
                    to: target,
                })
            },
        }
        self.db.update_payout_status(payout_id, target).await
    }
}
