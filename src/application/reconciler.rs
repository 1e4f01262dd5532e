use crate::domain::payment::{Amount, PaymentRecord, PaymentStatus};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{PaymentStoreRef, Transition};
use crate::error::Result;
use chrono::Utc;

/// A decoded gateway result notification.
///
/// Amount and phone are optional because the gateway omits its metadata items
/// on some failures; a notice without them can never be correlated.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotice {
    pub result_code: i64,
    pub result_desc: Option<String>,
    pub checkout_request_id: Option<String>,
    pub amount: Option<Amount>,
    pub phone: Option<PhoneNumber>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The matched record moved from Pending to its terminal status.
    Applied(PaymentRecord),
    /// No Pending record carries this phone and amount.
    NoMatch,
    /// The matching record had already been resolved, typically by an
    /// earlier delivery of the same notice.
    AlreadyResolved(PaymentRecord),
}

/// Correlates gateway notices with pending payments.
///
/// The correlation key is (normalized phone, amount): the gateway echoes no
/// identifier of ours back. When several Pending records share the key, the
/// most recently created one is resolved and the rest stay Pending. The
/// status write is a compare-and-set, so redelivered notices never re-apply
/// or flip a terminal record. The notice's CheckoutRequestID is stored on the
/// record it settles; a repeat of that notice is refused by the store instead
/// of settling an older Pending record with the same key.
pub struct CallbackReconciler {
    store: PaymentStoreRef,
}

impl CallbackReconciler {
    pub fn new(store: PaymentStoreRef) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, notice: &PaymentNotice) -> Result<ReconcileOutcome> {
        let (Some(phone), Some(amount)) = (&notice.phone, notice.amount) else {
            tracing::warn!(
                result_code = notice.result_code,
                checkout_request_id = ?notice.checkout_request_id,
                "Callback without amount or phone, discarding"
            );
            return Ok(ReconcileOutcome::NoMatch);
        };

        let Some(candidate) = self.store.latest_matching(phone, amount, true).await? else {
            return self.unmatched(phone, amount, notice).await;
        };

        let outcome = PaymentStatus::from_result_code(notice.result_code);
        let notice_id = notice.checkout_request_id.as_deref();
        match self
            .store
            .resolve(candidate.id, outcome, Utc::now(), notice_id)
            .await?
        {
            Transition::Applied(record) => {
                tracing::info!(
                    record_id = %record.id,
                    status = ?record.status,
                    result_code = notice.result_code,
                    "Payment resolved"
                );
                Ok(ReconcileOutcome::Applied(record))
            }
            Transition::Stale(record) => {
                tracing::info!(record_id = %record.id, "Duplicate callback ignored");
                Ok(ReconcileOutcome::AlreadyResolved(record))
            }
            Transition::Duplicate(record) => {
                tracing::info!(
                    record_id = %record.id,
                    pending_id = %candidate.id,
                    "Callback already settled a payment with this key, ignored"
                );
                Ok(ReconcileOutcome::AlreadyResolved(record))
            }
            Transition::Missing => {
                tracing::warn!(record_id = %candidate.id, "Matched record vanished before update");
                Ok(ReconcileOutcome::NoMatch)
            }
        }
    }

    /// Tells a redelivery apart from a callback nobody is waiting for.
    /// Neither touches the store.
    ///
    /// The label is a guess from the newest record with the key: a callback
    /// that overtakes its own pending insert is reported `AlreadyResolved`
    /// when an earlier payment with the same phone and amount is terminal,
    /// and `NoMatch` otherwise.
    async fn unmatched(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        notice: &PaymentNotice,
    ) -> Result<ReconcileOutcome> {
        match self.store.latest_matching(phone, amount, false).await? {
            Some(record) if record.status.is_terminal() => {
                tracing::info!(record_id = %record.id, "Duplicate callback ignored");
                Ok(ReconcileOutcome::AlreadyResolved(record))
            }
            _ => {
                tracing::warn!(
                    %phone,
                    %amount,
                    result_code = notice.result_code,
                    "No pending payment matches callback"
                );
                Ok(ReconcileOutcome::NoMatch)
            }
        }
    }
}
