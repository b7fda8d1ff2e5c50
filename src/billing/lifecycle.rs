use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// key: invoice-lifecycle -> status machine,fee eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Paid and cancelled invoices are frozen against further fee accrual.
    pub fn is_frozen(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// draft -> sent -> {paid, overdue, cancelled}. Overdue invoices can still
/// settle or be written off; an overdue label on a sent invoice comes from
/// a detection pass outside this engine, so sent -> overdue is accepted
/// but never initiated here.
pub fn can_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    use InvoiceStatus::*;
    matches!(
        (from, to),
        (Draft, Sent)
            | (Draft, Cancelled)
            | (Sent, Paid)
            | (Sent, Overdue)
            | (Sent, Cancelled)
            | (Overdue, Paid)
            | (Overdue, Cancelled)
    )
}

/// UTC calendar-day difference, floored at zero. An invoice due today is
/// not yet overdue.
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

/// Late-fee eligibility guard. True iff the invoice is not frozen, no fee
/// was applied on the same UTC calendar day, and the invoice is past due.
/// The same-day check is the idempotency line against duplicate cron
/// firings; the authoritative re-check happens inside the guarded UPDATE.
pub fn should_apply_late_fee(
    status: InvoiceStatus,
    late_fee_applied_at: Option<DateTime<Utc>>,
    due_date: NaiveDate,
    now: DateTime<Utc>,
) -> bool {
    if status.is_frozen() {
        return false;
    }
    if applied_today(late_fee_applied_at, now) {
        return false;
    }
    days_overdue(due_date, now.date_naive()) > 0
}

pub fn applied_today(late_fee_applied_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    late_fee_applied_at
        .map(|applied| applied.date_naive() == now.date_naive())
        .unwrap_or(false)
}
