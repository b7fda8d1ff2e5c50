pub mod api;
pub mod latefee;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod period;
pub mod plans;
pub mod policy;
pub mod quota;
pub mod recurrence;
pub mod schedule;
pub mod scheduler;

pub use latefee::{apply_late_fee, calculate_late_fee, run_late_fee_pass, FeeOutcome, SkipReason};
pub use lifecycle::{can_transition, days_overdue, should_apply_late_fee, InvoiceStatus};
pub use models::{Invoice, LateFeeEvent, LateFeePolicy, LineItem, RecurringSchedule, UsageCounter};
pub use notify::{InvoiceNotifier, LogNotifier};
pub use period::PeriodClock;
pub use plans::{plan_for, Plan, PlanFeature};
pub use quota::{consume as consume_quota, QuotaOutcome};
pub use recurrence::{next_after, next_date, Frequency};
pub use schedule::{run_due, RunSummary, ScheduleInput};
pub use scheduler::{process_tick, spawn as spawn_billing_loop};
