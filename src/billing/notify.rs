use async_trait::async_trait;
use tracing::info;

use super::models::Invoice;

/// key: invoice-notifier -> delivery seam
///
/// Delivery transport (email, WhatsApp) lives outside this engine; the
/// runner only needs a fire-and-forget hook after an invoice commits.
#[async_trait]
pub trait InvoiceNotifier: Send + Sync {
    async fn invoice_generated(&self, invoice: &Invoice);
}

/// Default notifier: records the dispatch in the log and nothing else.
pub struct LogNotifier;

#[async_trait]
impl InvoiceNotifier for LogNotifier {
    async fn invoice_generated(&self, invoice: &Invoice) {
        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            client = %invoice.client_name,
            "invoice ready for delivery"
        );
    }
}
