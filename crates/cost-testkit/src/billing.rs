use std::collections::HashMap;
use std::sync::Mutex;

use cost_aiven::{BillingApi, Invoice, InvoiceLine, ProviderError, Tags};

/// Scripted [`BillingApi`]. Every call is appended to [`StubBillingApi::calls`].
///
/// Tags not registered with `with_tags` answer 404, like a deleted service.
#[derive(Default)]
pub struct StubBillingApi {
    invoices: Vec<Invoice>,
    lines: HashMap<String, Vec<InvoiceLine>>,
    tags: HashMap<(String, String), Result<Tags, ProviderError>>,
    list_error: Option<ProviderError>,
    line_errors: HashMap<String, ProviderError>,
    calls: Mutex<Vec<String>>,
}

impl StubBillingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoice(mut self, invoice: Invoice, lines: Vec<InvoiceLine>) -> Self {
        self.lines.insert(invoice.id.clone(), lines);
        self.invoices.push(invoice);
        self
    }

    pub fn with_tags(mut self, project: &str, service: &str, tags: Tags) -> Self {
        self.tags
            .insert((project.to_string(), service.to_string()), Ok(tags));
        self
    }

    pub fn with_tag_error(mut self, project: &str, service: &str, err: ProviderError) -> Self {
        self.tags
            .insert((project.to_string(), service.to_string()), Err(err));
        self
    }

    pub fn with_list_error(mut self, err: ProviderError) -> Self {
        self.list_error = Some(err);
        self
    }

    pub fn with_lines_error(mut self, invoice_id: &str, err: ProviderError) -> Self {
        self.line_errors.insert(invoice_id.to_string(), err);
        self
    }

    /// `list_invoices:BG`, `invoice_lines:ID`, `service_tags:PROJECT/SERVICE`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn lines_fetched_for(&self, invoice_id: &str) -> bool {
        self.calls()
            .iter()
            .any(|c| c == &format!("invoice_lines:{invoice_id}"))
    }

    pub fn tag_lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("service_tags:"))
            .count()
    }

    fn record(&self, call: String) {
        if let Ok(mut c) = self.calls.lock() {
            c.push(call);
        }
    }
}

#[async_trait::async_trait]
impl BillingApi for StubBillingApi {
    async fn list_invoices(&self, billing_group_id: &str) -> Result<Vec<Invoice>, ProviderError> {
        self.record(format!("list_invoices:{billing_group_id}"));
        match &self.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.invoices.clone()),
        }
    }

    async fn invoice_lines(
        &self,
        _billing_group_id: &str,
        invoice_id: &str,
    ) -> Result<Vec<InvoiceLine>, ProviderError> {
        self.record(format!("invoice_lines:{invoice_id}"));
        if let Some(e) = self.line_errors.get(invoice_id) {
            return Err(e.clone());
        }
        self.lines.get(invoice_id).cloned().ok_or_else(|| ProviderError::Api {
            status: 404,
            message: format!("invoice {invoice_id} not found"),
        })
    }

    async fn service_tags(&self, project_name: &str, service_name: &str) -> Result<Tags, ProviderError> {
        self.record(format!("service_tags:{project_name}/{service_name}"));
        self.tags
            .get(&(project_name.to_string(), service_name.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(ProviderError::Api {
                    status: 404,
                    message: "Service not found".to_string(),
                })
            })
    }
}
