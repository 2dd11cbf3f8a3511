//! Invoice model as exported by the accounting backend.
//!
//! Field names follow the accounting system's own column names.

use serde::{Deserialize, Serialize};

/// Settlement state derived from the `pagada` and `vencida` flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Overdue,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Paid => "paid",
        }
    }
}

/// An issued invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "idfactura")]
    pub id: u64,
    pub codigo: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub numero2: String,
    /// Owning customer
    #[serde(rename = "codcliente")]
    pub customer_code: String,
    #[serde(rename = "nombrecliente", default)]
    pub customer_name: String,
    #[serde(default)]
    pub cifnif: String,
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub ciudad: String,
    #[serde(default)]
    pub provincia: String,
    #[serde(default)]
    pub codpostal: Option<String>,
    #[serde(default)]
    pub codpais: String,
    pub fecha: String,
    #[serde(default)]
    pub hora: String,
    #[serde(default)]
    pub fecha_creacion: Option<String>,
    #[serde(default)]
    pub neto: f64,
    #[serde(default)]
    pub totaliva: f64,
    #[serde(default)]
    pub totalirpf: f64,
    #[serde(default)]
    pub totalrecargo: f64,
    pub total: f64,
    #[serde(default)]
    pub coddivisa: String,
    #[serde(default)]
    pub codpago: String,
    #[serde(default)]
    pub codserie: String,
    #[serde(default)]
    pub observaciones: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub pagada: bool,
    #[serde(default)]
    pub vencida: bool,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        if self.pagada {
            InvoiceStatus::Paid
        } else if self.vencida {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Pending
        }
    }
}

/// A downloaded invoice document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl InvoicePdf {
    pub fn new(invoice_id: u64, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("invoice-{}.pdf", invoice_id),
            bytes,
        }
    }

    /// Write the document into `dir`, returning the file path.
    pub async fn write_to(&self, dir: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Draft invoice for a customer; numbering and taxes are assigned server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewInvoice {
    #[serde(rename = "codcliente")]
    pub customer_code: String,
    pub fecha: String,
    pub total: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub observaciones: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvoicesEnvelope {
    #[serde(rename = "beplyData", default)]
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvoiceEnvelope {
    #[serde(rename = "beplyData")]
    pub invoice: Invoice,
}
