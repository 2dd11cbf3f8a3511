//! Dashboard statistics.

use serde::{Deserialize, Serialize};

/// Headline counters for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "clientesTotales")]
    pub total_clients: u64,
    #[serde(rename = "ticketsActivos")]
    pub active_tickets: u64,
    #[serde(rename = "ingresosNetos")]
    pub net_revenue: f64,
    #[serde(rename = "comisionesTotales")]
    pub total_commissions: f64,
    #[serde(rename = "comisionesPorcentaje")]
    pub commission_percentage: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsEnvelope {
    pub stats: Stats,
}
