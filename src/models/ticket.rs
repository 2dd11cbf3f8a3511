//! Support ticket model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Open, TicketStatus::InProgress)
                | (TicketStatus::Open, TicketStatus::Resolved)
                | (TicketStatus::InProgress, TicketStatus::Resolved)
        )
    }
}

/// A message posted on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub id: u64,
    pub ticket_id: u64,
    pub user_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A support request opened by a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: u64,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub responses: Vec<TicketResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewTicket<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewResponse<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TicketStatusChange {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TicketsEnvelope {
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TicketEnvelope {
    pub ticket: Ticket,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    pub response: TicketResponse,
}
