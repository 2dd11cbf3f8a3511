//! Support tickets.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{
    NewResponse, NewTicket, ResponseEnvelope, Ticket, TicketEnvelope, TicketStatus,
    TicketStatusChange, TicketsEnvelope,
};

pub struct TicketStore {
    ctx: StoreContext,
    tickets: RwLock<Vec<Ticket>>,
    status: StoreStatus,
}

impl TicketStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            tickets: RwLock::new(Vec::new()),
            status: StoreStatus::default(),
        }
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.tickets.read().await.clone()
    }

    pub async fn tickets_by_user(&self, username: &str) -> Vec<Ticket> {
        self.tickets
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == username)
            .cloned()
            .collect()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /tickets
    pub async fn fetch_tickets(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load tickets.", |api, token| async move {
                api.get::<TicketsEnvelope>("/tickets", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                *self.tickets.write().await = envelope.tickets;
                true
            }
            None => false,
        }
    }

    /// POST /tickets
    pub async fn create_ticket(&self, title: &str, description: &str) -> Option<Ticket> {
        if title.trim().is_empty() {
            self.status
                .reject(StoreError::Validation("Title is required".to_string()))
                .await;
            return None;
        }

        let body = NewTicket { title, description };
        let ticket = self
            .ctx
            .call(&self.status, "Could not open the ticket.", |api, token| {
                let body = &body;
                async move {
                    api.post::<_, TicketEnvelope>("/tickets", Some(&token), body)
                        .await
                }
            })
            .await?
            .ticket;

        tracing::info!("Opened ticket {}", ticket.id);
        self.tickets.write().await.push(ticket.clone());
        Some(ticket)
    }

    /// POST /tickets/{id}/responses
    pub async fn add_response(&self, ticket_id: u64, message: &str) -> bool {
        if message.trim().is_empty() {
            self.status
                .reject(StoreError::Validation("Message is required".to_string()))
                .await;
            return false;
        }

        let path = format!("/tickets/{}/responses", ticket_id);
        let body = NewResponse { message };
        let result = self
            .ctx
            .call(&self.status, "Could not send the reply.", |api, token| {
                let (path, body) = (&path, &body);
                async move {
                    api.post::<_, ResponseEnvelope>(path, Some(&token), body)
                        .await
                }
            })
            .await;

        let Some(envelope) = result else {
            return false;
        };
        if let Some(ticket) = self
            .tickets
            .write()
            .await
            .iter_mut()
            .find(|t| t.id == ticket_id)
        {
            ticket.responses.push(envelope.response);
        }
        true
    }

    /// PUT /tickets/{id} - move a ticket to `next`.
    pub async fn update_ticket_status(&self, ticket_id: u64, next: TicketStatus) -> bool {
        let current = self
            .tickets
            .read()
            .await
            .iter()
            .find(|t| t.id == ticket_id)
            .map(|t| t.status);

        if let Some(current) = current {
            if !current.can_transition_to(next) {
                self.status
                    .reject(StoreError::Validation(format!(
                        "A {} ticket cannot become {}.",
                        current.as_str(),
                        next.as_str()
                    )))
                    .await;
                return false;
            }
        }

        let path = format!("/tickets/{}", ticket_id);
        let change = TicketStatusChange { status: next };
        let confirmed = self
            .ctx
            .call(&self.status, "Could not update the ticket.", |api, token| {
                let (path, change) = (&path, &change);
                async move {
                    api.send_unit(reqwest::Method::PUT, path, Some(&token), Some(change))
                        .await
                }
            })
            .await
            .is_some();

        if confirmed {
            if let Some(ticket) = self
                .tickets
                .write()
                .await
                .iter_mut()
                .find(|t| t.id == ticket_id)
            {
                ticket.status = next;
            }
        }
        confirmed
    }

    pub(crate) async fn reset(&self) {
        self.tickets.write().await.clear();
        self.status.reset().await;
    }
}
