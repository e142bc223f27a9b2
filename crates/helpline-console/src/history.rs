//! Call list, record updates, CSV export and pending telephony events.

use std::sync::Arc;

use helpline_client::{Gateway, SessionContext};
use helpline_core::{
    Action, CallEvent, CallEventId, CallFilter, CallId, CallPatch, CallRecord, CallStats,
};

use crate::entry::Redirect;
use crate::error::{require, FlowError, Result};

/// Read and maintain logged calls.
#[derive(Clone)]
pub struct CallHistory {
    gateway: Arc<dyn Gateway>,
    session: SessionContext,
}

impl std::fmt::Debug for CallHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHistory")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl CallHistory {
    /// Create the flow.
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionContext) -> Self {
        Self { gateway, session }
    }

    /// Calls matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn list(&self, filter: &CallFilter) -> Result<Vec<CallRecord>> {
        require(&self.session, Action::ViewCalls)?;
        self.gateway
            .list_calls(filter)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load calls"))
    }

    /// One call record.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn get(&self, id: &CallId) -> Result<CallRecord> {
        require(&self.session, Action::ViewCalls)?;
        self.gateway
            .get_call(id)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load call"))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` for an empty patch, or
    /// `FlowError::Remote` if the request failed.
    pub async fn update(&self, id: &CallId, patch: &CallPatch) -> Result<CallRecord> {
        require(&self.session, Action::UpdateCall)?;
        if patch.is_empty() {
            return Err(FlowError::validation("Nothing to update"));
        }
        let call = self
            .gateway
            .update_call(id, patch)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to update call"))?;
        tracing::info!(call_id = %id, status = %call.status, "Call updated");
        Ok(call)
    }

    /// CSV export of calls matching `filter`. The search text is not applied.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Forbidden` for agents, or `FlowError::Remote`.
    pub async fn export_csv(&self, filter: &CallFilter) -> Result<Vec<u8>> {
        require(&self.session, Action::ExportCalls)?;
        let csv = self
            .gateway
            .export_calls_csv(filter)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to export calls"))?;
        tracing::debug!(bytes = csv.len(), "Calls exported");
        Ok(csv)
    }

    /// Aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn stats(&self) -> Result<CallStats> {
        require(&self.session, Action::ViewCalls)?;
        self.gateway
            .call_stats()
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load call statistics"))
    }

    /// Telephony events waiting to be logged.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn pending_events(&self) -> Result<Vec<CallEvent>> {
        require(&self.session, Action::ViewTelephonyEvents)?;
        self.gateway
            .pending_events()
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load pending calls"))
    }

    /// A telephony event and the screen it leads to.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn event(&self, id: &CallEventId) -> Result<(CallEvent, Redirect)> {
        require(&self.session, Action::ViewTelephonyEvents)?;
        let event = self
            .gateway
            .get_event(id)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load call event"))?;
        let redirect = Redirect::for_event(&event);
        Ok((event, redirect))
    }
}
