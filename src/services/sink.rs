//! Transition sink: the single "apply transition and persist" funnel.
//!
//! Every task/phase mutation during execution goes through [`TransitionSink::apply`],
//! which writes the store strictly before the matching event is emitted. A
//! crashed consumer therefore never observes an engine state that was not
//! already durable.

use tokio::sync::mpsc;

use crate::domain::models::{ExecutionEvent, SessionState};
use crate::domain::EngineResult;
use crate::store::SessionStore;

pub struct TransitionSink<'a> {
    store: &'a SessionStore,
    state: &'a mut SessionState,
    events: Option<mpsc::Sender<ExecutionEvent>>,
}

impl<'a> TransitionSink<'a> {
    pub fn new(
        store: &'a SessionStore,
        state: &'a mut SessionState,
        events: Option<mpsc::Sender<ExecutionEvent>>,
    ) -> Self {
        Self { store, state, events }
    }

    pub fn state(&self) -> &SessionState {
        self.state
    }

    /// Mutate the session, persist it, then emit the event.
    ///
    /// A persistence failure propagates before the event is sent, halting
    /// the engine rather than advancing with unpersisted state.
    pub async fn apply<F>(&mut self, mutate: F, event: Option<ExecutionEvent>) -> EngineResult<()>
    where
        F: FnOnce(&mut SessionState),
    {
        mutate(self.state);
        self.store.save(self.state).await?;
        if let Some(event) = event {
            self.emit(event).await;
        }
        Ok(())
    }

    /// Emit an event that carries no state transition (streamed output).
    /// Send errors are ignored; subscribers may have gone away.
    pub async fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
