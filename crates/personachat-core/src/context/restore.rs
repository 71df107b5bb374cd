use crate::context::persistence::HistoryStore;
use crate::context::transcript::SessionSnapshot;

/// Offers the previous session for resumption at startup.
pub struct SessionRestorer<'a> {
    store: &'a HistoryStore,
}

impl<'a> SessionRestorer<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self { store }
    }

    /// The last saved session, if it has both a preset and at least one turn.
    pub fn candidate(&self) -> Option<SessionSnapshot> {
        self.store
            .load()
            .filter(|s| !s.preset_name.is_empty() && !s.history.is_empty())
    }

    /// Patch the persona text into an accepted candidate and persist the
    /// result, so the history file carries the current system prompt too.
    ///
    /// Without a prompt the stored persona is kept and nothing is re-saved.
    pub fn restore(
        &self,
        mut snapshot: SessionSnapshot,
        system_prompt: Option<&str>,
    ) -> SessionSnapshot {
        let Some(system_prompt) = system_prompt else {
            tracing::debug!("No system prompt supplied, keeping the stored persona");
            return snapshot;
        };
        snapshot.replace_system_prompt(system_prompt);
        if let Err(e) = self.store.save_snapshot(&snapshot) {
            tracing::warn!("Restored session could not be re-saved: {}", e);
        }
        snapshot
    }

    /// `candidate` + user confirmation + `restore`. `None` means start fresh.
    ///
    /// Synchronous confirmation only; an interactive caller that has to await
    /// the answer calls `candidate` and `restore` itself.
    pub fn try_restore<F>(
        &self,
        system_prompt: Option<&str>,
        confirm: F,
    ) -> Option<SessionSnapshot>
    where
        F: FnOnce(&SessionSnapshot) -> bool,
    {
        let snapshot = self.candidate()?;
        if !confirm(&snapshot) {
            tracing::debug!("Previous session for '{}' declined", snapshot.preset_name);
            return None;
        }
        Some(self.restore(snapshot, system_prompt))
    }
}
