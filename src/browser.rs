//! Browser collaborator — tab lookup, force-navigate and close
//!
//! The guard only issues commands through [`Browser`]. Every command is
//! best-effort: an error means the tab already moved on or closed, and the
//! caller treats it as a no-op.

use crate::error::{GuardError, Result};
use crate::types::TabId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Commands the guard can issue to the browser
#[async_trait]
pub trait Browser: Send + Sync {
    /// Current URL of a tab, when the browser knows it
    async fn tab_url(&self, tab_id: TabId) -> Result<Option<String>>;

    /// Navigate a tab to `url`
    async fn navigate(&self, tab_id: TabId, url: &str) -> Result<()>;

    /// Close a tab
    async fn close_tab(&self, tab_id: TabId) -> Result<()>;
}

/// A command recorded by [`MemoryBrowser`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    Navigate { tab_id: TabId, url: String },
    Close { tab_id: TabId },
}

/// In-memory browser for tests and replay
///
/// Tracks open tabs and records every successful command in order.
/// Commands against unknown tabs fail with `TabNotFound`.
#[derive(Default)]
pub struct MemoryBrowser {
    tabs: Mutex<HashMap<TabId, String>>,
    commands: Mutex<Vec<BrowserCommand>>,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open tab showing `url`
    pub fn open_tab(&self, tab_id: TabId, url: impl Into<String>) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(tab_id, url.into());
        }
    }

    /// Forget a tab without recording a command (user closed it)
    pub fn drop_tab(&self, tab_id: TabId) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.remove(&tab_id);
        }
    }

    pub fn is_open(&self, tab_id: TabId) -> bool {
        self.tabs
            .lock()
            .map(|tabs| tabs.contains_key(&tab_id))
            .unwrap_or(false)
    }

    /// Commands issued so far, oldest first
    pub fn commands(&self) -> Vec<BrowserCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    fn push(&self, command: BrowserCommand) -> Result<()> {
        let mut commands = self.commands.lock().map_err(|e| GuardError::Browser {
            op: "record",
            tab_id: -1,
            reason: e.to_string(),
        })?;
        commands.push(command);
        Ok(())
    }
}

#[async_trait]
impl Browser for MemoryBrowser {
    async fn tab_url(&self, tab_id: TabId) -> Result<Option<String>> {
        let tabs = self.tabs.lock().map_err(|e| GuardError::Browser {
            op: "tab_url",
            tab_id,
            reason: e.to_string(),
        })?;
        tabs.get(&tab_id)
            .map(|url| Some(url.clone()))
            .ok_or(GuardError::TabNotFound(tab_id))
    }

    async fn navigate(&self, tab_id: TabId, url: &str) -> Result<()> {
        {
            let mut tabs = self.tabs.lock().map_err(|e| GuardError::Browser {
                op: "navigate",
                tab_id,
                reason: e.to_string(),
            })?;
            let current = tabs.get_mut(&tab_id).ok_or(GuardError::TabNotFound(tab_id))?;
            *current = url.to_string();
        }

        self.push(BrowserCommand::Navigate {
            tab_id,
            url: url.to_string(),
        })
    }

    async fn close_tab(&self, tab_id: TabId) -> Result<()> {
        {
            let mut tabs = self.tabs.lock().map_err(|e| GuardError::Browser {
                op: "close_tab",
                tab_id,
                reason: e.to_string(),
            })?;
            tabs.remove(&tab_id).ok_or(GuardError::TabNotFound(tab_id))?;
        }

        self.push(BrowserCommand::Close { tab_id })
    }
}
