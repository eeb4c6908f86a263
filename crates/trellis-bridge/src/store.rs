//! Collaborator seams: identifier persistence and page materialization.
//!
//! Long-term storage is owned by the agent side; this process only ever
//! reads prior identifiers and captured pages. The in-memory
//! implementations back tests and local runs.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use trellis_core::{PageType, Structure};
use trellis_dom::Page;

/// Read access to previously trained identifiers, keyed by platform.
pub trait IdentifierStore {
    fn load_identifiers(&self, platform_url: &str) -> Result<BTreeMap<PageType, Structure>>;
}

/// Resolves an agent-supplied page reference to the captured page.
pub trait PageFetcher {
    fn fetch(&self, page_ref: &str) -> Result<Page>;
}

// ── In-memory implementations ──

#[derive(Debug, Default)]
pub struct MemoryStore {
    platforms: BTreeMap<String, BTreeMap<PageType, Structure>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, platform_url: &str, structure: Structure) {
        self.platforms
            .entry(platform_url.to_string())
            .or_default()
            .insert(structure.page_type, structure);
    }
}

impl IdentifierStore for MemoryStore {
    fn load_identifiers(&self, platform_url: &str) -> Result<BTreeMap<PageType, Structure>> {
        Ok(self.platforms.get(platform_url).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: BTreeMap<String, Page>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page_ref: &str, page: Page) {
        self.pages.insert(page_ref.to_string(), page);
    }
}

impl PageFetcher for MemoryFetcher {
    fn fetch(&self, page_ref: &str) -> Result<Page> {
        match self.pages.get(page_ref) {
            Some(page) => Ok(page.clone()),
            None => bail!("unknown page reference: {page_ref:?}"),
        }
    }
}
