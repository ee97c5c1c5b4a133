use rand::seq::SliceRandom;
use std::rc::Rc;
use tracing::{debug, info};

use crate::bus::{Event, EventBus};
use crate::store::{normalize_code, Snippet, SnippetId, SnippetStore, StoreError};

pub const MIN_TITLE_LEN: usize = 10;
pub const MAX_TITLE_LEN: usize = 50;
pub const MIN_CODE_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("title should be at least {} characters long", MIN_TITLE_LEN)]
    TitleTooShort,
    #[error("title should be at most {} characters long", MAX_TITLE_LEN)]
    TitleTooLong,
    #[error("code should be at least {} characters long", MIN_CODE_LEN)]
    CodeTooShort,
    #[error("no snippet with id {0}")]
    NotFound(SnippetId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validating edits over a snippet store. Every successful mutation is
/// announced on the bus.
pub struct Catalog<S: SnippetStore + ?Sized> {
    store: Rc<S>,
    bus: EventBus,
}

impl<S: SnippetStore + ?Sized> Catalog<S> {
    pub fn new(store: Rc<S>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add(&self, title: &str, code: &str) -> Result<SnippetId, CatalogError> {
        let (title, code) = validate(title, code)?;
        let id = self.store.create(&Snippet::new(title, code))?;
        self.bus.publish(Event::Added);
        Ok(id)
    }

    /// Replace title and code of `id`, keeping its practice counters
    pub fn edit(&self, id: SnippetId, title: &str, code: &str) -> Result<(), CatalogError> {
        let (title, code) = validate(title, code)?;
        let mut snippet = self.store.get(id)?.ok_or(CatalogError::NotFound(id))?;
        snippet.title = title;
        snippet.code = code;
        self.store.update(&snippet)?;
        self.bus.publish(Event::Updated(id));
        Ok(())
    }

    pub fn remove(&self, id: SnippetId) -> Result<(), CatalogError> {
        match self.store.delete(id) {
            Ok(()) => {}
            Err(StoreError::NotFound(id)) => return Err(CatalogError::NotFound(id)),
            Err(e) => return Err(e.into()),
        }
        info!(id, "snippet removed");
        self.bus.publish(Event::Deleted(id));
        Ok(())
    }
}

fn validate(title: &str, code: &str) -> Result<(String, String), CatalogError> {
    let title = title.trim();
    let title_len = title.chars().count();
    if title_len < MIN_TITLE_LEN {
        return Err(CatalogError::TitleTooShort);
    }
    if title_len > MAX_TITLE_LEN {
        return Err(CatalogError::TitleTooLong);
    }

    let code = normalize_code(code);
    if code.chars().count() < MIN_CODE_LEN {
        return Err(CatalogError::CodeTooShort);
    }

    Ok((title.to_string(), code))
}

/// A random snippet other than `current`. Needs at least two snippets to
/// choose from.
pub fn pick_random(snippets: &[Snippet], current: Option<SnippetId>) -> Option<SnippetId> {
    if snippets.len() <= 1 {
        debug!(available = snippets.len(), "not enough snippets to pick from");
        return None;
    }

    let candidates: Vec<SnippetId> = snippets
        .iter()
        .map(|s| s.id)
        .filter(|id| Some(*id) != current)
        .collect();
    candidates.choose(&mut rand::thread_rng()).copied()
}
