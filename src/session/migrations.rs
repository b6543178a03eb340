use sqlx::migrate::Migrator;
use std::collections::HashMap;

/// Migration sets keyed by provider identifier.
///
/// Every provider only ever applies the set registered under its own identifier, so the
/// scripts written for one backend are never run against another.
#[derive(Default)]
pub struct MigrationCatalog {
    sets: HashMap<String, Migrator>,
}

impl MigrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider_id: impl Into<String>, migrator: Migrator) -> &mut Self {
        self.sets.insert(provider_id.into(), migrator);
        self
    }

    pub fn for_provider(&self, provider_id: &str) -> Option<&Migrator> {
        self.sets.get(provider_id)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
