//! Keyed collection of contexts with one active selection
//!
//! Every mutation is written through to storage before it becomes visible:
//! the new state is built on a copy, saved, and only then swapped in. A
//! failed save leaves the catalogue as it was.

use std::collections::BTreeMap;

use super::storage::{CatalogueData, JsonStorage, Storage};
use super::Context;
use crate::error::{Error, Result};

pub struct ContextCatalogue<S: Storage = JsonStorage> {
    contexts: BTreeMap<String, Context>,
    current: Option<String>,
    storage: S,
}

impl<S: Storage> ContextCatalogue<S> {
    /// Load the catalogue, initializing empty storage on first run.
    pub fn open(mut storage: S) -> Result<Self> {
        match storage.ensure_exists() {
            Ok(()) => {}
            Err(Error::EmptyStorage(_)) => {
                tracing::info!("No context storage yet, creating an empty catalogue");
                storage.init_storage(&CatalogueData::default())?;
            }
            Err(e) => return Err(e),
        }

        let data = storage.load()?;
        validate(&data)?;

        Ok(Self {
            contexts: data.cat,
            current: data.current,
            storage,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Insert or overwrite by name.
    pub fn add(&mut self, ctx: Context) -> Result<()> {
        let name = ctx.name.clone();
        let mut next = self.snapshot();
        next.cat.insert(name.clone(), ctx);
        self.commit(next)?;
        tracing::info!("Context '{}' added to the catalogue", name);
        Ok(())
    }

    pub fn switch(&mut self, name: &str) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(self.not_found(name));
        }
        let mut next = self.snapshot();
        next.current = Some(name.to_string());
        self.commit(next)?;
        tracing::info!("Current context set to '{}'", name);
        Ok(())
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Copy of the active context.
    pub fn current_context(&self) -> Result<Context> {
        self.current
            .as_ref()
            .and_then(|name| self.contexts.get(name))
            .cloned()
            .ok_or_else(|| Error::NoActiveSession {
                available: self.list_available(),
            })
    }

    /// Copy of the named context; changes to it are not seen until passed
    /// back through [`add`](Self::add) or [`edit`](Self::edit).
    pub fn get(&self, name: &str) -> Result<Context> {
        self.contexts
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    /// The active context must be switched away from first.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(self.not_found(name));
        }
        if self.current.as_deref() == Some(name) {
            return Err(Error::ActiveContext(name.to_string()));
        }
        let mut next = self.snapshot();
        next.cat.remove(name);
        self.commit(next)?;
        tracing::info!("Context '{}' deleted", name);
        Ok(())
    }

    /// Replace `name` with `ctx`, which may carry a new name. The active
    /// selection follows a rename.
    pub fn edit(&mut self, name: &str, ctx: Context) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(self.not_found(name));
        }
        if ctx.name != name && self.contexts.contains_key(&ctx.name) {
            return Err(Error::ContextExists(ctx.name));
        }

        let mut next = self.snapshot();
        next.cat.remove(name);
        if next.current.as_deref() == Some(name) {
            next.current = Some(ctx.name.clone());
        }
        let new_name = ctx.name.clone();
        next.cat.insert(new_name.clone(), ctx);
        self.commit(next)?;

        if new_name == name {
            tracing::info!("Context '{}' updated", name);
        } else {
            tracing::info!("Context '{}' updated and renamed to '{}'", name, new_name);
        }
        Ok(())
    }

    /// Deep copy of `source` stored under `new_name`.
    pub fn duplicate(&mut self, source: &str, new_name: &str) -> Result<()> {
        let mut copy = self.get(source)?;
        if self.contexts.contains_key(new_name) {
            return Err(Error::ContextExists(new_name.to_string()));
        }
        copy.name = new_name.to_string();
        self.add(copy)
    }

    /// Remove every context and the active selection.
    pub fn purge(&mut self) -> Result<()> {
        self.storage.clear()?;
        self.contexts.clear();
        self.current = None;
        tracing::info!("Context catalogue purged");
        Ok(())
    }

    pub fn list_all(&self) -> Vec<Context> {
        self.contexts.values().cloned().collect()
    }

    pub fn list_available(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    fn snapshot(&self) -> CatalogueData {
        CatalogueData {
            current: self.current.clone(),
            cat: self.contexts.clone(),
        }
    }

    fn commit(&mut self, next: CatalogueData) -> Result<()> {
        self.storage.save(&next)?;
        self.contexts = next.cat;
        self.current = next.current;
        Ok(())
    }

    fn not_found(&self, name: &str) -> Error {
        Error::ContextNotFound {
            name: name.to_string(),
            available: self.list_available(),
        }
    }
}

fn validate(data: &CatalogueData) -> Result<()> {
    let invalid = |reason: String| Error::InvalidFileLayout {
        location: "context catalogue".to_string(),
        reason,
    };

    if let Some((key, ctx)) = data.cat.iter().find(|(key, ctx)| **key != ctx.name) {
        return Err(invalid(format!(
            "entry '{key}' holds a context named '{}'",
            ctx.name
        )));
    }
    match &data.current {
        Some(current) if !data.cat.contains_key(current) => Err(invalid(format!(
            "current context '{current}' is not in the catalogue"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthType;
    use crate::context::MemoryStorage;

    fn ctx(name: &str) -> Context {
        Context::new(
            name,
            format!("{name}_client"),
            format!("{name}_realm"),
            format!("{name}_scope"),
            format!("{name}_region"),
            format!("https://{name}.identity.server"),
            AuthType::OpenId,
        )
    }

    fn catalogue() -> ContextCatalogue<MemoryStorage> {
        ContextCatalogue::open(MemoryStorage::default()).unwrap()
    }

    /// Storage that refuses every write.
    struct ReadOnly(CatalogueData);

    impl Storage for ReadOnly {
        fn ensure_exists(&self) -> Result<()> {
            Ok(())
        }
        fn init_storage(&mut self, _: &CatalogueData) -> Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
        }
        fn save(&mut self, _: &CatalogueData) -> Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
        }
        fn load(&self) -> Result<CatalogueData> {
            Ok(self.0.clone())
        }
        fn clear(&mut self) -> Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
        }
    }

    #[test]
    fn test_open_initializes_empty_storage() {
        let cat = catalogue();
        assert!(cat.list_available().is_empty());
        assert_eq!(cat.current_name(), None);
        assert_eq!(cat.storage().data(), Some(&CatalogueData::default()));
        assert_eq!(cat.storage().saves(), 0);
    }

    #[test]
    fn test_open_rejects_dangling_current() {
        let data = CatalogueData {
            current: Some("gone".into()),
            cat: BTreeMap::new(),
        };
        let err = ContextCatalogue::open(MemoryStorage::with_data(data)).err().unwrap();
        assert!(matches!(err, Error::InvalidFileLayout { .. }));
    }

    #[test]
    fn test_open_rejects_mismatched_keys() {
        let data = CatalogueData {
            current: None,
            cat: BTreeMap::from([("a".to_string(), ctx("b"))]),
        };
        assert!(ContextCatalogue::open(MemoryStorage::with_data(data)).is_err());
    }

    #[test]
    fn test_add_persists_immediately() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();

        assert_eq!(cat.list_available(), vec!["test".to_string()]);
        assert_eq!(cat.storage().saves(), 1);
        assert_eq!(cat.storage().data().unwrap().cat["test"], ctx("test"));
    }

    #[test]
    fn test_add_overwrites_by_name() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        let mut changed = ctx("test");
        changed.region = "WAW3-2".into();
        cat.add(changed.clone()).unwrap();

        assert_eq!(cat.list_all(), vec![changed]);
        assert_eq!(cat.storage().saves(), 2);
    }

    #[test]
    fn test_get_returns_copy() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();

        let mut copy = cat.get("test").unwrap();
        assert_eq!(copy, ctx("test"));
        copy.api_key = Some("changed".into());
        assert_eq!(cat.get("test").unwrap().api_key, None);
    }

    #[test]
    fn test_get_missing() {
        let cat = catalogue();
        assert!(matches!(
            cat.get("non_existent_context"),
            Err(Error::ContextNotFound { .. })
        ));
    }

    #[test]
    fn test_switch() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        cat.add(ctx("test2")).unwrap();
        cat.switch("test2").unwrap();

        assert_eq!(cat.current_name(), Some("test2"));
        assert_eq!(cat.current_context().unwrap().name, "test2");
        assert_eq!(cat.storage().saves(), 3);
        assert_eq!(
            cat.storage().data().unwrap().current.as_deref(),
            Some("test2")
        );
    }

    #[test]
    fn test_switch_to_missing_keeps_current() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        cat.switch("test").unwrap();

        let err = cat.switch("non_existent_context").unwrap_err();
        match err {
            Error::ContextNotFound { name, available } => {
                assert_eq!(name, "non_existent_context");
                assert_eq!(available, vec!["test".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cat.current_name(), Some("test"));
        assert_eq!(cat.storage().saves(), 2);
    }

    #[test]
    fn test_current_context_without_selection() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        assert!(matches!(
            cat.current_context(),
            Err(Error::NoActiveSession { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        cat.add(ctx("test2")).unwrap();
        cat.switch("test2").unwrap();

        cat.delete("test").unwrap();
        assert!(!cat.contains("test"));
        assert_eq!(cat.list_available().len(), 1);
        assert_eq!(cat.storage().saves(), 4);
    }

    #[test]
    fn test_delete_active_is_rejected() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        cat.switch("test").unwrap();

        assert!(matches!(cat.delete("test"), Err(Error::ActiveContext(_))));
        assert!(cat.contains("test"));
        assert_eq!(cat.current_name(), Some("test"));
        assert_eq!(cat.storage().saves(), 2);
    }

    #[test]
    fn test_delete_missing() {
        let mut cat = catalogue();
        assert!(matches!(
            cat.delete("nope"),
            Err(Error::ContextNotFound { .. })
        ));
    }

    #[test]
    fn test_edit_in_place() {
        let mut cat = catalogue();
        cat.add(ctx("test")).unwrap();
        let mut updated = cat.get("test").unwrap();
        updated.api_key = Some("key".into());

        cat.edit("test", updated).unwrap();
        assert_eq!(cat.get("test").unwrap().api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_edit_rename_follows_active_selection() {
        let mut cat = catalogue();
        cat.add(ctx("old")).unwrap();
        cat.switch("old").unwrap();

        let mut renamed = cat.get("old").unwrap();
        renamed.name = "new".into();
        cat.edit("old", renamed).unwrap();

        assert!(!cat.contains("old"));
        assert_eq!(cat.current_name(), Some("new"));
        assert_eq!(cat.current_context().unwrap().client_id, "old_client");
    }

    #[test]
    fn test_edit_rename_onto_existing_is_rejected() {
        let mut cat = catalogue();
        cat.add(ctx("a")).unwrap();
        cat.add(ctx("b")).unwrap();

        let mut renamed = cat.get("a").unwrap();
        renamed.name = "b".into();
        assert!(matches!(cat.edit("a", renamed), Err(Error::ContextExists(_))));
        assert_eq!(cat.get("b").unwrap(), ctx("b"));
        assert_eq!(cat.get("a").unwrap(), ctx("a"));
    }

    #[test]
    fn test_duplicate() {
        let mut cat = catalogue();
        let mut original = ctx("test");
        original.api_key = Some("secret".into());
        cat.add(original).unwrap();

        cat.duplicate("test", "copy").unwrap();
        let copy = cat.get("copy").unwrap();
        assert_eq!(copy.name, "copy");
        assert_eq!(copy.api_key.as_deref(), Some("secret"));
        assert_eq!(copy.client_id, "test_client");

        assert!(matches!(
            cat.duplicate("test", "copy"),
            Err(Error::ContextExists(_))
        ));
        assert!(matches!(
            cat.duplicate("missing", "other"),
            Err(Error::ContextNotFound { .. })
        ));
    }

    #[test]
    fn test_purge() {
        let mut cat = catalogue();
        cat.add(ctx("a")).unwrap();
        cat.add(ctx("b")).unwrap();
        cat.switch("a").unwrap();

        cat.purge().unwrap();
        assert!(cat.list_available().is_empty());
        assert!(matches!(
            cat.current_context(),
            Err(Error::NoActiveSession { .. })
        ));
        assert_eq!(cat.storage().data(), Some(&CatalogueData::default()));
    }

    #[test]
    fn test_failed_save_leaves_catalogue_unchanged() {
        let mut cat = ContextCatalogue::open(ReadOnly(CatalogueData {
            current: Some("a".into()),
            cat: BTreeMap::from([("a".to_string(), ctx("a"))]),
        }))
        .unwrap();

        assert!(cat.add(ctx("b")).is_err());
        assert!(cat.switch("a").is_err());
        assert!(cat.purge().is_err());
        assert_eq!(cat.list_available(), vec!["a".to_string()]);
        assert_eq!(cat.current_name(), Some("a"));
    }
}
