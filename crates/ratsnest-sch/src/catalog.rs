//! The parts-library boundary.
//!
//! The core never inspects where templates come from; anything that can map
//! a `(library, name)` pair to a [`PartTemplate`] can back a build — an
//! embedded table, a file-based library, or a network service.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{LibRef, PartTemplate, SchError};

/// Injected lookup capability resolving a `(library, name)` pair to a part
/// template. Read-only, no side effects.
pub trait Catalog {
    fn resolve(&self, library: &str, name: &str) -> Result<Arc<PartTemplate>, SchError>;
}

/// In-memory catalog backed by a plain table, for embedded part libraries
/// and tests.
#[derive(Debug, Default)]
pub struct TableCatalog {
    parts: HashMap<LibRef, Arc<PartTemplate>>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a template under its own `lib_ref`, returning a
    /// mutable reference for chaining.
    pub fn insert(&mut self, template: PartTemplate) -> &mut Self {
        self.parts
            .insert(template.lib_ref.clone(), Arc::new(template));
        self
    }

    /// Names available in one library, sorted for stable listings.
    pub fn part_names(&self, library: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .parts
            .keys()
            .filter(|r| r.library == library)
            .map(|r| r.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Catalog for TableCatalog {
    fn resolve(&self, library: &str, name: &str) -> Result<Arc<PartTemplate>, SchError> {
        self.parts
            .get(&LibRef::new(library, name))
            .cloned()
            .ok_or_else(|| SchError::CatalogLookup {
                library: library.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_hit_and_miss() {
        let mut catalog = TableCatalog::new();
        catalog.insert(
            PartTemplate::new(LibRef::new("Device.lib", "C"), "C_0402")
                .with_pin("1", "1")
                .with_pin("2", "2"),
        );

        let cap = catalog.resolve("Device.lib", "C").unwrap();
        assert_eq!(cap.lib_ref.to_string(), "Device.lib:C");
        assert_eq!(cap.pins().len(), 2);

        let err = catalog.resolve("Device.lib", "R").unwrap_err();
        assert_eq!(
            err,
            SchError::CatalogLookup {
                library: "Device.lib".to_string(),
                name: "R".to_string(),
            }
        );
    }

    #[test]
    fn part_names_are_sorted_per_library() {
        let mut catalog = TableCatalog::new();
        catalog
            .insert(PartTemplate::new(LibRef::new("Device.lib", "R"), "R_0402"))
            .insert(PartTemplate::new(LibRef::new("Device.lib", "C"), "C_0402"))
            .insert(PartTemplate::new(LibRef::new("74xx.lib", "74LS138"), ""));

        assert_eq!(catalog.part_names("Device.lib"), vec!["C", "R"]);
        assert_eq!(catalog.part_names("74xx.lib"), vec!["74LS138"]);
        assert!(catalog.part_names("pmod.lib").is_empty());
    }
}
