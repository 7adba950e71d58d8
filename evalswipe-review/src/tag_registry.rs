//! Read-through cache of the global tag library, in insertion order

use crate::models::AxialTag;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRegistry {
    tags: Vec<AxialTag>,
}

impl TagRegistry {
    pub fn new(tags: Vec<AxialTag>) -> Self {
        let mut registry = Self::default();
        for tag in tags {
            registry.upsert(tag);
        }
        registry
    }

    /// Insert a tag, or replace the one with the same id in place
    pub fn upsert(&mut self, tag: AxialTag) {
        match self.tags.iter_mut().find(|existing| existing.id == tag.id) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AxialTag> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &[AxialTag] {
        &self.tags
    }

    pub fn remove(&mut self, id: &str) -> Option<AxialTag> {
        let position = self.tags.iter().position(|tag| tag.id == id)?;
        Some(self.tags.remove(position))
    }

    /// Replace the cache with a fresh listing from the backend
    pub fn replace_all(&mut self, tags: Vec<AxialTag>) {
        *self = Self::new(tags);
    }

    /// Display name for a tag id, falling back to the raw id for stale references
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|tag| tag.name.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str, name: &str) -> AxialTag {
        AxialTag {
            id: id.to_string(),
            name: name.to_string(),
            description: "A description that is long enough".to_string(),
            color: "#808080".to_string(),
            usage_count: 0,
            examples: Vec::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_all_keeps_insertion_order() {
        let mut registry = TagRegistry::default();
        registry.upsert(tag("tag_b", "Zeta"));
        registry.upsert(tag("tag_a", "Alpha"));

        let ids: Vec<&str> = registry.all().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tag_b", "tag_a"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = TagRegistry::new(vec![tag("tag_a", "Alpha"), tag("tag_b", "Beta")]);
        registry.upsert(tag("tag_a", "Alpha v2"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].name, "Alpha v2");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let registry = TagRegistry::new(vec![tag("tag_a", "Alpha")]);
        assert_eq!(registry.display_name("tag_a"), "Alpha");
        assert_eq!(registry.display_name("tag_gone"), "tag_gone");
    }

    #[test]
    fn test_remove() {
        let mut registry = TagRegistry::new(vec![tag("tag_a", "Alpha")]);
        assert!(registry.remove("tag_a").is_some());
        assert!(registry.remove("tag_a").is_none());
        assert!(registry.is_empty());
    }
}
