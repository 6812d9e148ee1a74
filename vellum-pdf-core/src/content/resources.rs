//! Copy-on-write access to a page's resource dictionary

use crate::document::Document;
use crate::error::{Result, StructuralError};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::page_tree::page_node;

/// Effective resources of one page. Reads see inherited and shared entries;
/// [`PageResources::insert`] gives the page private copies before writing.
pub(crate) struct PageResources {
    page: ObjectId,
    resources: Dictionary,
}

impl PageResources {
    pub fn load(doc: &Document, page: ObjectId) -> Result<Self> {
        let node = page_node(doc, page)?;
        if !node.dictionary.has_type("Page") {
            return Err(StructuralError::InvalidPageNode(page).into());
        }
        Ok(Self {
            page,
            resources: node.resources,
        })
    }

    /// A resolved copy of one category such as `Font`.
    fn category(&self, doc: &Document, category: &str) -> Dictionary {
        self.resources
            .get(category)
            .and_then(|value| doc.resolve_dict(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Name of the first entry in `category` whose resolved value satisfies `matches`.
    pub fn find(&self, doc: &Document, category: &str, matches: impl Fn(&Object) -> bool) -> Option<String> {
        let entries = self.category(doc, category);
        entries
            .sorted_entries()
            .into_iter()
            .find(|(_, value)| matches(value) || matches(doc.resolve(value)))
            .map(|(name, _)| name.clone())
    }

    /// Adds `value` under a fresh name derived from `base` and stores the
    /// page's own copy of its resources.
    pub fn insert(&mut self, doc: &mut Document, category: &str, base: &str, value: Object) -> Result<String> {
        let mut entries = self.category(doc, category);
        let name = unique_name(&entries, base);
        entries.set(name.clone(), value);
        self.resources.set(category, entries);

        let page = doc
            .get_mut(self.page)
            .and_then(Object::as_dict_mut)
            .ok_or(StructuralError::InvalidPageNode(self.page))?;
        page.set("Resources", self.resources.clone());
        Ok(name)
    }
}

/// `base` if unused, otherwise `base` followed by the smallest free counter.
pub(crate) fn unique_name(dict: &Dictionary, base: &str) -> String {
    if !dict.contains_key(base) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !dict.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_tree::create_page;

    #[test]
    fn test_unique_name() {
        let mut dict = Dictionary::new();
        assert_eq!(unique_name(&dict, "Im"), "Im");
        dict.set("Im", Object::Null);
        dict.set("Im1", Object::Null);
        assert_eq!(unique_name(&dict, "Im"), "Im2");
    }

    #[test]
    fn test_shared_resources_not_touched() {
        let mut doc = Document::new();
        let a = create_page(&mut doc, [0.0, 0.0, 100.0, 100.0], None).unwrap();
        let b = create_page(&mut doc, [0.0, 0.0, 100.0, 100.0], None).unwrap();
        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Null);
        let mut shared = Dictionary::new();
        shared.set("Font", fonts);
        let shared = doc.add_object(shared);
        for page in [a, b] {
            doc.get_mut(page).unwrap().as_dict_mut().unwrap().set("Resources", shared);
        }

        let mut resources = PageResources::load(&doc, a).unwrap();
        let name = resources.insert(&mut doc, "Font", "F1", Object::Integer(1)).unwrap();
        assert_eq!(name, "F11");

        let page_a = doc.get(a).unwrap().as_dict().unwrap();
        let own = page_a.get_dict("Resources").unwrap().get_dict("Font").unwrap();
        assert!(own.contains_key("F1") && own.contains_key("F11"));
        let page_b = doc.get(b).unwrap().as_dict().unwrap();
        assert_eq!(page_b.get_reference("Resources"), Some(shared));
        assert_eq!(doc.get(shared).unwrap().as_dict().unwrap().get_dict("Font").unwrap().len(), 1);
    }

    #[test]
    fn test_find_resolves_entries() {
        let mut doc = Document::new();
        let page = create_page(&mut doc, [0.0, 0.0, 100.0, 100.0], None).unwrap();
        let image = doc.add_object(Object::Integer(7));
        let mut resources = PageResources::load(&doc, page).unwrap();
        resources.insert(&mut doc, "XObject", "Im", image.into()).unwrap();

        let reloaded = PageResources::load(&doc, page).unwrap();
        assert_eq!(reloaded.find(&doc, "XObject", |v| v.as_reference() == Some(image)), Some("Im".to_string()));
        assert_eq!(reloaded.find(&doc, "XObject", |v| v.as_integer() == Some(7)), Some("Im".to_string()));
        assert_eq!(reloaded.find(&doc, "Font", |_| true), None);
    }
}
