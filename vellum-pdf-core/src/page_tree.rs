//! Page tree navigation and editing (ISO 32000-1 Section 7.7.3)
//!
//! Pages are leaves of a tree of `Pages` nodes rooted at the catalog's
//! `/Pages` entry. `Resources`, `MediaBox`, `CropBox` and `Rotate` may be
//! inherited from ancestors. Every walk here uses an explicit stack, a visited
//! set and a depth limit, so damaged trees with cycles or absurd nesting fail
//! cleanly instead of overflowing.
//!
//! All editing functions validate their input before touching the document.

use crate::document::{CopyMap, Document};
use crate::error::{Result, StructuralError};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Deepest page tree accepted
pub const MAX_TREE_DEPTH: usize = 128;

/// Keys a page may inherit from its ancestors
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// US Letter, used when no `MediaBox` is found anywhere
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A leaf of the page tree and where it hangs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageSlot {
    id: ObjectId,
    parent: ObjectId,
    position: usize,
}

/// Resolved view of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    /// The page's own dictionary, without inherited entries
    pub dictionary: Dictionary,
    pub media_box: [f64; 4],
    pub crop_box: Option<[f64; 4]>,
    /// Clockwise rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotation: i32,
    /// Effective resources after inheritance, with the top level resolved
    pub resources: Dictionary,
}

impl PageNode {
    pub fn width(&self) -> f64 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    pub fn height(&self) -> f64 {
        (self.media_box[3] - self.media_box[1]).abs()
    }

    /// Ids of the content streams, in drawing order. `Contents` may be an
    /// indirect array.
    pub fn content_ids(&self, doc: &Document) -> Vec<ObjectId> {
        let items = match self.dictionary.get("Contents") {
            Some(Object::Reference(id)) => match doc.get(*id) {
                Some(Object::Array(items)) => items,
                _ => return vec![*id],
            },
            Some(Object::Array(items)) => items,
            _ => return Vec::new(),
        };
        items.iter().filter_map(Object::as_reference).collect()
    }
}

fn root_pages_id(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get_reference("Pages"))
        .ok_or_else(|| StructuralError::MissingPageTree.into())
}

fn is_intermediate(dict: &Dictionary) -> bool {
    dict.has_type("Pages") || (!dict.has_type("Page") && dict.contains_key("Kids"))
}

fn kids_of(dict: &Dictionary) -> Vec<ObjectId> {
    dict.get_array("Kids")
        .map(|kids| kids.iter().filter_map(Object::as_reference).collect())
        .unwrap_or_default()
}

/// Result of one traversal of the page tree
struct TreeWalk {
    /// Leaves in document order
    leaves: Vec<PageSlot>,
    /// Intermediate nodes, parents first
    nodes: Vec<ObjectId>,
    /// `(parent, position)` of every kid entry the traversal followed;
    /// repeated or broken entries are absent
    followed: HashSet<(ObjectId, usize)>,
}

fn walk_tree(doc: &Document) -> Result<TreeWalk> {
    let root = root_pages_id(doc)?;
    let mut leaves = Vec::new();
    let mut nodes = Vec::new();
    let mut followed = HashSet::new();
    let mut visited = HashSet::new();
    // (node, slot in parent, depth); kids are pushed in reverse to pop them in order
    let mut stack = vec![(root, None::<(ObjectId, usize)>, 0usize)];

    while let Some((id, slot, depth)) = stack.pop() {
        if depth > MAX_TREE_DEPTH {
            return Err(StructuralError::TreeTooDeep {
                limit: MAX_TREE_DEPTH,
            }
            .into());
        }
        if !visited.insert(id) {
            tracing::warn!("page tree visits {id} twice, ignoring the repeat");
            continue;
        }
        let Some(dict) = doc.get(id).and_then(Object::as_dict) else {
            tracing::warn!("page tree entry {id} is not a dictionary");
            continue;
        };
        if let Some(slot) = slot {
            followed.insert(slot);
        }

        if id == root || is_intermediate(dict) {
            nodes.push(id);
            let kids = kids_of(dict);
            for (position, kid) in kids.into_iter().enumerate().rev() {
                stack.push((kid, Some((id, position)), depth + 1));
            }
        } else if let Some((parent, position)) = slot {
            leaves.push(PageSlot {
                id,
                parent,
                position,
            });
        }
    }
    Ok(TreeWalk {
        leaves,
        nodes,
        followed,
    })
}

/// Leaves in document order plus every intermediate node, parents first.
fn walk(doc: &Document) -> Result<(Vec<PageSlot>, Vec<ObjectId>)> {
    let TreeWalk { leaves, nodes, .. } = walk_tree(doc)?;
    Ok((leaves, nodes))
}

/// Number of leaf pages, counted by walking the tree rather than trusting `/Count`.
pub fn page_count(doc: &Document) -> Result<usize> {
    Ok(walk(doc)?.0.len())
}

/// Ids of all pages in document order.
pub fn page_ids(doc: &Document) -> Result<Vec<ObjectId>> {
    Ok(walk(doc)?.0.into_iter().map(|slot| slot.id).collect())
}

fn page_id_at(doc: &Document, index: usize) -> Result<ObjectId> {
    let ids = page_ids(doc)?;
    ids.get(index).copied().ok_or_else(|| {
        StructuralError::PageIndexOutOfRange {
            index,
            count: ids.len(),
        }
        .into()
    })
}

/// Value of an inheritable attribute, looked up through `/Parent` links.
pub fn inherited_attribute(doc: &Document, page: ObjectId, key: &str) -> Option<Object> {
    let mut current = page;
    let mut seen = HashSet::new();
    while seen.insert(current) && seen.len() <= MAX_TREE_DEPTH + 1 {
        let dict = doc.get(current)?.as_dict()?;
        if let Some(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get_reference("Parent")?;
    }
    None
}

fn rectangle(doc: &Document, value: &Object) -> Option<[f64; 4]> {
    let items = doc.resolve(value).as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = doc.resolve(item).as_real()?;
    }
    Some(rect)
}

/// The page at `index` (0-based) with inherited attributes resolved.
pub fn get_page(doc: &Document, index: usize) -> Result<PageNode> {
    let id = page_id_at(doc, index)?;
    page_node(doc, id)
}

pub(crate) fn page_node(doc: &Document, id: ObjectId) -> Result<PageNode> {
    let dictionary = doc
        .get(id)
        .and_then(Object::as_dict)
        .cloned()
        .ok_or(StructuralError::InvalidPageNode(id))?;

    let media_box = inherited_attribute(doc, id, "MediaBox")
        .and_then(|value| rectangle(doc, &value))
        .unwrap_or_else(|| {
            tracing::warn!("page {id} has no usable MediaBox, assuming US Letter");
            DEFAULT_MEDIA_BOX
        });
    let crop_box = inherited_attribute(doc, id, "CropBox").and_then(|value| rectangle(doc, &value));
    let rotation = inherited_attribute(doc, id, "Rotate")
        .and_then(|value| doc.resolve(&value).as_integer())
        .map(normalize_rotation)
        .unwrap_or(0);
    let resources = inherited_attribute(doc, id, "Resources")
        .and_then(|value| doc.resolve_dict(&value).cloned())
        .unwrap_or_default();

    Ok(PageNode {
        id,
        parent: dictionary.get_reference("Parent"),
        dictionary,
        media_box,
        crop_box,
        rotation,
        resources,
    })
}

fn normalize_rotation(degrees: i64) -> i32 {
    (degrees.rem_euclid(360) / 90 * 90) as i32
}

fn validate_indices(indices: &[usize], count: usize) -> Result<()> {
    match indices.iter().find(|&&index| index >= count) {
        Some(&index) => Err(StructuralError::PageIndexOutOfRange { index, count }.into()),
        None => Ok(()),
    }
}

/// Removes the pages at `indices`. Emptied intermediate nodes are pruned and
/// `/Count` is recomputed; the page objects stay in the document as orphans.
pub fn remove_pages(doc: &mut Document, indices: &BTreeSet<usize>) -> Result<()> {
    doc.ensure_unlocked()?;
    let (leaves, _) = walk(doc)?;
    let selected: Vec<usize> = indices.iter().copied().collect();
    validate_indices(&selected, leaves.len())?;
    if selected.is_empty() {
        return Ok(());
    }
    if selected.len() >= leaves.len() {
        return Err(StructuralError::WouldRemoveAllPages.into());
    }

    let mut removed: HashMap<ObjectId, HashSet<usize>> = HashMap::new();
    for &index in &selected {
        let slot = leaves[index];
        removed.entry(slot.parent).or_default().insert(slot.position);
    }
    for (parent, positions) in removed {
        if let Some(Object::Dictionary(dict)) = doc.get_mut(parent) {
            if let Some(Object::Array(kids)) = dict.get_mut("Kids") {
                let mut position = 0;
                kids.retain(|_| {
                    let keep = !positions.contains(&position);
                    position += 1;
                    keep
                });
            }
        }
    }

    recount(doc)?;
    tracing::debug!("removed {} pages", selected.len());
    Ok(())
}

/// Recomputes `/Count` bottom-up and drops intermediate nodes left without
/// pages. Kid entries the traversal skips (repeats, non-dictionaries) are
/// dropped too, so `/Count` always matches `page_count`.
fn recount(doc: &mut Document) -> Result<()> {
    let TreeWalk { nodes, followed, .. } = walk_tree(doc)?;
    let node_set: HashSet<ObjectId> = nodes.iter().copied().collect();
    let mut counts: HashMap<ObjectId, i64> = HashMap::new();

    // `nodes` lists parents before children, so the reverse sees children first
    for &node in nodes.iter().rev() {
        let kids = match doc.get(node).and_then(Object::as_dict) {
            Some(dict) => kids_of(dict),
            None => continue,
        };
        let mut kept = Vec::with_capacity(kids.len());
        let mut total = 0;
        for (position, kid) in kids.into_iter().enumerate() {
            if !followed.contains(&(node, position)) {
                continue;
            }
            if node_set.contains(&kid) {
                let count = counts.get(&kid).copied().unwrap_or(0);
                if count == 0 {
                    continue;
                }
                total += count;
            } else {
                total += 1;
            }
            kept.push(Object::Reference(kid));
        }
        counts.insert(node, total);
        if let Some(Object::Dictionary(dict)) = doc.get_mut(node) {
            dict.set("Kids", kept);
            dict.set("Count", total);
        }
    }
    Ok(())
}

/// Copies `leaves` of `from` into `into` (not yet attached to its tree).
/// Shared resources are copied once; repeated pages get separate page objects.
fn copy_leaves(
    into: &mut Document,
    from: &Document,
    leaves: &[ObjectId],
    parent: ObjectId,
    map: &mut CopyMap,
) -> Result<Vec<ObjectId>> {
    let (all_leaves, nodes) = walk(from)?;
    for node in nodes {
        map.exclude(node);
    }
    if let Some(catalog) = from.catalog_id() {
        map.exclude(catalog);
    }
    let wanted: HashSet<ObjectId> = leaves.iter().copied().collect();
    for slot in &all_leaves {
        if !wanted.contains(&slot.id) && map.get(slot.id).is_none() {
            map.exclude(slot.id);
        }
    }
    // Map each selected page up front so links between selected pages survive
    for &leaf in leaves {
        if map.get(leaf).is_none() {
            let destination = into.add_object(Object::Null);
            map.map_to(leaf, destination);
        }
    }

    let mut first_use = HashSet::new();
    let mut copies = Vec::with_capacity(leaves.len());
    for &leaf in leaves {
        let destination = match map.get(leaf) {
            Some(id) if first_use.insert(leaf) => id,
            _ => into.add_object(Object::Null),
        };

        let mut page = from
            .get(leaf)
            .and_then(Object::as_dict)
            .cloned()
            .ok_or(StructuralError::InvalidPageNode(leaf))?;
        page.remove("Parent");
        for key in INHERITABLE {
            if !page.contains_key(key) {
                if let Some(value) = inherited_attribute(from, leaf, key) {
                    page.set(key, value);
                }
            }
        }
        page.set("Type", Object::name("Page"));

        let mut page = match map.copy_value(&Object::Dictionary(page), from, into) {
            Object::Dictionary(dict) => dict,
            _ => Dictionary::new(),
        };
        page.set("Parent", parent);
        into.set_object(destination, page);
        copies.push(destination);
    }
    Ok(copies)
}

/// New document holding copies of the pages at `indices`, in that order.
/// Indices may repeat.
pub fn extract_pages(doc: &Document, indices: &[usize]) -> Result<Document> {
    doc.ensure_unlocked()?;
    if indices.is_empty() {
        return Err(StructuralError::EmptySelection.into());
    }
    let ids = page_ids(doc)?;
    validate_indices(indices, ids.len())?;

    let mut extracted = Document::new();
    extracted.set_version(doc.version());
    let leaves: Vec<ObjectId> = indices.iter().map(|&index| ids[index]).collect();
    let mut map = CopyMap::new();
    import_leaves(&mut extracted, doc, &leaves, &mut map)?;
    Ok(extracted)
}

/// Appends copies of `leaves` to the end of `into`'s root `Pages` node.
pub(crate) fn import_leaves(
    into: &mut Document,
    from: &Document,
    leaves: &[ObjectId],
    map: &mut CopyMap,
) -> Result<Vec<ObjectId>> {
    let root = root_pages_id(into)?;
    let copies = copy_leaves(into, from, leaves, root, map)?;
    if let Some(Object::Dictionary(pages)) = into.get_mut(root) {
        let mut kids = pages.get_array("Kids").cloned().unwrap_or_default();
        kids.extend(copies.iter().map(|&id| Object::Reference(id)));
        pages.set("Kids", kids);
    }
    recount(into)?;
    Ok(copies)
}

/// Copies all pages of `from` (or those at `indices`) to the end of `into`.
pub fn import_pages(into: &mut Document, from: &Document, indices: Option<&[usize]>) -> Result<Vec<ObjectId>> {
    into.ensure_unlocked()?;
    from.ensure_unlocked()?;
    let ids = page_ids(from)?;
    let leaves: Vec<ObjectId> = match indices {
        Some(indices) => {
            validate_indices(indices, ids.len())?;
            indices.iter().map(|&index| ids[index]).collect()
        }
        None => ids,
    };
    let mut map = CopyMap::new();
    import_leaves(into, from, &leaves, &mut map)
}

/// Inserts a copy of `source`'s page `source_index` after position
/// `after_index` of `doc`, or at the front when `None`.
pub fn append_page(
    doc: &mut Document,
    source: &Document,
    source_index: usize,
    after_index: Option<usize>,
) -> Result<ObjectId> {
    doc.ensure_unlocked()?;
    source.ensure_unlocked()?;
    let source_leaf = page_id_at(source, source_index)?;
    let (leaves, _) = walk(doc)?;
    let root = root_pages_id(doc)?;

    let (parent, insert_at) = match after_index {
        Some(index) => {
            let slot = leaves.get(index).ok_or(StructuralError::PageIndexOutOfRange {
                index,
                count: leaves.len(),
            })?;
            (slot.parent, slot.position + 1)
        }
        None => match leaves.first() {
            Some(slot) => (slot.parent, slot.position),
            None => (root, 0),
        },
    };

    let mut map = CopyMap::new();
    let copy = copy_leaves(doc, source, &[source_leaf], parent, &mut map)?[0];
    if let Some(Object::Dictionary(node)) = doc.get_mut(parent) {
        let mut kids = node.get_array("Kids").cloned().unwrap_or_default();
        kids.insert(insert_at.min(kids.len()), Object::Reference(copy));
        node.set("Kids", kids);
    }
    bump_ancestor_counts(doc, parent, 1);
    Ok(copy)
}

fn bump_ancestor_counts(doc: &mut Document, start: ObjectId, delta: i64) {
    let mut current = Some(start);
    let mut seen = HashSet::new();
    while let Some(id) = current {
        if !seen.insert(id) || seen.len() > MAX_TREE_DEPTH + 1 {
            break;
        }
        current = match doc.get_mut(id) {
            Some(Object::Dictionary(node)) => {
                let count = node.get_integer("Count").unwrap_or(0);
                node.set("Count", count + delta);
                node.get_reference("Parent")
            }
            _ => None,
        };
    }
}

/// Adds a new last page with the given media box and optional content.
pub fn create_page(doc: &mut Document, media_box: [f64; 4], content: Option<Vec<u8>>) -> Result<ObjectId> {
    doc.ensure_unlocked()?;
    let root = root_pages_id(doc)?;

    let mut page = Dictionary::new();
    page.set("Type", Object::name("Page"));
    page.set("Parent", root);
    page.set(
        "MediaBox",
        media_box.iter().map(|&v| Object::Real(v)).collect::<Vec<_>>(),
    );
    page.set("Resources", Dictionary::new());
    if let Some(content) = content {
        let contents = doc.add_object(Stream::new(content));
        page.set("Contents", contents);
    }
    let id = doc.add_object(page);

    match doc.get_mut(root) {
        Some(Object::Dictionary(pages)) => {
            let mut kids = pages.get_array("Kids").cloned().unwrap_or_default();
            kids.push(Object::Reference(id));
            pages.set("Kids", kids);
        }
        _ => return Err(StructuralError::InvalidPageNode(root).into()),
    }
    bump_ancestor_counts(doc, root, 1);
    Ok(id)
}

/// Rotates the selected pages clockwise by `angle` degrees (a multiple of 90).
pub fn rotate_pages(doc: &mut Document, indices: &[usize], angle: i32) -> Result<()> {
    doc.ensure_unlocked()?;
    if angle % 90 != 0 {
        return Err(StructuralError::InvalidRotation(angle).into());
    }
    let ids = page_ids(doc)?;
    validate_indices(indices, ids.len())?;

    let targets: BTreeSet<ObjectId> = indices.iter().map(|&index| ids[index]).collect();
    for id in targets {
        let current = inherited_attribute(doc, id, "Rotate")
            .and_then(|value| doc.resolve(&value).as_integer())
            .unwrap_or(0);
        let rotation = normalize_rotation(current + i64::from(angle));
        if let Some(Object::Dictionary(page)) = doc.get_mut(id) {
            page.set("Rotate", rotation);
        }
    }
    Ok(())
}

/// A 1-based page selection such as `"all"`, `"3"`, `"2-5"`, `"4-"` or `"1,3,7-9"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRange {
    All,
    /// Inclusive 0-based spans; `None` as end means "to the last page"
    Spans(Vec<(usize, Option<usize>)>),
}

impl PageRange {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StructuralError::InvalidPageRange("empty range".to_string()).into());
        }
        if text.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        let number = |part: &str| -> Result<usize> {
            match part.trim().parse::<usize>() {
                Ok(0) => Err(StructuralError::InvalidPageRange(
                    "page numbers start at 1".to_string(),
                )
                .into()),
                Ok(n) => Ok(n - 1),
                Err(_) => Err(StructuralError::InvalidPageRange(format!("invalid page: {part}")).into()),
            }
        };

        let mut spans = Vec::new();
        for segment in text.split(',') {
            let span = match segment.split_once('-') {
                Some((start, end)) if end.trim().is_empty() => (number(start)?, None),
                Some((start, end)) => {
                    let (start, end) = (number(start)?, number(end)?);
                    if start > end {
                        return Err(StructuralError::InvalidPageRange(format!(
                            "start {} is after end {}",
                            start + 1,
                            end + 1
                        ))
                        .into());
                    }
                    (start, Some(end))
                }
                None => {
                    let page = number(segment)?;
                    (page, Some(page))
                }
            };
            spans.push(span);
        }
        Ok(PageRange::Spans(spans))
    }

    /// 0-based indices in selection order, checked against `total`.
    pub fn indices(&self, total: usize) -> Result<Vec<usize>> {
        let spans = match self {
            PageRange::All => return Ok((0..total).collect()),
            PageRange::Spans(spans) => spans,
        };
        let mut indices = Vec::new();
        for &(start, end) in spans {
            let end = end.unwrap_or(total.saturating_sub(1));
            if start >= total || end >= total {
                return Err(StructuralError::PageIndexOutOfRange {
                    index: start.max(end),
                    count: total,
                }
                .into());
            }
            indices.extend(start..=end);
        }
        Ok(indices)
    }
}

impl std::str::FromStr for PageRange {
    type Err = crate::PdfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn doc_with_pages(count: usize) -> Document {
        let mut doc = Document::new();
        for i in 0..count {
            let content = format!("BT /F1 12 Tf ({i}) Tj ET").into_bytes();
            create_page(&mut doc, [0.0, 0.0, 612.0, 792.0], Some(content)).unwrap();
        }
        doc
    }

    fn content_of(doc: &Document, index: usize) -> Vec<u8> {
        let page = get_page(doc, index).unwrap();
        let id = page.content_ids(doc)[0];
        doc.get(id).unwrap().as_stream().unwrap().data().to_vec()
    }

    /// Root -> [A(2 pages), B(1 page)] with inherited resources on A
    fn nested_doc() -> Document {
        let mut doc = Document::new();
        let root = root_pages_id(&doc).unwrap();
        let mut font = Dictionary::new();
        font.set("BaseFont", Object::name("Helvetica"));
        let font = doc.add_object(font);
        let mut resources = Dictionary::new();
        let mut fonts = Dictionary::new();
        fonts.set("F1", font);
        resources.set("Font", fonts);

        let make_node = |doc: &mut Document, pages: usize, inherited: Option<Dictionary>| {
            let node = doc.add_object(Object::Null);
            let mut kids = Vec::new();
            for _ in 0..pages {
                let mut page = Dictionary::new();
                page.set("Type", Object::name("Page"));
                page.set("Parent", node);
                kids.push(Object::Reference(doc.add_object(page)));
            }
            let mut dict = Dictionary::new();
            dict.set("Type", Object::name("Pages"));
            dict.set("Parent", root);
            dict.set("Count", pages);
            dict.set("Kids", kids);
            dict.set(
                "MediaBox",
                vec![Object::Integer(0), Object::Integer(0), Object::Integer(300), Object::Integer(400)],
            );
            if let Some(resources) = inherited {
                dict.set("Resources", resources);
            }
            doc.set_object(node, dict);
            node
        };
        let a = make_node(&mut doc, 2, Some(resources));
        let b = make_node(&mut doc, 1, None);
        if let Some(Object::Dictionary(pages)) = doc.get_mut(root) {
            pages.set("Kids", vec![Object::Reference(a), Object::Reference(b)]);
            pages.set("Count", 3);
        }
        doc
    }

    #[test]
    fn test_count_and_inheritance() {
        let doc = nested_doc();
        assert_eq!(page_count(&doc).unwrap(), 3);
        let page = get_page(&doc, 1).unwrap();
        assert_eq!(page.media_box, [0.0, 0.0, 300.0, 400.0]);
        assert_eq!(page.width(), 300.0);
        assert!(page.resources.get_dict("Font").is_some());
        assert!(get_page(&doc, 2).unwrap().resources.is_empty());

        let err = get_page(&doc, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PageIndexOutOfRange);
    }

    #[test]
    fn test_remove_first_and_last_of_ten() {
        let mut doc = doc_with_pages(10);
        let source_second = content_of(&doc, 1);
        remove_pages(&mut doc, &BTreeSet::from([0, 9])).unwrap();
        assert_eq!(page_count(&doc).unwrap(), 8);
        assert_eq!(content_of(&doc, 0), source_second);
        let root = doc.get(root_pages_id(&doc).unwrap()).unwrap().as_dict().unwrap();
        assert_eq!(root.get_integer("Count"), Some(8));
    }

    #[test]
    fn test_remove_all_pages_refused_without_change() {
        let mut doc = doc_with_pages(3);
        let err = remove_pages(&mut doc, &BTreeSet::from([0, 1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldRemoveAllPages);
        assert_eq!(page_count(&doc).unwrap(), 3);

        let err = remove_pages(&mut doc, &BTreeSet::from([1, 7])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PageIndexOutOfRange);
        assert_eq!(page_count(&doc).unwrap(), 3);
    }

    #[test]
    fn test_remove_prunes_empty_intermediate_nodes() {
        let mut doc = nested_doc();
        remove_pages(&mut doc, &BTreeSet::from([2])).unwrap();
        let root = doc.get(root_pages_id(&doc).unwrap()).unwrap().as_dict().unwrap();
        assert_eq!(root.get_array("Kids").unwrap().len(), 1);
        assert_eq!(root.get_integer("Count"), Some(2));
    }

    #[test]
    fn test_extract_reorders_repeats_and_shares_resources() {
        let doc = nested_doc();
        let extracted = extract_pages(&doc, &[1, 0, 1]).unwrap();
        assert_eq!(page_count(&extracted).unwrap(), 3);

        let ids = page_ids(&extracted).unwrap();
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
        let fonts: HashSet<ObjectId> = (0..3)
            .map(|i| {
                let page = get_page(&extracted, i).unwrap();
                page.resources.get_dict("Font").unwrap().get_reference("F1").unwrap()
            })
            .collect();
        assert_eq!(fonts.len(), 1);
        // Inherited attributes are materialized on the copies
        let first = get_page(&extracted, 0).unwrap();
        assert!(first.dictionary.contains_key("MediaBox"));
        assert_eq!(first.parent, Some(root_pages_id(&extracted).unwrap()));

        assert_eq!(extract_pages(&doc, &[]).unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_append_page_positions() {
        let mut doc = doc_with_pages(2);
        let source = doc_with_pages(3);
        append_page(&mut doc, &source, 2, Some(0)).unwrap();
        assert_eq!(page_count(&doc).unwrap(), 3);
        assert_eq!(content_of(&doc, 1), content_of(&source, 2));

        append_page(&mut doc, &source, 1, None).unwrap();
        assert_eq!(content_of(&doc, 0), content_of(&source, 1));
        let root = doc.get(root_pages_id(&doc).unwrap()).unwrap().as_dict().unwrap();
        assert_eq!(root.get_integer("Count"), Some(4));
    }

    #[test]
    fn test_append_into_nested_node_updates_every_ancestor() {
        let mut doc = nested_doc();
        let source = doc_with_pages(1);
        append_page(&mut doc, &source, 0, Some(1)).unwrap();
        assert_eq!(page_count(&doc).unwrap(), 4);
        let first_node = get_page(&doc, 2).unwrap().parent.unwrap();
        let node = doc.get(first_node).unwrap().as_dict().unwrap();
        assert_eq!(node.get_integer("Count"), Some(3));
        let root = doc.get(root_pages_id(&doc).unwrap()).unwrap().as_dict().unwrap();
        assert_eq!(root.get_integer("Count"), Some(4));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = Document::new();
        let root = root_pages_id(&doc).unwrap();
        let mut parent = root;
        for _ in 0..MAX_TREE_DEPTH + 2 {
            let node = doc.add_object(Object::Null);
            if let Some(Object::Dictionary(dict)) = doc.get_mut(parent) {
                dict.set("Kids", vec![Object::Reference(node)]);
            }
            let mut dict = Dictionary::new();
            dict.set("Type", Object::name("Pages"));
            dict.set("Parent", parent);
            dict.set("Kids", Vec::<Object>::new());
            doc.set_object(node, dict);
            parent = node;
        }
        assert_eq!(page_count(&doc).unwrap_err().kind(), ErrorKind::TreeTooDeep);
    }

    #[test]
    fn test_cycle_in_kids_terminates() {
        let mut doc = doc_with_pages(1);
        let root = root_pages_id(&doc).unwrap();
        if let Some(Object::Dictionary(dict)) = doc.get_mut(root) {
            let mut kids = dict.get_array("Kids").cloned().unwrap();
            kids.push(Object::Reference(root));
            dict.set("Kids", kids);
        }
        assert_eq!(page_count(&doc).unwrap(), 1);
    }

    #[test]
    fn test_repeated_kid_does_not_inflate_count() {
        let mut doc = doc_with_pages(3);
        let root = root_pages_id(&doc).unwrap();
        if let Some(Object::Dictionary(dict)) = doc.get_mut(root) {
            let mut kids = dict.get_array("Kids").cloned().unwrap();
            kids.push(kids[0].clone());
            dict.set("Kids", kids);
        }
        assert_eq!(page_count(&doc).unwrap(), 3);
        let third = content_of(&doc, 2);

        remove_pages(&mut doc, &BTreeSet::from([1])).unwrap();
        assert_eq!(page_count(&doc).unwrap(), 2);
        let root = doc.get(root).unwrap().as_dict().unwrap();
        assert_eq!(root.get_integer("Count"), Some(2));
        assert_eq!(root.get_array("Kids").unwrap().len(), 2);
        assert_eq!(content_of(&doc, 1), third);
    }

    #[test]
    fn test_rotate_pages() {
        let mut doc = doc_with_pages(2);
        rotate_pages(&mut doc, &[1], 90).unwrap();
        rotate_pages(&mut doc, &[1], -180).unwrap();
        assert_eq!(get_page(&doc, 1).unwrap().rotation, 270);
        assert_eq!(get_page(&doc, 0).unwrap().rotation, 0);
        assert_eq!(
            rotate_pages(&mut doc, &[0], 45).unwrap_err().kind(),
            ErrorKind::Structural
        );
    }

    #[test]
    fn test_page_range_parsing() {
        assert_eq!(PageRange::parse("all").unwrap().indices(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(PageRange::parse("2-3").unwrap().indices(5).unwrap(), vec![1, 2]);
        assert_eq!(PageRange::parse("1, 3,5-").unwrap().indices(6).unwrap(), vec![0, 2, 4, 5]);
        assert!(PageRange::parse("0").is_err());
        assert!(PageRange::parse("4-2").is_err());
        assert!(PageRange::parse("x").is_err());
        assert_eq!(
            PageRange::parse("9").unwrap().indices(3).unwrap_err().kind(),
            ErrorKind::PageIndexOutOfRange
        );
    }
}
