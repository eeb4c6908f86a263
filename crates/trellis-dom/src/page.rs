//! In-memory page model built from a captured HTML document.
//!
//! The rendered document is flattened into a per-page element registry;
//! an [`ElementRef`] is an index into that registry tagged with the page
//! generation it belongs to. References from an earlier page generation
//! never resolve against a later one — they are skipped with a warning,
//! not treated as an error.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use trellis_core::path::{PathExpr, PathSet, Step};

/// A captured web page: raw HTML plus the URL it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub html: String,
    pub url: String,
}

impl Page {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Page {
            html: html.into(),
            url: url.into(),
        }
    }

    /// The platform a page belongs to, i.e. the host part of its URL.
    /// Identifiers are persisted per platform, not per page.
    pub fn platform_url(&self) -> String {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, r)| r)
            .unwrap_or(&self.url);
        rest.split(['/', '?', '#'])
            .next()
            .unwrap_or(rest)
            .to_string()
    }
}

/// Process-unique generation id of one parsed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(u64);

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

impl PageId {
    fn next() -> PageId {
        PageId(NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-owning handle to an element of one page generation. Never
/// persisted; derived locators are persisted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementRef {
    pub page: PageId,
    ix: u32,
}

#[derive(Debug)]
struct DomNode {
    tag: String,
    classes: Vec<String>,
    parent: Option<u32>,
    children: Vec<u32>,
}

/// Flat element registry for one rendered page.
#[derive(Debug)]
pub struct PageModel {
    id: PageId,
    url: String,
    nodes: Vec<DomNode>,
}

impl PageModel {
    /// Parse a captured page into a fresh registry (a new generation).
    pub fn parse(page: &Page) -> PageModel {
        let doc = scraper::Html::parse_document(&page.html);
        let mut nodes = Vec::new();
        walk(doc.root_element(), None, &mut nodes);
        PageModel {
            id: PageId::next(),
            url: page.url.clone(),
            nodes,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every element of the page, in document order.
    pub fn all_refs(&self) -> Vec<ElementRef> {
        (0..self.nodes.len() as u32).map(|ix| self.make(ix)).collect()
    }

    fn make(&self, ix: u32) -> ElementRef {
        ElementRef { page: self.id, ix }
    }

    /// Validate that `el` belongs to this page generation.
    fn node(&self, el: ElementRef) -> Option<&DomNode> {
        if el.page != self.id {
            warn!(?el.page, current = ?self.id, "stale element reference skipped");
            return None;
        }
        self.nodes.get(el.ix as usize)
    }

    pub fn tag(&self, el: ElementRef) -> Option<&str> {
        self.node(el).map(|n| n.tag.as_str())
    }

    pub fn classes(&self, el: ElementRef) -> &[String] {
        self.node(el).map(|n| n.classes.as_slice()).unwrap_or(&[])
    }

    // ── Class lookup ──

    /// All elements carrying class `name`, in document order.
    pub fn elements_by_class(&self, name: &str) -> Vec<ElementRef> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.classes.iter().any(|c| c == name))
            .map(|(ix, _)| self.make(ix as u32))
            .collect()
    }

    /// All elements carrying any of `names` (union), in document order.
    pub fn elements_by_classes(&self, names: &[String]) -> Vec<ElementRef> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.classes.iter().any(|c| names.iter().any(|m| m == c)))
            .map(|(ix, _)| self.make(ix as u32))
            .collect()
    }

    // ── Canonical paths ──

    /// Root-anchored `/tag[rank]/…` path of `el`, where `rank` is the
    /// element's 1-based position among same-tag siblings. Deterministic
    /// and attribute-independent. `None` for stale references.
    pub fn canonical_path(&self, el: ElementRef) -> Option<String> {
        self.node(el)?;
        let mut segments = Vec::new();
        let mut cursor = el.ix;
        loop {
            let node = &self.nodes[cursor as usize];
            segments.push(format!("{}[{}]", node.tag, self.same_tag_rank(cursor)));
            match node.parent {
                Some(p) => cursor = p,
                None => break,
            }
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    fn same_tag_rank(&self, ix: u32) -> usize {
        let node = &self.nodes[ix as usize];
        match node.parent {
            None => 1,
            Some(p) => {
                let earlier = self.nodes[p as usize]
                    .children
                    .iter()
                    .take_while(|&&c| c != ix)
                    .filter(|&&c| self.nodes[c as usize].tag == node.tag)
                    .count();
                earlier + 1
            }
        }
    }

    // ── Path resolution ──

    /// Evaluate a path string (possibly a `" | "` union) against the
    /// page. Total: unparseable or unmatched paths yield the empty set.
    pub fn resolve_path_str(&self, path: &str) -> Vec<ElementRef> {
        match PathSet::parse(path) {
            Ok(set) => self.resolve_set(&set),
            Err(err) => {
                debug!(%path, %err, "unresolvable path expression");
                Vec::new()
            }
        }
    }

    /// Evaluate a union of path expressions: set union, document order.
    pub fn resolve_set(&self, set: &PathSet) -> Vec<ElementRef> {
        let mut out: Vec<ElementRef> = set
            .0
            .iter()
            .flat_map(|expr| self.resolve_expr(expr))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Evaluate one path expression. Anchored paths start at the root
    /// element; unanchored (`//`) paths may start anywhere.
    pub fn resolve_expr(&self, expr: &PathExpr) -> Vec<ElementRef> {
        let Some(first) = expr.steps.first() else {
            return Vec::new();
        };
        let mut current: Vec<u32> = if expr.anchored {
            if self.nodes.is_empty() || !self.step_matches(0, first) {
                Vec::new()
            } else {
                vec![0]
            }
        } else {
            (0..self.nodes.len() as u32)
                .filter(|&ix| self.step_matches(ix, first))
                .collect()
        };
        for step in &expr.steps[1..] {
            current = current
                .into_iter()
                .flat_map(|ix| self.matching_children(ix, step))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current.into_iter().map(|ix| self.make(ix)).collect()
    }

    fn step_matches(&self, ix: u32, step: &Step) -> bool {
        let node = &self.nodes[ix as usize];
        node.tag == step.tag
            && step
                .index
                .map(|want| self.same_tag_rank(ix) == want)
                .unwrap_or(true)
    }

    fn matching_children(&self, ix: u32, step: &Step) -> Vec<u32> {
        let kids: Vec<u32> = self.nodes[ix as usize]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c as usize].tag == step.tag)
            .collect();
        match step.index {
            None => kids,
            Some(i) => kids.get(i - 1).copied().into_iter().collect(),
        }
    }
}

fn walk(el: scraper::ElementRef<'_>, parent: Option<u32>, nodes: &mut Vec<DomNode>) {
    let ix = nodes.len() as u32;
    nodes.push(DomNode {
        tag: el.value().name().to_ascii_lowercase(),
        classes: el.value().classes().map(str::to_string).collect(),
        parent,
        children: Vec::new(),
    });
    if let Some(p) = parent {
        nodes[p as usize].children.push(ix);
    }
    for child in el.children() {
        if let Some(child_el) = scraper::ElementRef::wrap(child) {
            walk(child_el, Some(ix), nodes);
        }
    }
}
