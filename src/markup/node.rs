//! Order-preserving XML tree with local-name path lookups.
//!
//! Tags are stored exactly as written (`ds:Signature`, `ns0:CTe`), but every
//! lookup compares the local part only, so callers never care which prefix a
//! producer chose. Paths are `/`-separated; each segment is searched depth-first
//! (pre-order) among the descendants of the previous match.

use indexmap::IndexMap;

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// `<?xml ...?>` declaration as read from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A parsed document: optional declaration plus exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub declaration: Option<Declaration>,
    pub root: Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Node>,
    /// Written as `<tag/>` in the input; cleared once content is added.
    pub self_closing: bool,
}

/// Local part of a possibly prefixed name (`ds:Signature` → `Signature`).
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':')
        .map_or(name, |(_, local)| local)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes
            .insert(name.to_string(), value.into());
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e),
                _ => None,
            })
    }

    /// Direct text content (text and CDATA children concatenated).
    /// `None` when the element carries no text at all.
    pub fn text(&self) -> Option<String> {
        let mut out: Option<String> = None;
        for child in &self.children {
            if let Node::Text(t) | Node::CData(t) = child {
                out.get_or_insert_with(String::new)
                    .push_str(t);
            }
        }
        out
    }

    /// Replace the direct text content, keeping element children in place.
    pub fn set_text(&mut self, value: impl Into<String>) {
        let value = value.into();
        let first_text = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Text(_) | Node::CData(_)));
        self.children
            .retain(|n| !matches!(n, Node::Text(_) | Node::CData(_)));
        let at = first_text
            .unwrap_or(0)
            .min(self.children.len());
        self.children
            .insert(at, Node::Text(value));
        self.self_closing = false;
    }

    /// First element matching `path` below this one (self excluded).
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_segments(&segments(path))
    }

    fn find_segments(&self, segs: &[&str]) -> Option<&Element> {
        let (head, rest) = segs.split_first()?;
        for el in self.elements() {
            if el.is(head) {
                if rest.is_empty() {
                    return Some(el);
                }
                if let Some(found) = el.find_segments(rest) {
                    return Some(found);
                }
            }
            if let Some(found) = el.find_segments(segs) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable twin of [`Element::find`]; same traversal order.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        self.find_segments_mut(&segments(path))
    }

    fn find_segments_mut(&mut self, segs: &[&str]) -> Option<&mut Element> {
        let (head, rest) = segs.split_first()?;
        for child in self.children.iter_mut() {
            let Node::Element(el) = child else { continue };
            if el.is(head) {
                if rest.is_empty() {
                    return Some(el);
                }
                if el.find_segments(rest).is_some() {
                    return el.find_segments_mut(rest);
                }
            }
            if el.find_segments(segs).is_some() {
                return el.find_segments_mut(segs);
            }
        }
        None
    }

    /// All elements matching `path`. A match of a segment is not searched
    /// again for the same segment.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_segments(&segments(path), &mut out);
        out
    }

    fn collect_segments<'a>(&'a self, segs: &[&str], out: &mut Vec<&'a Element>) {
        let Some((head, rest)) = segs.split_first() else { return };
        for el in self.elements() {
            if el.is(head) {
                if rest.is_empty() {
                    out.push(el);
                } else {
                    el.collect_segments(rest, out);
                }
            } else {
                el.collect_segments(segs, out);
            }
        }
    }

    /// Visit every element matching `path` mutably, in document order.
    pub fn for_each_mut<F>(&mut self, path: &str, mut f: F)
    where
        F: FnMut(&mut Element),
    {
        self.visit_segments_mut(&segments(path), &mut f);
    }

    fn visit_segments_mut(&mut self, segs: &[&str], f: &mut dyn FnMut(&mut Element)) {
        let Some((head, rest)) = segs.split_first() else { return };
        for child in self.children.iter_mut() {
            let Node::Element(el) = child else { continue };
            if el.is(head) {
                if rest.is_empty() {
                    f(el);
                } else {
                    el.visit_segments_mut(rest, f);
                }
            } else {
                el.visit_segments_mut(segs, f);
            }
        }
    }

    /// Text of the first element matching `path`.
    pub fn text_at(&self, path: &str) -> Option<String> {
        self.find(path)
            .and_then(Element::text)
    }
}

impl Document {
    /// Path lookup that also considers the root element itself as the first
    /// segment's candidate.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let segs = segments(path);
        let (head, rest) = segs.split_first()?;
        if self.root.is(head) {
            if rest.is_empty() {
                return Some(&self.root);
            }
            if let Some(found) = self.root.find_segments(rest) {
                return Some(found);
            }
        }
        self.root
            .find_segments(&segs)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let segs = segments(path);
        let (head, rest) = segs.split_first()?;
        if self.root.is(head) {
            if rest.is_empty() {
                return Some(&mut self.root);
            }
            if self.root.find_segments(rest).is_some() {
                return self.root.find_segments_mut(rest);
            }
        }
        self.root
            .find_segments_mut(&segs)
    }

    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let segs = segments(path);
        let Some((head, rest)) = segs.split_first() else { return Vec::new() };
        let mut out = Vec::new();
        if self.root.is(head) {
            if rest.is_empty() {
                out.push(&self.root);
            } else {
                self.root.collect_segments(rest, &mut out);
            }
        } else {
            self.root.collect_segments(&segs, &mut out);
        }
        out
    }

    pub fn for_each_mut<F>(&mut self, path: &str, mut f: F)
    where
        F: FnMut(&mut Element),
    {
        let segs = segments(path);
        let Some((head, rest)) = segs.split_first() else { return };
        if self.root.is(head) {
            if rest.is_empty() {
                f(&mut self.root);
            } else {
                self.root.visit_segments_mut(rest, &mut f);
            }
        } else {
            self.root.visit_segments_mut(&segs, &mut f);
        }
    }

    pub fn text_at(&self, path: &str) -> Option<String> {
        self.find(path)
            .and_then(Element::text)
    }
}
