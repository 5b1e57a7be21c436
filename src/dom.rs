//! A small DOM-like element tree.
//!
//! The viewer never owns layout: hosts measure elements and write the
//! client size back with [`Element::set_client_size`]. Everything the viewer
//! observes about the page (mount point size, parent width, overlay state)
//! goes through this tree.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    id: Option<String>,
    text: String,
    classes: Vec<String>,
    style: Vec<(String, String)>,
    client_width: u32,
    client_height: u32,
    parent: Weak<RefCell<ElementData>>,
    children: Vec<Element>,
}

#[derive(Debug, Clone)]
pub struct Element(Rc<RefCell<ElementData>>);

#[derive(Debug, Clone, Default)]
pub struct WeakElement(Weak<RefCell<ElementData>>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(RefCell::new(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        })))
    }

    pub fn with_id(self, id: &str) -> Self {
        self.0.borrow_mut().id = Some(id.to_string());
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_style(self, property: &str, value: &str) -> Self {
        self.0
            .borrow_mut()
            .style
            .push((property.to_string(), value.to_string()));
        self
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.0))
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.0.borrow().id.clone()
    }

    pub fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    pub fn set_text(&self, text: &str) {
        self.0.borrow_mut().text = text.to_string();
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0
            .borrow()
            .style
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.clone())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: &str) {
        let mut data = self.0.borrow_mut();
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&self, class: &str) {
        self.0.borrow_mut().classes.retain(|c| c != class);
    }

    pub fn client_size(&self) -> (u32, u32) {
        let data = self.0.borrow();
        (data.client_width, data.client_height)
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        let mut data = self.0.borrow_mut();
        data.client_width = width;
        data.client_height = height;
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.borrow().parent.upgrade().map(Element)
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.borrow().children.clone()
    }

    /// Appends `child`, detaching it from any previous parent first.
    pub fn append_child(&self, child: &Element) {
        child.remove();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Returns false when `child` is not a direct child.
    pub fn remove_child(&self, child: &Element) -> bool {
        let removed = {
            let mut data = self.0.borrow_mut();
            let before = data.children.len();
            data.children.retain(|c| c != child);
            before != data.children.len()
        };
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    /// Detaches this element from its parent, if any.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// True when `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        if self == other {
            return true;
        }
        self.0.borrow().children.iter().any(|c| c.contains(other))
    }

    pub fn find_by_id(&self, id: &str) -> Option<Element> {
        if self.0.borrow().id.as_deref() == Some(id) {
            return Some(self.clone());
        }
        let children = self.children();
        children.iter().find_map(|c| c.find_by_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::Element;

    #[test]
    fn append_and_remove_track_parent() {
        let root = Element::new("div").with_id("root");
        let child = Element::new("canvas");
        root.append_child(&child);
        assert_eq!(child.parent(), Some(root.clone()));
        assert!(root.contains(&child));

        child.remove();
        assert!(child.parent().is_none());
        assert!(!root.contains(&child));
        assert!(!root.remove_child(&child));
    }

    #[test]
    fn reparenting_moves_child() {
        let a = Element::new("div");
        let b = Element::new("div");
        let child = Element::new("span");
        a.append_child(&child);
        b.append_child(&child);
        assert!(a.children().is_empty());
        assert_eq!(b.children(), vec![child]);
    }

    #[test]
    fn classes_are_a_set() {
        let el = Element::new("div").with_class("animate-pulse");
        el.add_class("animate-pulse");
        assert!(el.has_class("animate-pulse"));
        el.remove_class("animate-pulse");
        assert!(!el.has_class("animate-pulse"));
    }

    #[test]
    fn find_by_id_searches_descendants() {
        let root = Element::new("div");
        let outer = Element::new("div");
        let inner = Element::new("div").with_id("model-container");
        outer.append_child(&inner);
        root.append_child(&outer);
        assert_eq!(root.find_by_id("model-container"), Some(inner));
        assert!(root.find_by_id("missing").is_none());
    }

    #[test]
    fn weak_handle_does_not_keep_element_alive() {
        let el = Element::new("div");
        let weak = el.downgrade();
        assert!(weak.upgrade().is_some());
        drop(el);
        assert!(weak.upgrade().is_none());
    }
}
