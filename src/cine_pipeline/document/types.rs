//! Hierarchical document model
//!
//! A document is a tree of groups. Groups carry attributes and children;
//! leaves are datasets or links to another node by absolute path.

use std::collections::BTreeMap;

use serde::Serialize;

/// Scalar or small vector attached to a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    UIntArray(Vec<u64>),
    FloatArray(Vec<f64>),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float(value as f64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

macro_rules! attr_from_int {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    AttrValue::$variant(value as $wide)
                }
            }
        )*
    };
}

attr_from_int!(UInt as u64: u8, u16, u32, u64, usize);
attr_from_int!(Int as i64: i8, i16, i32, i64);

/// The image stack, either held in memory or already written by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStack {
    Loaded {
        width: usize,
        height: usize,
        frames: Vec<Vec<u16>>,
    },
    /// Frames went straight to the output; only the shape is kept.
    Streamed {
        width: usize,
        height: usize,
        frame_count: usize,
    },
}

impl ImageStack {
    /// `(frames, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            ImageStack::Loaded {
                width,
                height,
                frames,
            } => (frames.len(), *height, *width),
            ImageStack::Streamed {
                width,
                height,
                frame_count,
            } => (*frame_count, *height, *width),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.shape().0
    }

    /// Pixels of frame `index`, when the stack is held in memory.
    pub fn frame(&self, index: usize) -> Option<&[u16]> {
        match self {
            ImageStack::Loaded { frames, .. } => frames.get(index).map(Vec::as_slice),
            ImageStack::Streamed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Images(ImageStack),
    F64(Vec<f64>),
    U32(Vec<u32>),
    Bytes(Vec<u8>),
}

impl Dataset {
    pub fn dtype(&self) -> &'static str {
        match self {
            Dataset::Images(_) => "u16",
            Dataset::F64(_) => "f64",
            Dataset::U32(_) => "u32",
            Dataset::Bytes(_) => "u8",
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Dataset::Images(stack) => {
                let (n, h, w) = stack.shape();
                vec![n, h, w]
            }
            Dataset::F64(values) => vec![values.len()],
            Dataset::U32(values) => vec![values.len()],
            Dataset::Bytes(values) => vec![values.len()],
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Dataset::F64(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            Dataset::U32(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Dataset::Bytes(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_images(&self) -> Option<&ImageStack> {
        match self {
            Dataset::Images(stack) => Some(stack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
    /// Hard link: another name for the node at this absolute path.
    Link(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub attributes: BTreeMap<String, AttrValue>,
    pub children: BTreeMap<String, Node>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, node: Node) {
        self.children.insert(name.to_string(), node);
    }

    pub fn insert_group(&mut self, name: &str, group: Group) {
        self.insert(name, Node::Group(group));
    }

    pub fn insert_dataset(&mut self, name: &str, dataset: Dataset) {
        self.insert(name, Node::Dataset(dataset));
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }
}

/// Root of the converted recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub root: Group,
}

impl Document {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    /// Looks up a node by slash-separated path without following links.
    pub fn node(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.root.child(first)?;
        for part in parts {
            match node {
                Node::Group(group) => node = group.child(part)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Looks up a node by path, resolving a final link.
    pub fn get(&self, path: &str) -> Option<&Node> {
        match self.node(path)? {
            Node::Link(target) => match self.node(target)? {
                Node::Link(_) => None,
                resolved => Some(resolved),
            },
            node => Some(node),
        }
    }

    pub fn group(&self, path: &str) -> Option<&Group> {
        if path.trim_matches('/').is_empty() {
            return Some(&self.root);
        }
        match self.get(path)? {
            Node::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        match self.get(path)? {
            Node::Dataset(dataset) => Some(dataset),
            _ => None,
        }
    }

    /// Attribute `name` of the group at `group_path`.
    pub fn attr(&self, group_path: &str, name: &str) -> Option<&AttrValue> {
        self.group(group_path)?.attributes.get(name)
    }

    pub fn images(&self) -> Option<&ImageStack> {
        self.dataset("images")?.as_images()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut time = Group::new();
        time.insert_dataset("time_float", Dataset::F64(vec![1.0, 2.0]));
        let mut tagged = Group::new();
        tagged.insert_group("Time", time);

        let mut root = Group::new();
        root.insert_group("TaggedBlocks", tagged);
        root.insert_group("Meta", Group::new().with_attr("serial", 7u32));
        root.insert(
            "time_float",
            Node::Link("/TaggedBlocks/Time/time_float".to_string()),
        );
        Document::new(root)
    }

    #[test]
    fn test_path_lookup_and_links() {
        let doc = sample();
        let direct = doc.dataset("/TaggedBlocks/Time/time_float").unwrap();
        let alias = doc.dataset("time_float").unwrap();

        assert_eq!(direct, alias);
        assert!(matches!(doc.node("time_float"), Some(Node::Link(_))));
        assert!(doc.dataset("TaggedBlocks/Time/missing").is_none());
        assert!(doc.dataset("TaggedBlocks/Time/time_float/deeper").is_none());
    }

    #[test]
    fn test_attributes() {
        let doc = sample();
        assert_eq!(doc.attr("Meta", "serial"), Some(&AttrValue::UInt(7)));
        assert_eq!(doc.attr("/", "serial"), None);
        assert!(doc.group("").is_some());
    }

    #[test]
    fn test_dataset_shapes() {
        let stack = ImageStack::Streamed {
            width: 4,
            height: 2,
            frame_count: 3,
        };
        assert_eq!(Dataset::Images(stack.clone()).shape(), vec![3, 2, 4]);
        assert_eq!(stack.frame(0), None);
        assert_eq!(Dataset::Bytes(vec![1, 2]).dtype(), "u8");
    }
}
