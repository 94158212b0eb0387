use nska_bplist::Uid;

use crate::error::{ArchiveError, ArchiveResult};
use crate::value::Number;

/// UID of the null marker. Always slot 0 and never referenced by a node.
pub const NULL_UID: Uid = Uid::new(0);

/// One entry of the `$objects` array.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// The `$null` placeholder at index 0.
    NullMarker,
    String(String),
    Number(Number),
    /// Raw bytes. The class is bound when the enclosing dictionary closes.
    ByteBuffer { data: Vec<u8>, class: Option<Uid> },
    Dictionary {
        keys: Vec<Uid>,
        values: Vec<Uid>,
        class: Uid,
    },
    ClassDescriptor { name: String, classes: Vec<String> },
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::NullMarker => "null marker",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::ByteBuffer { .. } => "byte buffer",
            Self::Dictionary { .. } => "dictionary",
            Self::ClassDescriptor { .. } => "class descriptor",
        }
    }

    /// Every UID this node refers to, in wire order.
    pub fn references(&self) -> Vec<Uid> {
        match self {
            Self::Dictionary {
                keys,
                values,
                class,
            } => {
                let mut refs = Vec::with_capacity(keys.len() + values.len() + 1);
                refs.extend_from_slice(keys);
                refs.extend_from_slice(values);
                refs.push(*class);
                refs
            }
            Self::ByteBuffer {
                class: Some(class), ..
            } => vec![*class],
            _ => Vec::new(),
        }
    }
}

/// Append-only arena of archive nodes for one encode session.
///
/// UIDs are positions in the arena. A container may reserve its slot before
/// its contents are encoded and fill it afterwards, so a parent can be
/// numbered ahead of its children.
#[derive(Debug)]
pub struct ObjectStore {
    slots: Vec<Option<Node>>,
}

impl ObjectStore {
    /// Create a store holding only the null marker.
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Node::NullMarker)],
        }
    }

    /// Append a node and return its UID.
    pub fn append(&mut self, node: Node) -> Uid {
        self.slots.push(Some(node));
        self.last_uid()
    }

    /// Reserve an empty slot to be filled later with [`fill`](Self::fill).
    pub fn reserve(&mut self) -> Uid {
        self.slots.push(None);
        self.last_uid()
    }

    /// Fill a previously reserved slot.
    pub fn fill(&mut self, uid: Uid, node: Node) -> ArchiveResult<()> {
        match self.slots.get_mut(uid.as_index()) {
            Some(slot @ None) => {
                *slot = Some(node);
                Ok(())
            }
            Some(Some(existing)) => Err(ArchiveError::inconsistent(
                uid,
                format!("slot already holds a {}", existing.kind_name()),
            )),
            None => Err(ArchiveError::inconsistent(uid, "slot was never reserved")),
        }
    }

    /// Bind the class of a byte buffer node.
    pub fn bind_class(&mut self, uid: Uid, class_uid: Uid) -> ArchiveResult<()> {
        match self.slots.get_mut(uid.as_index()) {
            Some(Some(Node::ByteBuffer { class, .. })) => {
                *class = Some(class_uid);
                Ok(())
            }
            Some(Some(other)) => Err(ArchiveError::inconsistent(
                uid,
                format!("cannot bind a class to a {}", other.kind_name()),
            )),
            _ => Err(ArchiveError::inconsistent(uid, "no node to bind a class to")),
        }
    }

    /// Node at `uid`, or `None` if out of range or still reserved.
    pub fn get(&self, uid: Uid) -> Option<&Node> {
        self.slots.get(uid.as_index()).and_then(Option::as_ref)
    }

    /// Number of slots, including the null marker and reserved slots.
    pub fn object_count(&self) -> usize {
        self.slots.len()
    }

    /// Freeze the store into its node list. Fails on any unfilled slot.
    pub fn into_nodes(self) -> ArchiveResult<Vec<Node>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    ArchiveError::inconsistent(Uid::new(index as u64), "reserved slot never filled")
                })
            })
            .collect()
    }

    fn last_uid(&self) -> Uid {
        Uid::new((self.slots.len() - 1) as u64)
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
