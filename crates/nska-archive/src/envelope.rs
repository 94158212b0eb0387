use std::io::Write;

use nska_bplist::{Uid, Value, WriterOptions};
use tracing::debug;

use crate::config::ArchiverConfig;
use crate::error::{ArchiveError, ArchiveResult};
use crate::store::{Node, ObjectStore, NULL_UID};

/// Placeholder string stored at index 0 of `$objects`.
pub const NULL_MARKER: &str = "$null";

/// A validated, frozen keyed archive ready for serialization.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    archiver: String,
    version: u64,
    root_key: String,
    root: Uid,
    objects: Vec<Node>,
}

/// Validate the store and freeze it into an [`Envelope`] rooted at `root`.
///
/// Checks that every slot is filled, every reference is in range and never
/// points at the null marker, classes and keys point at the right node kinds,
/// key and value lists line up, byte buffers carry a class, and every node is
/// reachable from the root.
pub fn assemble(store: ObjectStore, root: Uid, config: &ArchiverConfig) -> ArchiveResult<Envelope> {
    let objects = store.into_nodes()?;

    match objects.first() {
        Some(Node::NullMarker) => {}
        _ => return Err(ArchiveError::inconsistent(NULL_UID, "index 0 is not the null marker")),
    }
    match objects.get(root.as_index()) {
        Some(Node::Dictionary { .. }) => {}
        Some(other) => {
            return Err(ArchiveError::inconsistent(
                root,
                format!("root is a {}, not a dictionary", other.kind_name()),
            ))
        }
        None => return Err(ArchiveError::inconsistent(root, "root out of range")),
    }

    for (index, node) in objects.iter().enumerate().skip(1) {
        check_node(&objects, Uid::new(index as u64), node)?;
    }
    check_reachable(&objects, root)?;

    debug!(
        objects = objects.len(),
        root = %root,
        "assembled keyed archive"
    );
    Ok(Envelope {
        archiver: config.archiver.clone(),
        version: config.version,
        root_key: config.root_key.clone(),
        root,
        objects,
    })
}

fn resolve<'a>(objects: &'a [Node], from: Uid, target: Uid) -> ArchiveResult<&'a Node> {
    if target == NULL_UID {
        return Err(ArchiveError::inconsistent(from, "references the null marker"));
    }
    objects.get(target.as_index()).ok_or_else(|| {
        ArchiveError::inconsistent(from, format!("references missing uid {target}"))
    })
}

fn check_class(objects: &[Node], from: Uid, class: Uid) -> ArchiveResult<()> {
    match resolve(objects, from, class)? {
        Node::ClassDescriptor { .. } => Ok(()),
        other => Err(ArchiveError::inconsistent(
            from,
            format!("class uid {class} is a {}", other.kind_name()),
        )),
    }
}

fn check_node(objects: &[Node], uid: Uid, node: &Node) -> ArchiveResult<()> {
    match node {
        Node::NullMarker => Err(ArchiveError::inconsistent(uid, "null marker outside index 0")),
        Node::String(_) | Node::Number(_) | Node::ClassDescriptor { .. } => Ok(()),
        Node::ByteBuffer { class: None, .. } => {
            Err(ArchiveError::inconsistent(uid, "byte buffer has no class"))
        }
        Node::ByteBuffer {
            class: Some(class), ..
        } => check_class(objects, uid, *class),
        Node::Dictionary {
            keys,
            values,
            class,
        } => {
            if keys.len() != values.len() {
                return Err(ArchiveError::inconsistent(
                    uid,
                    format!("{} keys but {} values", keys.len(), values.len()),
                ));
            }
            check_class(objects, uid, *class)?;
            for &key in keys {
                match resolve(objects, uid, key)? {
                    Node::String(_) => {}
                    other => {
                        return Err(ArchiveError::inconsistent(
                            uid,
                            format!("key uid {key} is a {}", other.kind_name()),
                        ))
                    }
                }
            }
            for &value in values {
                if matches!(resolve(objects, uid, value)?, Node::ClassDescriptor { .. }) {
                    return Err(ArchiveError::inconsistent(
                        uid,
                        format!("value uid {value} is a class descriptor"),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn check_reachable(objects: &[Node], root: Uid) -> ArchiveResult<()> {
    let mut seen = vec![false; objects.len()];
    seen[NULL_UID.as_index()] = true;
    let mut stack = vec![root];
    while let Some(uid) = stack.pop() {
        let index = uid.as_index();
        if seen[index] {
            continue;
        }
        seen[index] = true;
        stack.extend(objects[index].references());
    }
    match seen.iter().position(|&reached| !reached) {
        Some(index) => Err(ArchiveError::inconsistent(
            Uid::new(index as u64),
            "not reachable from the root",
        )),
        None => Ok(()),
    }
}

impl Envelope {
    pub fn archiver(&self) -> &str {
        &self.archiver
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// UID of the root dictionary.
    pub fn root(&self) -> Uid {
        self.root
    }

    /// The `$objects` array, index 0 being the null marker.
    pub fn objects(&self) -> &[Node] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, uid: Uid) -> Option<&Node> {
        self.objects.get(uid.as_index())
    }

    /// Render the archive as a property-list tree.
    pub fn to_plist(&self) -> Value {
        Value::dictionary([
            ("$version", Value::UnsignedInteger(self.version)),
            ("$archiver", Value::from(self.archiver.as_str())),
            (
                "$top",
                Value::dictionary([(self.root_key.as_str(), Value::Uid(self.root))]),
            ),
            (
                "$objects",
                Value::Array(self.objects.iter().map(node_to_plist).collect()),
            ),
        ])
    }

    /// Serialize to `bplist00` bytes.
    pub fn to_bytes(&self, options: &WriterOptions) -> ArchiveResult<Vec<u8>> {
        Ok(nska_bplist::to_bytes_with(&self.to_plist(), options)?)
    }

    /// Serialize into `sink` and flush it.
    pub fn write_to<W: Write>(&self, sink: W, options: &WriterOptions) -> ArchiveResult<()> {
        Ok(nska_bplist::to_writer(sink, &self.to_plist(), options)?)
    }
}

fn uid_array(uids: &[Uid]) -> Value {
    Value::Array(uids.iter().copied().map(Value::Uid).collect())
}

fn node_to_plist(node: &Node) -> Value {
    match node {
        Node::NullMarker => Value::from(NULL_MARKER),
        Node::String(s) => Value::from(s.as_str()),
        Node::Number(n) => n.to_plist(),
        // Every buffer points at the same class object, so the reference is
        // written once for the whole archive.
        Node::ByteBuffer { data, class } => Value::dictionary([
            ("$class", Value::SharedUid(class.unwrap_or(NULL_UID))),
            ("NS.data", Value::Data(data.clone())),
        ]),
        Node::Dictionary {
            keys,
            values,
            class,
        } => Value::dictionary([
            ("NS.keys", uid_array(keys)),
            ("NS.objects", uid_array(values)),
            ("$class", Value::Uid(*class)),
        ]),
        Node::ClassDescriptor { name, classes } => Value::dictionary([
            (
                "$classes",
                Value::Array(classes.iter().map(|c| Value::from(c.as_str())).collect()),
            ),
            ("$classname", Value::from(name.as_str())),
        ]),
    }
}
