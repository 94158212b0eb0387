use std::collections::HashMap;

use nska_bplist::Uid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{Node, ObjectStore};

/// One archived class: its `$classname` and the `$classes` ancestor chain,
/// most derived first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    pub classes: Vec<String>,
}

impl ClassSpec {
    pub fn new<I, S>(name: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// `NSMutableDictionary` with its Foundation ancestors.
    pub fn mutable_dictionary() -> Self {
        Self::new(
            "NSMutableDictionary",
            ["NSMutableDictionary", "NSDictionary", "NSObject"],
        )
    }

    /// `NSMutableData` with its Foundation ancestors.
    pub fn mutable_data() -> Self {
        Self::new("NSMutableData", ["NSMutableData", "NSData", "NSObject"])
    }
}

/// Which class each container kind is archived as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassPolicy {
    pub dictionary: ClassSpec,
    pub byte_buffer: ClassSpec,
}

impl Default for ClassPolicy {
    fn default() -> Self {
        Self {
            dictionary: ClassSpec::mutable_dictionary(),
            byte_buffer: ClassSpec::mutable_data(),
        }
    }
}

/// Session-scoped registry of class descriptor nodes, one per class name.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    by_name: HashMap<String, Uid>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// UID of the descriptor for `spec`, appending it on first use.
    ///
    /// Later calls with the same name return the cached UID; the chain from
    /// the first registration wins.
    pub fn class_uid(&mut self, store: &mut ObjectStore, spec: &ClassSpec) -> Uid {
        if let Some(&uid) = self.by_name.get(&spec.name) {
            return uid;
        }
        let uid = store.append(Node::ClassDescriptor {
            name: spec.name.clone(),
            classes: spec.classes.clone(),
        });
        debug!(class = %spec.name, uid = %uid, "registered class descriptor");
        self.by_name.insert(spec.name.clone(), uid);
        uid
    }

    /// Number of distinct classes registered in this session.
    pub fn descriptor_count(&self) -> usize {
        self.by_name.len()
    }
}
