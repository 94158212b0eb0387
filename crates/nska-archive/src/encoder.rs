use nska_bplist::Uid;

use crate::class::{ClassPolicy, ClassRegistry};
use crate::config::ArchiverConfig;
use crate::dedup::ScalarDeduplicator;
use crate::envelope::{self, Envelope};
use crate::error::ArchiveResult;
use crate::store::{Node, ObjectStore};
use crate::value::{Dictionary, Item, Number};

/// Walks an input tree and lays it out in an [`ObjectStore`].
///
/// One encoder is one session: the store, the scalar cache and the class
/// registry all start empty and are consumed by [`finish`](Self::finish).
///
/// Containers are numbered before their contents. A dictionary reserves its
/// slot, encodes its entries key then value, binds the byte buffer class to
/// any buffers it directly holds, registers its own class and then fills the
/// slot.
#[derive(Debug)]
pub struct ContainerEncoder<'a> {
    store: ObjectStore,
    dedup: ScalarDeduplicator,
    classes: ClassRegistry,
    policy: &'a ClassPolicy,
    /// Byte buffers whose class is not bound yet.
    pending_buffers: Vec<Uid>,
}

impl<'a> ContainerEncoder<'a> {
    pub fn new(policy: &'a ClassPolicy) -> Self {
        Self {
            store: ObjectStore::new(),
            dedup: ScalarDeduplicator::new(),
            classes: ClassRegistry::new(),
            policy,
            pending_buffers: Vec::new(),
        }
    }

    pub fn intern_string(&mut self, s: &str) -> Uid {
        self.dedup.intern_string(&mut self.store, s)
    }

    pub fn intern_number(&mut self, n: Number) -> Uid {
        self.dedup.intern_number(&mut self.store, n)
    }

    /// Append a byte buffer node. Buffers are never shared, even when equal.
    pub fn encode_byte_buffer(&mut self, bytes: &[u8]) -> Uid {
        let uid = self.store.append(Node::ByteBuffer {
            data: bytes.to_vec(),
            class: None,
        });
        self.pending_buffers.push(uid);
        uid
    }

    pub fn encode_item(&mut self, item: &Item) -> ArchiveResult<Uid> {
        Ok(match item {
            Item::String(s) => self.intern_string(s),
            Item::Number(n) => self.intern_number(*n),
            Item::Bytes(bytes) => self.encode_byte_buffer(bytes),
            Item::Dictionary(dict) => self.encode_dictionary(dict)?,
        })
    }

    pub fn encode_dictionary(&mut self, dict: &Dictionary) -> ArchiveResult<Uid> {
        let uid = self.store.reserve();
        let mark = self.pending_buffers.len();

        let mut keys = Vec::with_capacity(dict.len());
        let mut values = Vec::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            keys.push(self.intern_string(key));
            values.push(self.encode_item(value)?);
        }

        let buffers = self.pending_buffers.split_off(mark);
        self.bind_buffers(&buffers)?;
        let class = self.classes.class_uid(&mut self.store, &self.policy.dictionary);

        self.store.fill(
            uid,
            Node::Dictionary {
                keys,
                values,
                class,
            },
        )?;
        Ok(uid)
    }

    /// Number of slots used so far, including the null marker.
    pub fn object_count(&self) -> usize {
        self.store.object_count()
    }

    /// Close the session and validate the graph rooted at `root`.
    pub fn finish(mut self, root: Uid, config: &ArchiverConfig) -> ArchiveResult<Envelope> {
        let leftover = std::mem::take(&mut self.pending_buffers);
        self.bind_buffers(&leftover)?;
        envelope::assemble(self.store, root, config)
    }

    fn bind_buffers(&mut self, buffers: &[Uid]) -> ArchiveResult<()> {
        if buffers.is_empty() {
            return Ok(());
        }
        let class = self.classes.class_uid(&mut self.store, &self.policy.byte_buffer);
        for &buffer in buffers {
            self.store.bind_class(buffer, class)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uids(values: &[Uid]) -> Vec<u64> {
        values.iter().map(|u| u.get()).collect()
    }

    fn dictionary_node(encoder: &ContainerEncoder<'_>, uid: Uid) -> (Vec<u64>, Vec<u64>, u64) {
        match encoder.store.get(uid) {
            Some(Node::Dictionary {
                keys,
                values,
                class,
            }) => (uids(keys), uids(values), class.get()),
            other => panic!("expected dictionary, got {other:?}"),
        }
    }

    #[test]
    fn flat_dictionary_reference_layout() {
        let policy = ClassPolicy::default();
        let mut encoder = ContainerEncoder::new(&policy);
        let dict = Dictionary::new()
            .with("FILENAME", "song")
            .with("SCALE", 4095i64)
            .with("GUI", vec![0u8, 1])
            .with("KNOBTITLE", "song")
            .with("X", 0.5f64);
        let root = encoder.encode_dictionary(&dict).unwrap();

        assert_eq!(root, Uid::new(1));
        let (keys, values, class) = dictionary_node(&encoder, root);
        assert_eq!(keys, [2, 4, 6, 8, 9]);
        assert_eq!(values, [3, 5, 7, 3, 10]);
        assert_eq!(class, 12);
        assert!(matches!(
            encoder.store.get(Uid::new(7)),
            Some(Node::ByteBuffer { class: Some(c), .. }) if c.get() == 11
        ));
        assert_eq!(encoder.object_count(), 13);
    }

    #[test]
    fn nested_dictionary_numbered_before_contents() {
        let policy = ClassPolicy::default();
        let mut encoder = ContainerEncoder::new(&policy);
        let dict = Dictionary::new()
            .with("inner", Dictionary::new().with("blob", vec![9u8]))
            .with("after", 1i64);
        let root = encoder.encode_dictionary(&dict).unwrap();

        // $null, root, "inner", inner dict, "blob", buffer, data class,
        // dict class, "after", 1
        let (inner_keys, inner_values, inner_class) = dictionary_node(&encoder, Uid::new(3));
        assert_eq!(inner_keys, [4]);
        assert_eq!(inner_values, [5]);
        assert_eq!(inner_class, 7);
        assert!(matches!(
            encoder.store.get(Uid::new(5)),
            Some(Node::ByteBuffer { class: Some(c), .. }) if c.get() == 6
        ));

        let (keys, values, class) = dictionary_node(&encoder, root);
        assert_eq!(keys, [2, 8]);
        assert_eq!(values, [3, 9]);
        assert_eq!(class, 7);
        assert_eq!(encoder.object_count(), 10);
    }

    #[test]
    fn buffers_bound_to_shared_class() {
        let policy = ClassPolicy::default();
        let mut encoder = ContainerEncoder::new(&policy);
        let dict = Dictionary::new()
            .with("a", vec![1u8; 10])
            .with("b", vec![1u8; 10]);
        let root = encoder.encode_dictionary(&dict).unwrap();
        let (_, values, _) = dictionary_node(&encoder, root);
        assert_ne!(values[0], values[1]);

        let classes: Vec<_> = values
            .iter()
            .map(|&v| match encoder.store.get(Uid::new(v)) {
                Some(Node::ByteBuffer { class, .. }) => *class,
                other => panic!("expected buffer, got {other:?}"),
            })
            .collect();
        assert!(classes[0].is_some());
        assert_eq!(classes[0], classes[1]);
    }

    #[test]
    fn finish_binds_loose_buffers() {
        let policy = ClassPolicy::default();
        let mut encoder = ContainerEncoder::new(&policy);
        let root = encoder.store.reserve();
        let key = encoder.intern_string("blob");
        let blob = encoder.encode_byte_buffer(b"xyz");
        let class = encoder.classes.class_uid(&mut encoder.store, &policy.dictionary);
        encoder
            .store
            .fill(
                root,
                Node::Dictionary {
                    keys: vec![key],
                    values: vec![blob],
                    class,
                },
            )
            .unwrap();

        let envelope = encoder.finish(root, &ArchiverConfig::default()).unwrap();
        assert!(matches!(
            envelope.get(blob),
            Some(Node::ByteBuffer { class: Some(_), .. })
        ));
    }

    #[test]
    fn empty_dictionary_layout() {
        let policy = ClassPolicy::default();
        let mut encoder = ContainerEncoder::new(&policy);
        let root = encoder.encode_dictionary(&Dictionary::new()).unwrap();
        let (keys, values, class) = dictionary_node(&encoder, root);
        assert!(keys.is_empty());
        assert!(values.is_empty());
        assert_eq!(class, 2);
        assert_eq!(encoder.object_count(), 3);
    }
}
