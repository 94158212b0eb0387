//! Keyed-archive encoder.
//!
//! Turns a tree of strings, numbers, byte buffers and nested dictionaries into
//! the flat, reference-based object graph that Foundation's
//! `NSKeyedUnarchiver` reads, and serializes it as a binary property list.
//!
//! # Architecture
//!
//! - **ObjectStore**: append-only arena of nodes; a node's UID is its index,
//!   index 0 is the `$null` marker
//! - **ScalarDeduplicator**: one node per distinct (kind, value) string or number
//! - **ClassRegistry**: one class descriptor node per class name per session
//! - **ContainerEncoder**: numbers a dictionary before its contents, then binds
//!   byte buffer and dictionary classes as the dictionary closes
//! - **Envelope**: validated archive with `$version`, `$archiver`, `$top` and
//!   `$objects`, rendered through `nska-bplist`
//!
//! Every encode call is an independent session; nothing is cached between
//! calls, so identical input always yields identical bytes.

pub mod class;
pub mod config;
pub mod dedup;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod store;
pub mod value;

pub use class::{ClassPolicy, ClassRegistry, ClassSpec};
pub use config::{ArchiverConfig, ARCHIVER_NAME, ARCHIVE_VERSION, ROOT_KEY};
pub use dedup::ScalarDeduplicator;
pub use encoder::ContainerEncoder;
pub use envelope::{assemble, Envelope, NULL_MARKER};
pub use error::{ArchiveError, ArchiveResult};
pub use store::{Node, ObjectStore, NULL_UID};
pub use value::{Dictionary, Item, Number};

pub use nska_bplist::{Uid, WriterOptions};

/// Encodes dictionaries with a fixed configuration.
///
/// Holds only immutable configuration, so one archiver can serve any number
/// of encode calls from any thread.
#[derive(Clone, Debug, Default)]
pub struct Archiver {
    config: ArchiverConfig,
}

impl Archiver {
    pub fn new(config: ArchiverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Build and validate the object graph for `root`.
    pub fn encode(&self, root: &Dictionary) -> ArchiveResult<Envelope> {
        let mut encoder = ContainerEncoder::new(&self.config.classes);
        let root_uid = encoder.encode_dictionary(root)?;
        encoder.finish(root_uid, &self.config)
    }

    /// Encode `root` and serialize it to binary property-list bytes.
    pub fn archive(&self, root: &Dictionary) -> ArchiveResult<Vec<u8>> {
        self.encode(root)?.to_bytes(&self.config.writer)
    }

    /// Like [`archive`](Self::archive) for an arbitrary item. The item must
    /// be a dictionary.
    pub fn archive_item(&self, item: &Item) -> ArchiveResult<Vec<u8>> {
        match item.as_dictionary() {
            Some(dict) => self.archive(dict),
            None => Err(ArchiveError::InputShape {
                path: "/".into(),
                found: item.kind_name(),
            }),
        }
    }
}

/// Archive `root` with the default configuration.
pub fn archive(root: &Dictionary) -> ArchiveResult<Vec<u8>> {
    Archiver::default().archive(root)
}

/// Archive an item with the default configuration. The item must be a
/// dictionary.
pub fn archive_item(item: &Item) -> ArchiveResult<Vec<u8>> {
    Archiver::default().archive_item(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nska_bplist::Value;

    fn count_nodes(envelope: &Envelope, pred: impl Fn(&Node) -> bool) -> usize {
        envelope.objects().iter().filter(|n| pred(n)).count()
    }

    fn is_number(node: &Node) -> bool {
        matches!(node, Node::Number(_))
    }

    fn is_class(node: &Node) -> bool {
        matches!(node, Node::ClassDescriptor { .. })
    }

    fn root_values(envelope: &Envelope) -> Vec<Uid> {
        match envelope.get(envelope.root()) {
            Some(Node::Dictionary { values, .. }) => values.clone(),
            other => panic!("root is not a dictionary: {other:?}"),
        }
    }

    /// Resolve a decoded `$objects` array back into an input tree.
    fn resolve(objects: &[Value], uid: Uid) -> Item {
        let object = &objects[uid.as_index()];
        match object {
            Value::String(s) => Item::String(s.clone()),
            Value::Integer(v) => Item::from(*v),
            Value::UnsignedInteger(v) => Item::from(*v),
            Value::Real32(v) => Item::from(*v),
            Value::Real64(v) => Item::from(*v),
            Value::Dictionary(_) => {
                if let Some(data) = object.get("NS.data").and_then(Value::as_data) {
                    return Item::Bytes(data.to_vec());
                }
                let refs = |key| -> Vec<Uid> {
                    object
                        .get(key)
                        .and_then(Value::as_array)
                        .unwrap()
                        .iter()
                        .map(|v| v.as_uid().unwrap())
                        .collect()
                };
                let mut dict = Dictionary::new();
                for (k, v) in refs("NS.keys").into_iter().zip(refs("NS.objects")) {
                    let key = objects[k.as_index()].as_str().unwrap().to_owned();
                    dict.insert(key, resolve(objects, v));
                }
                Item::Dictionary(dict)
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    fn unarchive(bytes: &[u8]) -> Item {
        let plist = nska_bplist::from_bytes(bytes).unwrap();
        let objects = plist.get("$objects").and_then(Value::as_array).unwrap();
        let root = plist
            .get("$top")
            .and_then(|t| t.get("root"))
            .and_then(Value::as_uid)
            .unwrap();
        resolve(objects, root)
    }

    #[test]
    fn float_zeros_share_and_integer_zero_does_not() {
        let dict = Dictionary::new()
            .with("A", 0.0f64)
            .with("B", 0.0f64)
            .with("C", 0i64);
        let envelope = Archiver::default().encode(&dict).unwrap();

        assert_eq!(count_nodes(&envelope, is_number), 2);
        assert_eq!(count_nodes(&envelope, is_class), 1);
        let values = root_values(&envelope);
        assert_eq!(values[0], values[1]);
        assert_ne!(values[0], values[2]);
        // $null, root, three keys, two numbers, one class
        assert_eq!(envelope.object_count(), 8);
    }

    #[test]
    fn equal_buffers_stay_distinct() {
        let blob = vec![7u8; 10];
        let dict = Dictionary::new().with("a", blob.clone()).with("b", blob);
        let envelope = Archiver::default().encode(&dict).unwrap();

        let values = root_values(&envelope);
        assert_ne!(values[0], values[1]);
        assert_eq!(
            count_nodes(&envelope, |n| matches!(n, Node::ByteBuffer { .. })),
            2
        );
        let data_classes = count_nodes(&envelope, |n| {
            matches!(n, Node::ClassDescriptor { name, .. } if name == "NSMutableData")
        });
        assert_eq!(data_classes, 1);
    }

    #[test]
    fn empty_root_has_three_objects() {
        let envelope = Archiver::default().encode(&Dictionary::new()).unwrap();
        assert_eq!(envelope.object_count(), 3);
        assert_eq!(envelope.objects()[0], Node::NullMarker);
        assert!(matches!(
            &envelope.objects()[1],
            Node::Dictionary { keys, values, .. } if keys.is_empty() && values.is_empty()
        ));
        assert!(is_class(&envelope.objects()[2]));
    }

    #[test]
    fn nothing_references_the_null_marker() {
        let dict = Dictionary::new()
            .with("s", "x")
            .with("n", 1i64)
            .with("b", vec![1u8])
            .with("d", Dictionary::new().with("inner", 2.5f64));
        let envelope = Archiver::default().encode(&dict).unwrap();
        for node in envelope.objects() {
            assert!(!node.references().contains(&NULL_UID));
        }
    }

    #[test]
    fn class_descriptor_shared_across_nested_dictionaries() {
        let dict = Dictionary::new()
            .with("a", Dictionary::new().with("x", 1i64))
            .with("b", Dictionary::new().with("y", Dictionary::new()));
        let envelope = Archiver::default().encode(&dict).unwrap();
        assert_eq!(count_nodes(&envelope, is_class), 1);
    }

    #[test]
    fn empty_root_matches_reference_bytes() {
        let expected = hex::decode(
            "62706c6973743030d401020304050616195924617263686976657258246f626a656374735424746f70\
             582476657273696f6e5f100f4e534b657965644172636869766572a307080f55246e756c6cd3090a\
             0b0c0d0e5624636c617373574e532e6b6579735a4e532e6f626a656374738002a0a0d21011121358\
             24636c61737365735a24636c6173736e616d65a31314155f10134e534d757461626c654469637469\
             6f6e6172795c4e5344696374696f6e617279584e534f626a656374d1171854726f6f748001120001\
             86a008111b24293244484e555c646f71727378818c90a6b3bcbfc4c6000000000000010100000000\
             0000001a000000000000000000000000000000cb",
        )
        .unwrap();
        assert_eq!(archive(&Dictionary::new()).unwrap(), expected);
    }

    #[test]
    fn mixed_root_matches_reference_bytes() {
        let dict = Dictionary::new()
            .with("FILENAME", "song")
            .with("SCALE", 4095i64)
            .with("GUI", vec![0u8, 1])
            .with("KNOBTITLE", "song")
            .with("X", 0.5f64);
        let expected = hex::decode(
            "62706c6973743030d401020304050630335924617263686976657258246f626a656374735424746f70\
             582476657273696f6e5f100f4e534b657965644172636869766572ad0708191a1b1c1d1e22232425\
             2c55246e756c6cd3090a0b0c0d135624636c617373574e532e6b6579735a4e532e6f626a65637473\
             800ca50e0f10111280028004800680088009a514151617188003800580078003800a5846494c454e\
             414d4554736f6e67555343414c45110fff53475549d2091f2021574e532e64617461800b42000159\
             4b4e4f425449544c455158233fe0000000000000d2262728295824636c61737365735a24636c6173\
             736e616d65a3292a2b5d4e534d757461626c6544617461564e5344617461584e534f626a656374d2\
             26272d2ea32e2f2b5f10134e534d757461626c6544696374696f6e6172795c4e5344696374696f6e\
             617279d1313254726f6f74800112000186a000080011001b002400290032004400520058005f0066\
             006e0079007b00810083008500870089008b00910093009500970099009b00a400a900af00b200b6\
             00bb00c300c500c800d200d400dd00e200eb00f600fa0108010f0118011d0121013701440147014c\
             014e0000000000000201000000000000003400000000000000000000000000000153",
        )
        .unwrap();
        assert_eq!(archive(&dict).unwrap(), expected);
    }

    #[test]
    fn two_buffers_share_one_class_reference() {
        let blob = vec![7u8; 10];
        let dict = Dictionary::new().with("a", blob.clone()).with("b", blob);
        let expected = hex::decode(
            "62706c6973743030d401020304050625285924617263686976657258246f626a656374735424746f70\
             582476657273696f6e5f100f4e534b657965644172636869766572a80708131418191a2155246e75\
             6c6cd3090a0b0c0d105624636c617373574e532e6b6579735a4e532e6f626a656374738007a20e0f\
             80028004a21112800380055161d209151617574e532e6461746180064a0707070707070707070751\
             62d209151617d21b1c1d1e5824636c61737365735a24636c6173736e616d65a31e1f205d4e534d75\
             7461626c6544617461564e5344617461584e534f626a656374d21b1c2223a32324205f10134e534d\
             757461626c6544696374696f6e6172795c4e5344696374696f6e617279d1262754726f6f74800112\
             000186a000080011001b0024002900320044004d0053005a00610069007400760079007b007d0080\
             008200840086008b0093009500a000a200a700ac00b500c000c400d200d900e200e700eb0101010e\
             011101160118000000000000020100000000000000290000000000000000000000000000011d",
        )
        .unwrap();
        let bytes = archive(&dict).unwrap();
        assert_eq!(bytes.len(), 399);
        assert_eq!(bytes, expected);
        assert_eq!(unarchive(&bytes), Item::Dictionary(dict));
    }

    #[test]
    fn signed_zeros_match_reference_bytes() {
        let dict = Dictionary::new().with("a", 0.0f64).with("b", -0.0f64);
        let envelope = Archiver::default().encode(&dict).unwrap();
        let values = root_values(&envelope);
        assert_eq!(values[0], values[1]);
        assert_eq!(count_nodes(&envelope, is_number), 1);

        let expected = hex::decode(
            "62706c6973743030d40102030405061d205924617263686976657258246f626a656374735424746f70\
             582476657273696f6e5f100f4e534b657965644172636869766572a607081314151655246e756c6c\
             d3090a0b0c0d105624636c617373574e532e6b6579735a4e532e6f626a656374738005a20e0f8002\
             8004a211128003800351612300000000000000005162d21718191a5824636c61737365735a24636c\
             6173736e616d65a31a1b1c5f10134e534d757461626c6544696374696f6e6172795c4e5344696374\
             696f6e617279584e534f626a656374d11e1f54726f6f74800112000186a008111b242932444b5158\
             5f67727477797b7e8082848d8f949da8acc2cfd8dbe0e20000000000000101000000000000002100\
             0000000000000000000000000000e7",
        )
        .unwrap();
        assert_eq!(archive(&dict).unwrap(), expected);
    }

    #[test]
    fn decoded_archive_resolves_to_input() {
        let dict = Dictionary::new()
            .with("name", "Chord Sequence")
            .with("label", "Chord Sequence")
            .with("count", -3i64)
            .with("half", 0.5f64)
            .with("single", 1.5f32)
            .with("code", "café".as_bytes())
            .with("empty", Vec::<u8>::new())
            .with(
                "nested",
                Dictionary::new()
                    .with("deeper", Dictionary::new().with("blob", vec![1u8, 2, 3]))
                    .with("count", -3i64),
            );
        let bytes = archive(&dict).unwrap();
        assert_eq!(unarchive(&bytes), Item::Dictionary(dict));
    }

    #[test]
    fn insertion_order_writer_option() {
        let config = ArchiverConfig {
            writer: WriterOptions { sort_keys: false },
            ..Default::default()
        };
        let dict = Dictionary::new().with("b", 1i64).with("a", 2i64);
        let bytes = Archiver::new(config).archive(&dict).unwrap();
        let plist = nska_bplist::from_bytes(&bytes).unwrap();
        let Value::Dictionary(entries) = &plist else {
            panic!("top level is not a dictionary");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["$version", "$archiver", "$top", "$objects"]);
        assert_eq!(unarchive(&bytes), Item::Dictionary(dict));
    }

    #[test]
    fn custom_classes_from_toml() {
        let config = ArchiverConfig::from_toml_str(
            r#"
            [classes.dictionary]
            name = "NSDictionary"
            classes = ["NSDictionary", "NSObject"]
            "#,
        )
        .unwrap();
        let envelope = Archiver::new(config).encode(&Dictionary::new()).unwrap();
        assert!(matches!(
            &envelope.objects()[2],
            Node::ClassDescriptor { name, classes } if name == "NSDictionary" && classes.len() == 2
        ));
    }

    #[test]
    fn non_dictionary_item_rejected() {
        let err = archive_item(&Item::from(4095i64)).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::InputShape { ref path, found: "number" } if path == "/"
        ));
    }

    #[test]
    fn json_input_archives() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"FILENAME": "song", "SCALE": 4095, "X": 0.5}"#).unwrap();
        let item = Item::try_from(json).unwrap();
        let bytes = archive_item(&item).unwrap();
        assert_eq!(unarchive(&bytes), item);
    }

    #[test]
    fn write_to_sink_matches_bytes() {
        let dict = Dictionary::new().with("k", "v");
        let archiver = Archiver::default();
        let envelope = archiver.encode(&dict).unwrap();
        let mut sink = Vec::new();
        envelope.write_to(&mut sink, &archiver.config().writer).unwrap();
        assert_eq!(sink, archiver.archive(&dict).unwrap());
    }

    #[test]
    fn archiver_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Archiver>();
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = Item> {
            prop_oneof![
                "[a-z ]{0,8}".prop_map(Item::String),
                any::<i64>().prop_map(Item::from),
                (-4i64..4).prop_map(|n| Item::from(n as f64 / 2.0)),
                proptest::collection::vec(any::<u8>(), 0..16).prop_map(Item::Bytes),
            ]
        }

        fn dictionary() -> impl Strategy<Value = Dictionary> {
            let flat = proptest::collection::vec(("[a-d]{1,2}", leaf()), 0..8)
                .prop_map(|entries| entries.into_iter().collect::<Dictionary>());
            flat.prop_recursive(3, 24, 4, |inner| {
                proptest::collection::vec(
                    ("[a-d]{1,2}", prop_oneof![leaf(), inner.prop_map(Item::Dictionary)]),
                    0..6,
                )
                .prop_map(|entries| entries.into_iter().collect::<Dictionary>())
            })
        }

        proptest! {
            #[test]
            fn encoding_is_deterministic(dict in dictionary()) {
                prop_assert_eq!(archive(&dict).unwrap(), archive(&dict).unwrap());
            }

            #[test]
            fn archives_decode_to_input(dict in dictionary()) {
                let bytes = archive(&dict).unwrap();
                prop_assert_eq!(unarchive(&bytes), Item::Dictionary(dict));
            }

            #[test]
            fn strings_never_duplicated(dict in dictionary()) {
                let envelope = Archiver::default().encode(&dict).unwrap();
                let mut strings: Vec<&str> = envelope
                    .objects()
                    .iter()
                    .filter_map(|n| match n {
                        Node::String(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect();
                let total = strings.len();
                strings.sort_unstable();
                strings.dedup();
                prop_assert_eq!(strings.len(), total);
            }
        }
    }
}
