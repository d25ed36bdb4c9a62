//! Property tests for decoding and inspection.

use std::collections::BTreeMap;

use bytes::Bytes;
use karabo_bridge_client::codec::MsgPackCodec;
use karabo_bridge_client::data::checked_size;
use karabo_bridge_client::inspect::{render_frame, PARSE_ERROR};
use karabo_bridge_client::protocol::decode_reply;
use karabo_bridge_client::BridgeError;
use proptest::prelude::*;

fn header(content: &str, extra: &[(&str, MsgPackField)]) -> Bytes {
    let mut map: BTreeMap<&str, MsgPackField> = BTreeMap::new();
    map.insert("source", MsgPackField::Str("DET".to_string()));
    map.insert("content", MsgPackField::Str(content.to_string()));
    for (key, value) in extra {
        map.insert(key, value.clone());
    }
    Bytes::from(MsgPackCodec::encode(&map).unwrap())
}

#[derive(Clone, serde::Serialize)]
#[serde(untagged)]
enum MsgPackField {
    Str(String),
    Shape(Vec<u64>),
}

proptest! {
    #[test]
    fn size_is_product_of_shape(shape in prop::collection::vec(0usize..64, 0..5)) {
        prop_assert_eq!(checked_size(&shape).unwrap(), shape.iter().product::<usize>());
    }

    #[test]
    fn overflowing_shape_is_rejected(extra in 2usize..16) {
        let shape = vec![usize::MAX / 2 + 1, extra];
        prop_assert!(matches!(checked_size(&shape), Err(BridgeError::Overflow(_))));
    }

    #[test]
    fn array_elements_survive_decoding(values in prop::collection::vec(any::<u16>(), 0..256)) {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let frames = vec![
            header("msgpack", &[]),
            Bytes::from(MsgPackCodec::encode(&BTreeMap::from([("trainId", 1u64)])).unwrap()),
            header("array", &[
                ("path", MsgPackField::Str("image.data".to_string())),
                ("shape", MsgPackField::Shape(vec![values.len() as u64])),
                ("dtype", MsgPackField::Str("uint16".to_string())),
            ]),
            Bytes::from(payload),
        ];

        let reply = decode_reply(frames).unwrap();
        let view = reply["DET"].array("image.data").unwrap();
        prop_assert_eq!(view.size().unwrap(), values.len());
        prop_assert_eq!(view.to_vec::<u16>().unwrap(), values);
    }

    #[test]
    fn odd_frame_count_is_framing_error(
        frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..9)
            .prop_filter("odd count", |frames| frames.len() % 2 == 1)
    ) {
        let frames = frames.into_iter().map(Bytes::from).collect();
        prop_assert!(matches!(decode_reply(frames), Err(BridgeError::Framing(_))));
    }

    #[test]
    fn rendering_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let text = render_frame(&bytes);
        prop_assert!(text.ends_with('\n'));
        if MsgPackCodec::decode_value(&bytes).is_err() {
            prop_assert_eq!(text, format!("{}\n", PARSE_ERROR));
        }
    }
}
