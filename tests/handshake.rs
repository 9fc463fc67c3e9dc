use std::sync::Arc;

use devp2p_wire::p2p::{
    Capability, DISCONNECT, HELLO, HelloInfo, LocalIdentity, P2PProtocol, PING, PONG,
    UNKNOWN_REASON,
};
use devp2p_wire::protocol::encode_list;
use devp2p_wire::{CommandCache, HEADER_SIZE, Payload, Sedes, Transport, Value};
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Default)]
struct Wire {
    frames: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl Transport for Wire {
    fn send(&self, header: &[u8], body: &[u8]) {
        self.frames.lock().push((header.to_vec(), body.to_vec()));
    }
}

fn identity() -> LocalIdentity {
    LocalIdentity::new(
        vec![Capability::new("eth", 62), Capability::new("eth", 63)],
        30303,
        vec![0xa5u8; 64],
    )
}

fn base() -> P2PProtocol<Wire> {
    P2PProtocol::with_cache(Wire::default(), identity(), Arc::new(CommandCache::new())).unwrap()
}

#[test]
fn ping_scenario() {
    let cache = CommandCache::new();
    let ping = cache.bind(PING, 0, false).unwrap();
    let frame = ping.encode(&Payload::empty()).unwrap();

    assert_eq!(frame.header().len(), HEADER_SIZE);
    assert_eq!(&frame.header()[..6], &[0x00, 0x00, 0x02, 0xc2, 0x80, 0x80]);
    assert_eq!(frame.body()[0], 0x02);
    assert_eq!(ping.decode(frame.body()).unwrap(), Payload::empty());
}

#[test]
fn hello_is_never_compressed() {
    let proto = base();
    proto.send_handshake().unwrap();
    proto.set_snappy_support(true);
    proto.send_handshake().unwrap();

    let frames = proto.transport().frames.lock();
    assert_eq!(frames[0], frames[1]);
    drop(frames);

    let hello = proto.command_for(&HELLO).unwrap();
    assert!(hello.snappy_support());
    assert!(!hello.compresses());
}

#[test]
fn pong_compresses_once_negotiated() {
    let proto = base();
    proto.send_pong().unwrap();
    proto.set_snappy_support(true);
    proto.send_pong().unwrap();

    let frames = proto.transport().frames.lock();
    assert_ne!(frames[0].1, frames[1].1);
    assert_eq!(frames[0].1[0], 0x03);
    assert_eq!(frames[1].1[0], 0x03);
}

const CAPABILITY: Sedes = Sedes::List(&[Sedes::Text, Sedes::BigEndianInt]);

// Hello as a later protocol version might send it, with a sixth field.
const FUTURE_HELLO: [Sedes; 6] = [
    Sedes::BigEndianInt,
    Sedes::Text,
    Sedes::CountableList(&CAPABILITY),
    Sedes::BigEndianInt,
    Sedes::Binary,
    Sedes::BigEndianInt,
];

#[test]
fn hello_tolerates_appended_fields() {
    let cache = CommandCache::new();
    let hello = cache.bind(HELLO, 0, false).unwrap();
    let payload = encode_list(
        &FUTURE_HELLO,
        &[
            Value::from(6u64),
            Value::from("future/v9"),
            Value::List(vec![Value::from(&Capability::new("eth", 68))]),
            Value::from(0u64),
            Value::from(&[1u8; 64][..]),
            Value::from(7u64),
        ],
    )
    .unwrap();
    let body = [&[0x80][..], &payload[..]].concat();

    let decoded = hello.decode(&body).unwrap();
    let info = HelloInfo::from_payload(&decoded).unwrap();
    assert_eq!(info.version, 6);
    assert_eq!(info.client_version_string, "future/v9");
    assert_eq!(info.capabilities, vec![Capability::new("eth", 68)]);
    assert_eq!(decoded.as_fields().unwrap().len(), 5);
}

#[test]
fn disconnect_reason_fallback() {
    let proto = base();
    let known = proto
        .encode(&DISCONNECT, &Payload::from_iter([("reason", 3u64)]))
        .unwrap();
    let unknown = proto
        .encode(&DISCONNECT, &Payload::from_iter([("reason", 99u64)]))
        .unwrap();

    let (_, known) = proto.decode(known.body()).unwrap();
    let (_, unknown) = proto.decode(unknown.body()).unwrap();
    assert_eq!(known.get("reason_name"), Some(&Value::from("useless_peer")));
    assert_eq!(unknown.get("reason_name"), Some(&Value::from(UNKNOWN_REASON)));
    assert_eq!(unknown.get("reason"), Some(&Value::Uint(99)));
}

#[test]
fn wrong_command_for_bound_decoder() {
    let cache = CommandCache::new();
    let ping = cache.bind(PING, 0, false).unwrap();
    let pong = cache.bind(PONG, 0, false).unwrap();
    let frame = pong.encode(&Payload::empty()).unwrap();
    let err = ping.decode(frame.body()).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(err.to_string(), "wrong packet type: 3, expected 2");
}

fn capability_strategy() -> impl Strategy<Value = Capability> {
    ("[a-z]{3}", 0u64..1000).prop_map(|(name, version)| Capability::new(name, version))
}

proptest! {
    /// Property: any Hello built from a local identity decodes back to it
    #[test]
    fn prop_hello_roundtrip(
        capabilities in prop::collection::vec(capability_strategy(), 0..8),
        listen_port in any::<u16>(),
        public_key in prop::collection::vec(any::<u8>(), 64),
        snappy in any::<bool>(),
    ) {
        let identity = LocalIdentity::new(capabilities.clone(), listen_port, public_key.clone());
        let proto = P2PProtocol::with_cache(
            Wire::default(),
            identity,
            Arc::new(CommandCache::new()),
        )
        .unwrap();
        proto.set_snappy_support(snappy);
        proto.send_handshake().unwrap();

        let body = proto.transport().frames.lock()[0].1.clone();
        prop_assert_eq!(body.len() % 16, 0);
        let (_, payload) = proto.decode(&body).unwrap();
        let info = HelloInfo::from_payload(&payload).unwrap();
        prop_assert_eq!(info.capabilities, capabilities);
        prop_assert_eq!(info.listen_port, u64::from(listen_port));
        prop_assert_eq!(info.remote_pubkey.as_ref(), public_key.as_slice());
    }

    /// Property: every Disconnect code decodes, known or not
    #[test]
    fn prop_disconnect_never_fails_on_code(code in any::<u64>()) {
        let proto = base();
        let frame = proto
            .encode(&DISCONNECT, &Payload::from_iter([("reason", code)]))
            .unwrap();
        let (_, payload) = proto.decode(frame.body()).unwrap();
        prop_assert_eq!(
            payload.get("reason_name"),
            Some(&Value::from(devp2p_wire::p2p::reason_name(code)))
        );
    }
}
