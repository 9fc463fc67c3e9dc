use std::sync::Arc;
use std::thread;

use devp2p_wire::p2p::{self, DisconnectReason, LocalIdentity, P2PProtocol, P2P};
use devp2p_wire::protocol::{IdSpace, read_frame_size};
use devp2p_wire::{
    CommandCache, CommandSchema, ErrorKind, HEADER_SIZE, Payload, Protocol, ProtocolSpec, Request,
    Sedes, Transport, Value,
};
use parking_lot::Mutex;

const STATUS: CommandSchema = CommandSchema::new(
    "Status",
    0,
    &[
        ("protocol_version", Sedes::BigEndianInt),
        ("network_id", Sedes::BigEndianInt),
        ("best_hash", Sedes::Binary),
    ],
);
const NEW_BLOCK_HASHES: CommandSchema = CommandSchema::items(
    "NewBlockHashes",
    1,
    Sedes::List(&[Sedes::Binary, Sedes::BigEndianInt]),
);
const GET_BLOCK_BODIES: CommandSchema = CommandSchema::items("GetBlockBodies", 5, Sedes::Binary);
const BLOCK_BODIES: CommandSchema =
    CommandSchema::items("BlockBodies", 6, Sedes::CountableList(&Sedes::Binary));

const ETH: ProtocolSpec = ProtocolSpec {
    name: "eth",
    version: 63,
    cmd_length: 17,
    commands: &[STATUS, NEW_BLOCK_HASHES, GET_BLOCK_BODIES, BLOCK_BODIES],
};

#[derive(Default)]
struct Wire {
    frames: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl Wire {
    /// Bodies with padding stripped, in send order.
    fn payloads(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .iter()
            .map(|(header, body)| {
                let header: [u8; HEADER_SIZE] = header.as_slice().try_into().unwrap();
                body[..read_frame_size(&header)].to_vec()
            })
            .collect()
    }
}

impl Transport for Wire {
    fn send(&self, header: &[u8], body: &[u8]) {
        self.frames.lock().push((header.to_vec(), body.to_vec()));
    }
}

fn status() -> Payload {
    Payload::from_iter([
        ("protocol_version", Value::from(63u64)),
        ("network_id", Value::from(1u64)),
        ("best_hash", Value::from(&[0x42u8; 32][..])),
    ])
}

fn hashes() -> Payload {
    Payload::List(
        (0..4u64)
            .map(|n| Value::List(vec![Value::from(&[n as u8; 32][..]), Value::from(n)]))
            .collect(),
    )
}

#[test]
fn subprotocols_share_one_connection() {
    let wire = Arc::new(Wire::default());
    let cache = Arc::new(CommandCache::new());
    let mut ids = IdSpace::new();

    let base_offset = ids.reserve(&P2P).unwrap();
    assert_eq!(base_offset, 0);
    let base = P2PProtocol::with_cache(
        Arc::clone(&wire),
        LocalIdentity::default(),
        Arc::clone(&cache),
    )
    .unwrap();

    let eth_offset = ids.reserve(&ETH).unwrap();
    assert_eq!(eth_offset, p2p::P2P_CMD_LENGTH);
    let eth = Protocol::with_cache(ETH, Arc::clone(&wire), eth_offset, false, Arc::clone(&cache))
        .unwrap();

    base.send_handshake().unwrap();
    eth.send_request(&Request::new(STATUS, status()).expecting(STATUS))
        .unwrap();
    eth.send_request(&Request::new(NEW_BLOCK_HASHES, hashes()))
        .unwrap();
    base.send_disconnect(DisconnectReason::ClientQuitting).unwrap();

    let payloads = wire.payloads();
    assert_eq!(payloads.len(), 4);

    // Each body routes to exactly one protocol by its command id.
    let (hello, _) = base.decode(&payloads[0]).unwrap();
    assert_eq!(hello.cmd_id(), 0);
    assert!(eth.decode(&payloads[0]).is_err());

    let (cmd, payload) = eth.decode(&payloads[1]).unwrap();
    assert_eq!(cmd.cmd_id(), 16);
    assert_eq!(payload, status());

    let (cmd, payload) = eth.decode(&payloads[2]).unwrap();
    assert_eq!(cmd.cmd_id(), 17);
    assert_eq!(payload, hashes());

    let (cmd, payload) = base.decode(&payloads[3]).unwrap();
    assert_eq!(cmd.schema(), &p2p::DISCONNECT);
    assert_eq!(payload.get("reason_name"), Some(&Value::from("client_quitting")));
    assert!(eth.decode(&payloads[3]).is_err());
}

#[test]
fn same_schema_at_two_offsets() {
    let cache = CommandCache::new();
    let low = cache.bind(BLOCK_BODIES, 16, true).unwrap();
    let high = cache.bind(BLOCK_BODIES, 40, true).unwrap();
    assert_eq!(low.cmd_id(), 22);
    assert_eq!(high.cmd_id(), 46);

    let bodies = Payload::List(vec![Value::List(vec![Value::from(&b"tx"[..])])]);
    let low_frame = low.encode(&bodies).unwrap();
    let high_frame = high.encode(&bodies).unwrap();

    // Identical apart from the leading command id.
    assert_eq!(low_frame.payload()[1..], high_frame.payload()[1..]);
    assert_eq!(low.decode(&low_frame.payload()).unwrap(), bodies);
    assert_eq!(high.decode(&high_frame.payload()).unwrap(), bodies);
    assert!(low.decode(&high_frame.payload()).unwrap_err().is_malformed());
}

#[test]
fn compression_upgrade_after_handshake() {
    let wire = Arc::new(Wire::default());
    let cache = Arc::new(CommandCache::new());
    let eth = Protocol::with_cache(ETH, Arc::clone(&wire), 16, false, Arc::clone(&cache)).unwrap();

    eth.send_request(&Request::new(STATUS, status())).unwrap();
    eth.set_snappy_support(true);
    assert!(eth.snappy_support());
    eth.send_request(&Request::new(STATUS, status())).unwrap();

    let payloads = wire.payloads();
    assert_ne!(payloads[0], payloads[1]);

    let plain = cache.bind(STATUS, 16, false).unwrap();
    let snappy = cache.bind(STATUS, 16, true).unwrap();
    assert_eq!(plain.decode(&payloads[0]).unwrap(), status());
    assert_eq!(snappy.decode(&payloads[1]).unwrap(), status());
    assert_eq!(eth.decode(&payloads[1]).unwrap().1, status());

    // Toggling back reuses the cached uncompressed bindings.
    eth.set_snappy_support(false);
    assert!(Arc::ptr_eq(&eth.command_for(&STATUS).unwrap(), &plain));
}

#[test]
fn receiver_decodes_whole_frames_across_upgrade() {
    let wire = Arc::new(Wire::default());
    let cache = Arc::new(CommandCache::new());
    let eth = Protocol::with_cache(ETH, Arc::clone(&wire), 16, false, Arc::clone(&cache)).unwrap();

    eth.send_request(&Request::new(STATUS, status())).unwrap();
    eth.set_snappy_support(true);
    eth.send_request(&Request::new(NEW_BLOCK_HASHES, hashes())).unwrap();

    let frames = wire.frames.lock().clone();
    let mut decoded = Vec::new();
    for (header, body) in &frames {
        let header: [u8; HEADER_SIZE] = header.as_slice().try_into().unwrap();
        decoded.push(eth.decode_frame(&header, body).unwrap().1);
    }
    assert_eq!(decoded, vec![status(), hashes()]);
}

#[test]
fn protocols_near_the_top_of_the_id_space() {
    let wire = Arc::new(Wire::default());
    let mut ids = IdSpace::new();
    let top = u64::MAX - ETH.cmd_length;
    assert_eq!(ids.reserve_at(&ETH, top).unwrap(), top);
    assert_eq!(ids.reserve(&ETH).unwrap_err().kind(), ErrorKind::Definition);

    let eth = Protocol::new(ETH, Arc::clone(&wire), top, false).unwrap();
    assert_eq!(eth.command_for(&BLOCK_BODIES).unwrap().cmd_id(), top + 6);

    let err = Protocol::new(ETH, Arc::clone(&wire), top + 1, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Definition);
}

#[test]
fn toggle_is_atomic_under_concurrent_sends() {
    let wire = Arc::new(Wire::default());
    let cache = Arc::new(CommandCache::new());
    let eth = Arc::new(
        Protocol::with_cache(ETH, Arc::clone(&wire), 16, false, Arc::clone(&cache)).unwrap(),
    );

    let senders: Vec<_> = (0..4)
        .map(|_| {
            let eth = Arc::clone(&eth);
            thread::spawn(move || {
                for _ in 0..50 {
                    let commands = eth.commands();
                    // Every command in one snapshot carries the same flag.
                    let flag = commands.snappy_support();
                    assert!(commands.commands().iter().all(|c| c.snappy_support() == flag));
                    eth.send_request(&Request::new(STATUS, status())).unwrap();
                }
            })
        })
        .collect();
    let toggler = {
        let eth = Arc::clone(&eth);
        thread::spawn(move || {
            for round in 0..20 {
                eth.set_snappy_support(round % 2 == 0);
            }
        })
    };
    for handle in senders {
        handle.join().unwrap();
    }
    toggler.join().unwrap();

    let plain = cache.bind(STATUS, 16, false).unwrap();
    let snappy = cache.bind(STATUS, 16, true).unwrap();
    let payloads = wire.payloads();
    assert_eq!(payloads.len(), 200);
    for body in payloads {
        let decoded = plain.decode(&body).or_else(|_| snappy.decode(&body)).unwrap();
        assert_eq!(decoded, status());
    }
}

#[test]
fn request_for_foreign_command_is_rejected() {
    let wire = Arc::new(Wire::default());
    let eth = Protocol::with_cache(
        ETH,
        Arc::clone(&wire),
        16,
        false,
        Arc::new(CommandCache::new()),
    )
    .unwrap();
    let err = eth
        .send_request(&Request::new(p2p::PING, Payload::empty()))
        .unwrap_err();
    assert!(!err.is_malformed());
    assert!(wire.frames.lock().is_empty());
}

#[test]
fn oversized_frame_is_rejected() {
    let cache = CommandCache::new();
    let bodies = cache.bind(GET_BLOCK_BODIES, 16, false).unwrap();
    let blob = Value::from(vec![0u8; 1 << 24].as_slice());
    let err = bodies.encode(&Payload::List(vec![blob])).unwrap_err();
    assert!(matches!(err, devp2p_wire::Error::FrameTooLarge { .. }));
}
