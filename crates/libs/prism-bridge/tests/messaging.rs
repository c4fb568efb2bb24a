//! End-to-end typed exchange between two bridges over in-process channels.
//!
//! Each test uses its own channel name; one bridge plays the authority, the
//! other the peer, standing in for the engine and renderer processes.

use std::collections::HashSet;
use std::sync::mpsc;
use std::time::Duration;

use prism_bridge::{Bridge, ChannelParams, CodecError, LinkRole, Packable, Packer, Unpacker};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wait<T>(rx: &mpsc::Receiver<T>) -> T {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("message within deadline")
}

#[derive(Clone, Debug, PartialEq)]
struct Transform {
    x: f32,
    y: f32,
    z: f32,
}

impl Packable for Transform {
    fn pack(&self, packer: &mut Packer) {
        packer.write_f32(self.x);
        packer.write_f32(self.y);
        packer.write_f32(self.z);
    }

    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: unpacker.read_f32()?,
            y: unpacker.read_f32()?,
            z: unpacker.read_f32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct ActorSpawn {
    kind: u16,
    name: Option<String>,
    transform: Transform,
}

impl Packable for ActorSpawn {
    fn pack(&self, packer: &mut Packer) {
        packer.write_u16(self.kind);
        packer.write_string(self.name.as_deref());
        self.transform.pack(packer);
    }

    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            kind: unpacker.read_u16()?,
            name: unpacker.read_string()?,
            transform: Transform::unpack(unpacker)?,
        })
    }
}

fn sample_spawn() -> ActorSpawn {
    ActorSpawn {
        kind: 3,
        name: Some("turret".to_string()),
        transform: Transform {
            x: 1.0,
            y: -2.5,
            z: 0.25,
        },
    }
}

#[test]
fn values_and_strings_round_trip() {
    init_logging();
    let params = ChannelParams::new("it.values", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (health_tx, health_rx) = mpsc::channel();
    game.receive_value::<i32>("Health", move |value| {
        let _ = health_tx.send(value);
    })
    .expect("receive value");
    let (label_tx, label_rx) = mpsc::channel();
    game.receive_string("Label", move |value| {
        let _ = label_tx.send(value);
    })
    .expect("receive string");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.send_value("Health", 42i32).expect("send value");
    remote.send_string("Label", None).expect("send null");
    remote.send_string("Label", Some("")).expect("send empty");
    remote
        .send_string("Label", Some("boss"))
        .expect("send text");

    assert_eq!(wait(&health_rx), 42);
    assert_eq!(wait(&label_rx), None);
    assert_eq!(wait(&label_rx), Some(String::new()));
    assert_eq!(wait(&label_rx), Some("boss".to_string()));
}

#[test]
fn value_lists_arrive_in_exact_order() {
    init_logging();
    let params = ChannelParams::new("it.lists", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (tx, rx) = mpsc::channel();
    game.receive_value_list::<f32>("Speeds", move |items| {
        let _ = tx.send(items);
    })
    .expect("receive list");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote
        .send_value_list("Speeds", Some(vec![2.0f32, 7.0, 21.0]))
        .expect("send list");
    remote
        .send_value_array("Speeds", &[1.0f32, 2.0])
        .expect("send array");
    remote
        .send_value_list::<f32>("Speeds", None)
        .expect("send null list");

    assert_eq!(wait(&rx), Some(vec![2.0, 7.0, 21.0]));
    assert_eq!(wait(&rx), Some(vec![1.0, 2.0]));
    assert_eq!(wait(&rx), None);
}

#[test]
fn value_sets_keep_membership() {
    init_logging();
    let params = ChannelParams::new("it.sets", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (tx, rx) = mpsc::channel();
    game.receive_value_set::<u32>("Visible", move |items| {
        let _ = tx.send(items);
    })
    .expect("receive set");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    let sent: HashSet<u32> = [4, 8, 15].into_iter().collect();
    remote
        .send_value_set("Visible", Some(sent.clone()))
        .expect("send set");

    assert_eq!(wait(&rx), Some(sent));
}

#[test]
fn objects_round_trip_with_null_preserved() {
    init_logging();
    let params = ChannelParams::new("it.objects", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    game.register_object_type::<ActorSpawn>().expect("register");
    let (tx, rx) = mpsc::channel();
    game.receive_object::<ActorSpawn>("Spawn", move |value| {
        let _ = tx.send(value);
    })
    .expect("receive object");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.register_object_type::<ActorSpawn>().expect("register");

    let spawn = sample_spawn();
    remote
        .send_object("Spawn", Some(spawn.clone()))
        .expect("send object");
    remote
        .send_object::<ActorSpawn>("Spawn", None)
        .expect("send null object");

    assert_eq!(wait(&rx), Some(spawn));
    assert_eq!(wait(&rx), None);
}

#[test]
fn object_and_string_collections_round_trip() {
    init_logging();
    let params = ChannelParams::new("it.collections", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    game.register_object_type::<Transform>().expect("register");
    let (obj_tx, obj_rx) = mpsc::channel();
    game.receive_object_list::<Transform>("Path", move |items| {
        let _ = obj_tx.send(items);
    })
    .expect("receive object list");
    let (str_tx, str_rx) = mpsc::channel();
    game.receive_string_list("Tags", move |items| {
        let _ = str_tx.send(items);
    })
    .expect("receive string list");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.register_object_type::<Transform>().expect("register");

    let path = vec![
        Transform {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
        Transform {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        },
    ];
    remote
        .send_object_array("Path", &path)
        .expect("send object array");
    remote
        .send_string_list(
            "Tags",
            Some(vec![Some("alpha".to_string()), None, Some(String::new())]),
        )
        .expect("send string list");

    assert_eq!(wait(&obj_rx), Some(path));
    assert_eq!(
        wait(&str_rx),
        Some(vec![Some("alpha".to_string()), None, Some(String::new())])
    );
}

#[test]
fn unregistered_id_warns_once_and_traffic_continues() {
    init_logging();
    let params = ChannelParams::new("it.unknown-id", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let (warn_tx, warn_rx) = mpsc::channel();
    engine
        .on_warning(move |message| {
            let _ = warn_tx.send(message.to_string());
        })
        .expect("warning hook");

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (tx, rx) = mpsc::channel();
    game.receive_value::<i32>("Known", move |value| {
        let _ = tx.send(value);
    })
    .expect("receive");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.send_value("Nowhere", 1i32).expect("send unknown");
    remote.send_value("Known", 2i32).expect("send known");

    assert_eq!(wait(&rx), 2);
    let warning = wait(&warn_rx);
    assert!(warning.contains("Nowhere"), "unexpected warning: {warning}");
    assert!(
        warn_rx.try_recv().is_err(),
        "exactly one warning expected"
    );
}

#[test]
fn mismatched_payload_shape_warns_and_drops() {
    init_logging();
    let params = ChannelParams::new("it.mismatch", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let (warn_tx, warn_rx) = mpsc::channel();
    engine
        .on_warning(move |message| {
            let _ = warn_tx.send(message.to_string());
        })
        .expect("warning hook");

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (tx, rx) = mpsc::channel();
    game.receive_value::<f32>("Speed", move |value| {
        let _ = tx.send(value);
    })
    .expect("receive");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.send_value("Speed", 10i32).expect("send wrong type");
    remote.send_value("Speed", 12.5f32).expect("send right type");

    assert_eq!(wait(&rx), 12.5);
    let warning = wait(&warn_rx);
    assert!(warning.contains("Speed"), "unexpected warning: {warning}");
}

#[test]
fn ping_measures_a_round_trip() {
    init_logging();
    let params = ChannelParams::new("it.ping", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let _game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    let (tx, rx) = mpsc::channel();
    remote
        .receive_ping(move |latency| {
            let _ = tx.send(latency);
        })
        .expect("receive ping");
    remote.send_ping().expect("send ping");

    let latency = wait(&rx);
    assert!(latency < Duration::from_secs(2));
}

#[test]
fn starting_the_default_channel_twice_fails_fast() {
    init_logging();
    let engine = Bridge::new(LinkRole::Authority);
    engine.start().expect("first start");
    let err = engine.start().expect_err("second start must fail");
    assert!(matches!(err, prism_bridge::Error::AlreadyAttached(_)));
}

#[test]
fn debug_hook_sees_outgoing_envelopes() {
    init_logging();
    let params = ChannelParams::new("it.debug", 1 << 16);
    let engine = Bridge::new(LinkRole::Authority);
    let renderer = Bridge::new(LinkRole::Peer);

    let (debug_tx, debug_rx) = mpsc::channel();
    renderer
        .on_debug(move |line| {
            let _ = debug_tx.send(line.to_string());
        })
        .expect("debug hook");

    let game = engine
        .messenger_on("Game", LinkRole::Authority, &params)
        .expect("engine messenger");
    let (tx, rx) = mpsc::channel();
    game.receive_value::<u8>("Tick", move |value| {
        let _ = tx.send(value);
    })
    .expect("receive");

    let remote = renderer
        .messenger_on("Game", LinkRole::Peer, &params)
        .expect("renderer messenger");
    remote.send_value("Tick", 9u8).expect("send");
    assert_eq!(wait(&rx), 9);

    // The ready announcement comes first, then the typed envelope.
    let mut lines = vec![wait(&debug_rx), wait(&debug_rx)];
    lines.retain(|line| line.contains("Game/Tick"));
    assert_eq!(lines.len(), 1, "expected one trace for Game/Tick");
}
