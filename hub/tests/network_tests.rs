use common::{DataFormat, DomainEvent, NetworkError, SensorRecord};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensor_hub::network::{callback, Callback, Network};
use sensor_hub::transport::MemoryBus;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const V3: &str = "pupil-mobile-v3";
const V4: &str = "pupil-mobile-v4";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Seen = Arc<Mutex<Vec<(DataFormat, DomainEvent)>>>;

struct Rig {
    bus: MemoryBus,
    network: Network,
    seen: Seen,
}

impl Rig {
    fn started() -> Self {
        init();
        let bus = MemoryBus::new();
        let mut network = Network::with_defaults(Arc::new(bus.clone()));
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        network.set_callbacks(vec![recorder(seen.clone())]);
        network.start().unwrap();
        Rig { bus, network, seen }
    }

    fn drain(&mut self) {
        while self.network.has_events() {
            self.network.poll().unwrap();
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|(_, event)| event.subject().to_string())
            .collect()
    }
}

fn recorder(seen: Seen) -> Callback {
    callback(move |format, event| {
        seen.lock().push((format, event.clone()));
        Ok(())
    })
}

fn payload(value: Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

fn attach(uuid: &str) -> Vec<u8> {
    payload(json!({
        "subject": "attach",
        "sensor_uuid": uuid,
        "sensor_name": format!("sensor {}", uuid),
        "sensor_type": "video",
    }))
}

fn detach(uuid: &str) -> Vec<u8> {
    payload(json!({"subject": "detach", "sensor_uuid": uuid}))
}

#[test]
fn test_registry_tracks_net_effect_of_random_sequences() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _round in 0..20 {
        let mut rig = Rig::started();
        let peer = Uuid::new_v4();
        let mut expected: HashSet<String> = HashSet::new();
        let mut notifications = 0;

        for _ in 0..60 {
            let uuid = format!("s{}", rng.gen_range(0..8));
            if rng.gen_bool(0.5) {
                rig.bus.shout(peer, "phone", V4, attach(&uuid));
                if expected.insert(uuid) {
                    notifications += 1;
                }
            } else {
                rig.bus.shout(peer, "phone", V4, detach(&uuid));
                if expected.remove(&uuid) {
                    notifications += 1;
                }
            }
            rig.drain();
        }

        let node = rig.network.node(DataFormat::V4).unwrap();
        for i in 0..8 {
            let uuid = format!("s{}", i);
            assert_eq!(node.registry().get(&uuid).is_some(), expected.contains(&uuid));
        }
        assert_eq!(rig.seen.lock().len(), notifications);
    }
}

#[test]
fn test_duplicate_attach_notifies_once() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(peer, "phone", V4, attach("cam"));
    rig.bus.shout(peer, "phone", V4, attach("cam"));
    rig.drain();
    assert_eq!(rig.subjects(), vec!["attach"]);
}

#[test]
fn test_unknown_detach_is_silent() {
    let mut rig = Rig::started();
    rig.bus.shout(Uuid::new_v4(), "phone", V4, detach("never-seen"));
    rig.drain();
    assert!(rig.seen.lock().is_empty());
}

#[test]
fn test_exit_detaches_exactly_the_peers_sensors() {
    let mut rig = Rig::started();
    let gone = Uuid::new_v4();
    let other = Uuid::new_v4();
    rig.bus.shout(gone, "phone-a", V4, attach("a1"));
    rig.bus.shout(gone, "phone-a", V3, attach("a2"));
    rig.bus.shout(gone, "phone-a", V4, attach("a3"));
    rig.bus.shout(other, "phone-b", V4, attach("b1"));
    rig.drain();
    rig.seen.lock().clear();

    rig.bus.announce_exit(gone, "phone-a");
    rig.drain();

    let seen = rig.seen.lock();
    let mut detached: Vec<&str> = seen
        .iter()
        .map(|(_, event)| {
            assert_eq!(event.subject(), "detach");
            event.sensor_uuid().unwrap()
        })
        .collect();
    detached.sort();
    assert_eq!(detached, vec!["a1", "a2", "a3"]);

    let gone_hex = gone.simple().to_string();
    assert!(rig
        .network
        .sensors()
        .iter()
        .all(|record| record.host_uuid != gone_hex));
    assert_eq!(rig.network.sensors().len(), 1);
}

#[test]
fn test_rejoin_reports_every_known_sensor() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    for uuid in ["a", "b", "c"] {
        rig.bus.shout(peer, "phone", V4, attach(uuid));
    }
    rig.bus.shout(peer, "phone", V3, attach("d"));
    rig.drain();
    rig.seen.lock().clear();

    rig.network.rejoin().unwrap();
    assert_eq!(rig.subjects(), vec!["detach"; 4]);
    assert!(rig.network.running());

    // Peers re-announce after the rejoin and must be reported again.
    rig.bus.shout(peer, "phone", V4, attach("a"));
    rig.drain();
    assert_eq!(rig.subjects().last().map(String::as_str), Some("attach"));
}

#[test]
fn test_malformed_payload_is_contained() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(peer, "phone", V4, br#"{"subject": "attach", "sensor_uu"#.to_vec());
    rig.bus.shout(peer, "phone", V4, vec![0xc3, 0x28]);
    rig.bus.shout(peer, "phone", V4, payload(json!({"subject": "attach"})));
    rig.bus.shout(peer, "phone", V4, payload(json!({"subject": "wave", "sensor_uuid": "x"})));
    while rig.network.has_events() {
        assert!(rig.network.poll().is_ok());
    }
    assert!(rig.seen.lock().is_empty());
    assert!(rig.network.sensors().is_empty());
}

#[test]
fn test_version_skew_warns_once_per_node() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    for _ in 0..3 {
        rig.bus.announce_join(peer, "phone", "pupil-mobile-v10");
    }
    rig.drain();
    for node in rig.network.nodes() {
        assert!(node.version_gate().warned_older());
        assert!(!node.version_gate().warned_newer());
    }

    for _ in 0..3 {
        rig.bus.announce_join(peer, "phone", "pupil-mobile-v40");
    }
    rig.drain();
    for node in rig.network.nodes() {
        assert!(node.version_gate().warned_newer());
    }
    assert!(rig.seen.lock().is_empty());
}

#[test]
fn test_sensor_lookup_across_nodes() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(peer, "phone", V3, attach("old-cam"));
    rig.bus.shout(peer, "phone", V4, attach("new-cam"));
    rig.drain();

    let old = rig.network.sensor("old-cam", Vec::new()).unwrap();
    assert_eq!(old.format(), DataFormat::V3);
    let new = rig.network.sensor("new-cam", Vec::new()).unwrap();
    assert_eq!(new.format(), DataFormat::V4);
    assert!(matches!(
        rig.network.sensor("ghost", Vec::new()),
        Err(NetworkError::NotFound(uuid)) if uuid == "ghost"
    ));
}

#[test]
fn test_sensor_prefers_first_node_holding_uuid() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(peer, "phone", V4, attach("shared"));
    rig.bus.shout(peer, "phone", V3, attach("shared"));
    rig.drain();
    assert_eq!(rig.network.sensors().len(), 2);

    let handle = rig.network.sensor("shared", Vec::new()).unwrap();
    assert_eq!(handle.format(), DataFormat::V3);

    rig.bus.shout(peer, "phone", V3, detach("shared"));
    rig.drain();
    let handle = rig.network.sensor("shared", Vec::new()).unwrap();
    assert_eq!(handle.format(), DataFormat::V4);

    rig.bus.shout(peer, "phone", V4, detach("shared"));
    rig.drain();
    assert!(matches!(
        rig.network.sensor("shared", Vec::new()),
        Err(NetworkError::NotFound(_))
    ));
}

#[test]
fn test_mistyped_optional_keys_do_not_drop_messages() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(
        peer,
        "phone",
        V4,
        payload(json!({"subject": "attach", "sensor_uuid": "a", "sensor_name": null})),
    );
    rig.bus.shout(
        peer,
        "phone",
        V4,
        payload(json!({"subject": "attach", "sensor_uuid": "b", "sensor_name": "cam"})),
    );
    rig.bus.shout(
        peer,
        "phone",
        V4,
        payload(json!({"subject": "detach", "sensor_uuid": "b", "sensor_name": 7})),
    );
    rig.drain();

    assert_eq!(rig.subjects(), vec!["attach", "attach", "detach"]);
    let remaining: Vec<String> = rig
        .network
        .sensors()
        .into_iter()
        .map(|record| record.sensor_uuid)
        .collect();
    assert_eq!(remaining, vec!["a"]);

    let seen = rig.seen.lock();
    let (_, DomainEvent::Detach(record)) = &seen[2] else {
        panic!("expected detach, got {:?}", seen[2]);
    };
    assert_eq!(record.sensor_name, "cam");
}

#[test]
fn test_detach_returns_attach_metadata() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(
        peer,
        "phone",
        V4,
        payload(json!({
            "subject": "attach",
            "sensor_uuid": "led",
            "sensor_type": "event",
            "color": "red",
        })),
    );
    rig.bus.shout(peer, "phone", V4, detach("led"));
    rig.drain();

    let seen = rig.seen.lock();
    let (format, DomainEvent::Detach(record)) = &seen[1] else {
        panic!("expected detach, got {:?}", seen[1]);
    };
    assert_eq!(*format, DataFormat::V4);
    assert_eq!(record.attributes.get("color"), Some(&json!("red")));
    assert_eq!(record.sensor_type, "event");
    assert_eq!(record.host_name, "phone");
}

#[test]
fn test_host_identity_comes_from_transport() {
    let mut rig = Rig::started();
    let peer = Uuid::new_v4();
    rig.bus.shout(
        peer,
        "real-phone",
        V4,
        payload(json!({
            "subject": "attach",
            "sensor_uuid": "s",
            "host_uuid": "fake",
            "host_name": "fake",
        })),
    );
    rig.drain();
    let sensors: Vec<SensorRecord> = rig.network.sensors();
    assert_eq!(sensors[0].host_uuid, peer.simple().to_string());
    assert_eq!(sensors[0].host_name, "real-phone");
}

#[test]
fn test_observer_failure_reaches_poll_caller() {
    let mut rig = Rig::started();
    rig.network.add_callback(callback(|_, event| {
        Err(NetworkError::Observer(format!(
            "rejected {}",
            event.sensor_uuid().unwrap_or("")
        )))
    }));
    rig.bus.shout(Uuid::new_v4(), "phone", V4, attach("cam"));

    let err = rig.network.poll().unwrap_err();
    assert_eq!(err, NetworkError::Observer("rejected cam".to_string()));
    assert_eq!(rig.subjects(), vec!["attach"]);
    assert_eq!(rig.network.sensors().len(), 1);
}

#[test]
fn test_stop_and_restart() {
    let mut rig = Rig::started();
    rig.network.stop().unwrap();
    assert!(!rig.network.running());
    assert!(rig.bus.sessions().is_empty());
    assert_eq!(rig.bus.shout(Uuid::new_v4(), "phone", V4, attach("cam")), 0);

    rig.network.start().unwrap();
    assert!(rig.network.running());
    assert_eq!(rig.bus.shout(Uuid::new_v4(), "phone", V4, attach("cam")), 1);
}

#[test]
fn test_payloads_from_domain_events_are_accepted() {
    let mut rig = Rig::started();
    let record =
        SensorRecord::new("mic", "Microphone", "annotate").with_attribute("rate", json!(48000));
    let peer = Uuid::new_v4();
    rig.bus.shout(peer, "phone", V4, DomainEvent::Attach(record.clone()).to_payload().unwrap());
    rig.drain();
    rig.bus.shout(peer, "phone", V4, DomainEvent::Detach(record).to_payload().unwrap());
    rig.drain();
    assert_eq!(rig.subjects(), vec!["attach", "detach"]);
}
