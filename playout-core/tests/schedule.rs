mod common;

use common::{at, night_slot, slot, Channel};
use playout_core::{PlaylistStore, Resolution, SlotResolver};
use serde_json::json;

fn resolver(channel: &Channel) -> SlotResolver {
    SlotResolver::new(PlaylistStore::new(&channel.config))
}

#[test]
fn slot_covering_now_is_scheduled() {
    let channel = Channel::new();
    channel.write_day_playlist(
        "2024-03-01",
        json!([
            night_slot(),
            slot("day", "2024-03-01T06:00:00.000Z", "2024-03-01T18:00:00.000Z", vec![])
        ]),
    );

    let resolution = resolver(&channel).resolve(at(7, 15, 0)).unwrap();
    assert!(resolution.is_scheduled());
    assert_eq!(resolution.slot().unwrap().name, "day");

    let boundary = resolver(&channel).resolve(at(6, 0, 0)).unwrap();
    assert_eq!(boundary.slot().unwrap().name, "night");
}

#[test]
fn uncovered_time_takes_first_default_slot() {
    let channel = Channel::new();
    channel.write_day_playlist("2024-03-01", json!([night_slot()]));
    channel.write_default_playlist(json!([
        slot("loop-a", "2020-01-01T00:00:00.000Z", "2020-01-01T01:00:00.000Z", vec![]),
        slot("loop-b", "2020-01-01T01:00:00.000Z", "2020-01-01T02:00:00.000Z", vec![])
    ]));

    let resolution = resolver(&channel).resolve(at(20, 0, 0)).unwrap();
    match resolution {
        Resolution::Default(slot) => assert_eq!(slot.name, "loop-a"),
        other => panic!("expected default slot, got {other:?}"),
    }
}

#[test]
fn missing_day_and_default_yield_no_slot() {
    let channel = Channel::new();
    let resolution = resolver(&channel).resolve(at(20, 0, 0)).unwrap();
    assert_eq!(resolution, Resolution::NoSlot);
}

#[test]
fn empty_default_playlist_yields_no_slot() {
    let channel = Channel::new();
    channel.write_default_playlist(json!([]));
    let resolution = resolver(&channel).resolve(at(20, 0, 0)).unwrap();
    assert_eq!(resolution, Resolution::NoSlot);
}

#[test]
fn day_playlist_path_uses_stream_and_date() {
    let channel = Channel::new();
    let store = PlaylistStore::new(&channel.config);
    assert_eq!(
        store.day_playlist_path(at(0, 0, 0).date_naive()),
        channel
            .root()
            .join("channel-main/playlists/2024-03-01/playlist.json")
    );
}
