//! Heap snapshot and CPU profiler surfaces over the wire.

use super::harness::Fixture;
use lyra_inspector::engine::{
    EdgeLabel, HeapChild, HeapEdgeKind, HeapNodeInfo, HeapNodeKind, HeapRoots, ObjectTraits,
};
use serde_json::json;

fn seed_heap(fx: &mut Fixture) {
    let obj = fx.engine.add_object("Widget", ObjectTraits::empty(), None);
    let name = fx.engine.add_string("widget-name");
    fx.engine.value_mut(obj).heap = Some(HeapNodeInfo {
        kind: HeapNodeKind::Object,
        name: "Widget".into(),
        self_size: 64,
    });
    fx.engine.value_mut(obj).heap_children = vec![HeapChild {
        kind: HeapEdgeKind::Property,
        label: EdgeLabel::Name("name".into()),
        to: name,
    }];
    fx.engine.roots = HeapRoots {
        handle_scope: vec![obj],
        stack: vec![],
        global_handles: vec![],
        contexts: vec![],
    };
}

#[test]
fn test_take_heap_snapshot_chunks_reassemble() {
    let mut fx = Fixture::new();
    fx.send("HeapProfiler.enable", json!({}));
    seed_heap(&mut fx);
    let result = fx.send("HeapProfiler.takeHeapSnapshot", json!({}));
    assert_eq!(result, json!({}));

    let chunks = fx.transport.notifications("HeapProfiler.addHeapSnapshotChunk");
    assert!(!chunks.is_empty());
    let joined: String = chunks
        .iter()
        .map(|c| c["params"]["chunk"].as_str().unwrap())
        .collect();
    let snapshot: serde_json::Value = serde_json::from_str(&joined).unwrap();

    let node_count = snapshot["snapshot"]["node_count"].as_u64().unwrap() as usize;
    let edge_count = snapshot["snapshot"]["edge_count"].as_u64().unwrap() as usize;
    assert_eq!(snapshot["nodes"].as_array().unwrap().len(), node_count * 6);
    assert_eq!(snapshot["edges"].as_array().unwrap().len(), edge_count * 3);
    assert_eq!(snapshot["strings"][0], "<dummy>");

    // Every edge target is a valid node offset.
    for triple in snapshot["edges"].as_array().unwrap().chunks(3) {
        let to = triple[2].as_u64().unwrap() as usize;
        assert_eq!(to % 6, 0);
        assert!(to / 6 < node_count);
    }

    // The string table has no duplicates.
    let strings = snapshot["strings"].as_array().unwrap();
    let mut seen = std::collections::HashSet::new();
    for s in strings {
        assert!(seen.insert(s.as_str().unwrap().to_string()));
    }
}

#[test]
fn test_snapshot_suppresses_gc_only_for_duration() {
    let mut fx = Fixture::new();
    fx.send("HeapProfiler.enable", json!({}));
    seed_heap(&mut fx);
    fx.send("HeapProfiler.takeHeapSnapshot", json!({}));
    assert!(!fx.engine.gc_suppressed);
}

#[test]
fn test_snapshot_progress_events() {
    let mut fx = Fixture::new();
    fx.send("HeapProfiler.enable", json!({}));
    seed_heap(&mut fx);
    fx.send(
        "HeapProfiler.takeHeapSnapshot",
        json!({ "reportProgress": true }),
    );
    let progress = fx
        .transport
        .notifications("HeapProfiler.reportHeapSnapshotProgress");
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0]["params"]["done"], 0);
    assert_eq!(progress[1]["params"]["finished"], true);
    assert_eq!(
        progress[1]["params"]["done"],
        progress[1]["params"]["total"]
    );
}

#[test]
fn test_snapshot_response_precedes_chunks() {
    let mut fx = Fixture::new();
    fx.send("HeapProfiler.enable", json!({}));
    seed_heap(&mut fx);
    let id = fx.enqueue("HeapProfiler.takeHeapSnapshot", json!({}));
    fx.pump();
    let frames = fx.transport.frames();
    let response_index = frames
        .iter()
        .position(|f| f.call_id == Some(id))
        .unwrap();
    let first_chunk_index = frames
        .iter()
        .position(|f| f.body["method"] == "HeapProfiler.addHeapSnapshotChunk")
        .unwrap();
    assert!(response_index < first_chunk_index);
}

#[test]
fn test_profiler_lifecycle_over_the_wire() {
    let mut fx = Fixture::new();
    fx.send("Profiler.enable", json!({}));
    fx.send("Profiler.setSamplingInterval", json!({ "interval": 500 }));
    fx.send("Profiler.start", json!({}));
    assert_eq!(fx.engine.sampler_interval, Some(500));

    fx.engine.sampler_profile =
        r#"{"nodes":[{"id":1}],"startTime":10,"endTime":20,"samples":[1],"timeDeltas":[0]}"#
            .into();
    let result = fx.send("Profiler.stop", json!({}));
    assert_eq!(result["profile"]["startTime"], 10);
    assert_eq!(result["profile"]["samples"], json!([1]));
    assert_eq!(fx.engine.sampler_interval, None);
}

#[test]
fn test_profiler_stop_without_start_yields_null_profile() {
    let mut fx = Fixture::new();
    fx.send("Profiler.enable", json!({}));
    let result = fx.send("Profiler.stop", json!({}));
    assert_eq!(result["profile"], serde_json::Value::Null);
}

#[test]
fn test_collect_garbage_acknowledged() {
    let mut fx = Fixture::new();
    fx.send("HeapProfiler.enable", json!({}));
    let result = fx.send("HeapProfiler.collectGarbage", json!({}));
    assert_eq!(result, json!({}));
}
