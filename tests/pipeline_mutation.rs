//! Integration tests for chain mutation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use network_pipeline::error::PipelineError;
use network_pipeline::pipeline::{Context, FnHandler, Handler, Message, Mutation, Pipeline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn strings() -> FnHandler<()> {
    FnHandler::new().on_received::<String, _>(|s: &(), v: String, c: u32, ctx: &Context<'_, ()>| {
        ctx.fire_message_received(s, Message::new(v), c)
    })
}

fn seeded() -> Pipeline<()> {
    let pipeline = Pipeline::new();
    pipeline.add_last("framer", FnHandler::new()).unwrap();
    pipeline.add_last("codec", strings()).unwrap();
    pipeline.add_last("app", strings()).unwrap();
    pipeline
}

#[test]
fn test_add_first_and_last_positions() {
    let pipeline = seeded();
    pipeline.add_first("tls", FnHandler::new()).unwrap();
    pipeline.add_last("metrics", FnHandler::new()).unwrap();

    let snapshot = pipeline.snapshot().unwrap();
    assert_eq!(snapshot.forward, vec!["tls", "framer", "codec", "app", "metrics"]);
    let mut reversed = snapshot.backward.clone();
    reversed.reverse();
    assert_eq!(reversed, snapshot.forward);
    assert_eq!(pipeline.len().unwrap(), 5);
}

#[test]
fn test_duplicate_name_leaves_chain_unchanged() {
    let pipeline = seeded();
    let before = pipeline.snapshot().unwrap();
    let mutations_before = pipeline.metrics().snapshot().mutations;

    for result in [
        pipeline.add_first("codec", FnHandler::new()),
        pipeline.add_last("app", FnHandler::new()),
    ] {
        assert!(matches!(result, Err(PipelineError::DuplicateName(name)) if name == "codec" || name == "app"));
    }

    assert_eq!(pipeline.snapshot().unwrap(), before);
    assert_eq!(pipeline.metrics().snapshot().mutations, mutations_before);
}

#[test]
fn test_sentinel_names_are_free_for_handlers() {
    let pipeline = Pipeline::<()>::new();
    pipeline.add_last("head", FnHandler::new()).unwrap();
    pipeline.add_last("tail", FnHandler::new()).unwrap();
    assert_eq!(pipeline.names().unwrap(), vec!["head", "tail"]);
}

#[test]
fn test_remove_missing_codec_keeps_routes() {
    let pipeline = Pipeline::<()>::new();
    pipeline.add_last("framer", FnHandler::new()).unwrap();
    pipeline.add_last("app", strings()).unwrap();
    pipeline
        .fire_message_received(&(), Message::new(String::from("warm")), 0)
        .unwrap();
    let hits_before = pipeline.metrics().snapshot().route_cache_hits;

    let err = pipeline.remove("codec").err().expect("codec is not in the chain");
    assert!(matches!(err, PipelineError::NodeNotFound(ref name) if name == "codec"));
    assert_eq!(err.to_string(), "No handler with name \"codec\"");

    pipeline
        .fire_message_received(&(), Message::new(String::from("again")), 0)
        .unwrap();
    // the head -> app route survived the failed removal
    assert_eq!(pipeline.metrics().snapshot().route_cache_hits, hits_before + 2);
    assert_eq!(pipeline.resolve_received::<String>().unwrap().as_deref(), Some("app"));
}

#[test]
fn test_replace_keeps_position_and_returns_old_handler() {
    let pipeline = seeded();
    let old = pipeline.replace("codec", FnHandler::new()).unwrap();
    assert!(old.as_received().is_some());

    assert_eq!(pipeline.names().unwrap(), vec!["framer", "codec", "app"]);
    assert_eq!(pipeline.resolve_received::<String>().unwrap().as_deref(), Some("app"));

    let err = pipeline
        .replace("missing", FnHandler::new())
        .err()
        .expect("nothing named missing");
    assert!(matches!(err, PipelineError::NodeNotFound(_)));
}

#[test]
fn test_remove_returns_handler_and_reroutes() {
    let pipeline = seeded();
    assert_eq!(pipeline.resolve_received::<String>().unwrap().as_deref(), Some("codec"));
    let removed = pipeline.remove("codec").unwrap();
    assert!(removed.as_received().is_some());
    assert_eq!(pipeline.resolve_received::<String>().unwrap().as_deref(), Some("app"));
    assert!(!pipeline.contains("codec").unwrap());
}

#[test]
fn test_anonymous_names_are_sequential_hex() {
    let pipeline = Pipeline::<()>::new();
    let mut names = Vec::new();
    for _ in 0..11 {
        names.push(pipeline.add_last_anonymous(FnHandler::new()).unwrap());
    }
    names.insert(0, pipeline.add_first_anonymous(FnHandler::new()).unwrap());

    assert_eq!(names[1], "0");
    assert_eq!(names[11], "a");
    assert_eq!(names[0], "b");
    assert_eq!(pipeline.names().unwrap()[0], "b");
}

struct Hooked {
    added: Arc<AtomicUsize>,
    removed: Arc<Mutex<Vec<String>>>,
}

impl Handler<()> for Hooked {
    fn handler_added(&self, _name: &str) {
        self.added.fetch_add(1, Ordering::SeqCst);
    }

    fn handler_removed(&self, name: &str) {
        self.removed.lock().unwrap().push(name.to_string());
    }
}

#[test]
fn test_hooks_run_for_replace_and_remove() {
    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(Mutex::new(Vec::new()));
    let hooked = || Hooked {
        added: added.clone(),
        removed: removed.clone(),
    };

    let pipeline = Pipeline::<()>::new();
    pipeline.add_last("x", hooked()).unwrap();
    pipeline.replace("x", hooked()).unwrap();
    pipeline.remove("x").unwrap();

    assert_eq!(added.load(Ordering::SeqCst), 2);
    assert_eq!(*removed.lock().unwrap(), vec!["x", "x"]);
}

#[test]
fn test_apply_mutation_values() {
    let pipeline = Pipeline::<()>::new();
    assert!(pipeline.apply(Mutation::add_last("a", FnHandler::new())).unwrap().is_none());
    assert!(pipeline.apply(Mutation::add_first("b", FnHandler::new())).unwrap().is_none());
    assert!(pipeline.apply(Mutation::replace("a", strings())).unwrap().is_some());
    assert!(pipeline.apply(Mutation::remove("b")).unwrap().is_some());
    assert_eq!(pipeline.names().unwrap(), vec!["a"]);
    assert_eq!(format!("{:?}", Mutation::<()>::remove("a")), "Remove(\"a\")");
}
