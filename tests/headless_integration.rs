use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use rote::app::{App, Screen};
use rote::config::Config;
use rote::runtime::{FixedTicker, RoteEvent, Runner, TestEventSource};
use rote::store::{Snippet, SnippetStore, SqliteStore};

fn app_with(snippets: &[(&str, &str)]) -> App {
    let store = SqliteStore::open_in_memory().unwrap();
    for (title, code) in snippets {
        store.create(&Snippet::new(*title, *code)).unwrap();
    }
    App::new(Rc::new(store), Config::default()).unwrap()
}

fn key(code: KeyCode) -> RoteEvent {
    RoteEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn type_events(text: &str) -> Vec<RoteEvent> {
    text.chars()
        .map(|c| match c {
            '\n' => key(KeyCode::Enter),
            c => key(KeyCode::Char(c)),
        })
        .collect()
}

/// Drive the app the way the binary does, until the source runs dry or
/// `done` holds.
fn drive(app: &mut App, events: Vec<RoteEvent>, done: impl Fn(&App) -> bool) {
    let (tx, rx) = mpsc::channel();
    for event in events {
        tx.send(event).unwrap();
    }
    drop(tx);

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(2)),
    );

    for _ in 0..200u32 {
        match runner.step() {
            RoteEvent::Key(key) => app.handle_key(key).unwrap(),
            RoteEvent::Resize(w, h) => app.set_viewport(w, h),
            RoteEvent::Tick => app.on_tick(Instant::now()).unwrap(),
        }
        if done(app) || app.should_quit {
            break;
        }
    }
}

// Headless integration using the runtime + App without a TTY
#[test]
fn headless_typing_flow_completes_and_records() {
    let mut app = app_with(&[("two line snippet", "fn f() {\n  1\n}")]);

    let mut events = vec![key(KeyCode::Enter)];
    events.extend(type_events("fn f() {\n"));
    events.push(key(KeyCode::Tab));
    events.extend(type_events("1\n}"));

    drive(&mut app, events, |app| app.status().completed);

    assert_eq!(app.screen, Screen::Typing);
    assert!(app.status().completed);
    let stored = app.store().get(1).unwrap().unwrap();
    assert_eq!(stored.test_count, 1);
    assert_eq!(app.snippets[0].test_count, 1);
}

#[test]
fn wrong_keys_do_not_advance() {
    let mut app = app_with(&[("a short snippet", "ab")]);

    let mut events = vec![key(KeyCode::Enter)];
    events.extend(type_events("xayzb"));
    drive(&mut app, events, |app| app.status().completed);

    assert!(app.status().completed);
    assert_eq!(app.session.as_ref().unwrap().typed(), "ab");
}

#[test]
fn ticks_accumulate_only_while_running() {
    let mut app = app_with(&[("a short snippet", "abc")]);
    app.select(1).unwrap();

    // idle: nothing is due no matter how late the tick
    drive(&mut app, Vec::new(), |_| false);
    app.on_tick(Instant::now() + Duration::from_secs(3)).unwrap();
    assert_eq!(app.session.as_ref().unwrap().elapsed_ms(), 0);

    app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE))
        .unwrap();
    app.on_tick(Instant::now() + Duration::from_millis(1_100))
        .unwrap();
    assert_eq!(app.session.as_ref().unwrap().elapsed_ms(), 1_000);

    drive(&mut app, type_events("bc"), |app| app.status().completed);
    assert!(app.status().completed);
    let frozen = app.session.as_ref().unwrap().elapsed_ms();

    app.on_tick(Instant::now() + Duration::from_secs(10)).unwrap();
    assert_eq!(app.session.as_ref().unwrap().elapsed_ms(), frozen);
    assert_eq!(app.store().get(1).unwrap().unwrap().elapsed, frozen);
}

#[test]
fn steady_typing_still_accumulates_time() {
    let alphabet = "abcdefghijklmnopqrstuvwxyz";
    let mut app = app_with(&[("the alphabet", alphabet)]);
    app.select(1).unwrap();

    // keys arrive faster than the refresh, so the runner never idles into a tick
    let (tx, rx) = mpsc::channel();
    let typist = thread::spawn(move || {
        for c in alphabet.chars() {
            tx.send(key(KeyCode::Char(c))).unwrap();
            thread::sleep(Duration::from_millis(60));
        }
    });

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(100)),
    );
    let started = Instant::now();
    while !app.status().completed && started.elapsed() < Duration::from_secs(10) {
        match runner.step() {
            RoteEvent::Key(key) => app.handle_key(key).unwrap(),
            RoteEvent::Resize(w, h) => app.set_viewport(w, h),
            RoteEvent::Tick => app.on_tick(Instant::now()).unwrap(),
        }
    }
    typist.join().unwrap();

    assert!(app.status().completed);
    let recorded = app.store().get(1).unwrap().unwrap().elapsed;
    assert!(
        recorded >= 1_000,
        "25 gaps of 60 ms should record at least a second, got {recorded}"
    );
}

#[test]
fn random_pick_from_typing_opens_another_snippet() {
    let mut app = app_with(&[("first snippet", "aaa"), ("second snippet", "bbb")]);
    app.select(1).unwrap();

    drive(
        &mut app,
        vec![RoteEvent::Key(KeyEvent::new(
            KeyCode::Char('n'),
            KeyModifiers::CONTROL,
        ))],
        |app| app.selected_id() == Some(2),
    );

    assert_eq!(app.selected_id(), Some(2));
    assert_eq!(app.session.as_ref().unwrap().target(), "bbb");
}

#[test]
fn random_pick_from_home_opens_a_snippet() {
    let mut app = app_with(&[("first snippet", "aaa"), ("second snippet", "bbb")]);

    drive(&mut app, vec![key(KeyCode::Char('r'))], |app| {
        app.selected_id().is_some()
    });

    assert_eq!(app.screen, Screen::Typing);
    let id = app.selected_id().unwrap();
    let expected = if id == 1 { "aaa" } else { "bbb" };
    assert_eq!(app.session.as_ref().unwrap().target(), expected);
}

#[test]
fn quitting_from_home() {
    let mut app = app_with(&[]);
    drive(
        &mut app,
        vec![RoteEvent::Resize(100, 40), key(KeyCode::Char('q'))],
        |_| false,
    );
    assert!(app.should_quit);
}
