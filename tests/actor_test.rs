use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use fairpool::{Actor, ActorError, ActorRef, FairPool, Future, SpawnScheduler};

use test_helpers::{init_logging, small_pool, wait_until, DEFAULT_DEADLINE};

#[test]
fn receive_observes_message_without_sender() {
    init_logging();
    let scheduler = Arc::new(SpawnScheduler);
    let (tx, rx) = mpsc::channel();

    let actor = Actor::with_act(scheduler, move |me: ActorRef<String>| {
        let observed = me
            .receive_from(|msg, sender| (msg, sender.is_none()))
            .expect("first continuation");
        tx.send(observed).unwrap();
    });
    actor.start();
    actor.post("Youhou".to_string());

    let (msg, no_sender) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(msg, "Youhou");
    assert!(no_sender);
}

#[test]
fn receive_observes_the_sender_reference() {
    init_logging();
    let scheduler = Arc::new(SpawnScheduler);
    let (tx, rx) = mpsc::channel();

    let replier: ActorRef<String> = Actor::new(scheduler.clone());
    let actor = Actor::with_act(scheduler, move |me: ActorRef<String>| {
        let observed = me
            .receive_from(|msg, sender| (msg, sender))
            .expect("first continuation");
        tx.send(observed).unwrap();
    });
    actor.start();
    actor.post_from("Youhou".to_string(), replier.clone());

    let (msg, sender) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(msg, "Youhou");
    assert!(Arc::ptr_eq(&sender.unwrap(), &replier));
}

#[test]
fn react_fires_when_a_message_arrives() {
    init_logging();
    let pool = small_pool();
    let (tx, rx) = mpsc::channel();

    let actor: ActorRef<u32> = Actor::new(pool.clone());
    actor
        .react(move |msg| tx.send(msg).unwrap())
        .expect("registration");

    actor.post(7);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
}

#[test]
fn loop_react_preserves_post_order() {
    init_logging();
    let pool = small_pool();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let actor: ActorRef<u32> = Actor::new(pool.clone());
    {
        let seen = seen.clone();
        actor
            .loop_react(move |msg| {
                seen.lock().unwrap().push(msg);
                msg < 10
            })
            .expect("registration");
    }
    for i in 1..=10 {
        actor.post(i);
    }

    assert!(wait_until(DEFAULT_DEADLINE, || seen.lock().unwrap().len() == 10));
    assert_eq!(*seen.lock().unwrap(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn second_continuation_is_rejected() {
    init_logging();
    let pool = small_pool();

    let actor: ActorRef<u32> = Actor::new(pool.clone());
    actor.react(|_| {}).expect("first registration");

    assert_eq!(actor.react(|_| {}).unwrap_err(), ActorError::AlreadySuspended);
    assert_eq!(
        actor.receive(|_| {}).unwrap_err(),
        ActorError::AlreadySuspended
    );
}

#[test]
fn blocked_receiver_rejects_other_continuations() {
    init_logging();
    let scheduler = Arc::new(SpawnScheduler);
    let (entered_tx, entered_rx) = mpsc::channel();

    let actor = Actor::with_act(scheduler, move |me: ActorRef<u32>| {
        entered_tx.send(()).unwrap();
        let _ = me.receive(|_| {});
    });
    actor.start();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    // Give the body a moment to park inside receive.
    thread::sleep(Duration::from_millis(50));

    assert_eq!(actor.react(|_| {}).unwrap_err(), ActorError::AlreadySuspended);
    actor.post(1);
}

#[test]
fn handlers_never_overlap() {
    init_logging();
    let pool = Arc::new(FairPool::new(4).expect("pool"));
    const MESSAGES: usize = 200;

    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(AtomicUsize::new(0));

    let actor: ActorRef<u32> = Actor::new(pool.clone());
    {
        let inside = inside.clone();
        let overlaps = overlaps.clone();
        let processed = processed.clone();
        actor
            .loop_react(move |_| {
                if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_micros(200));
                inside.fetch_sub(1, Ordering::SeqCst);
                processed.fetch_add(1, Ordering::SeqCst) + 1 < MESSAGES
            })
            .expect("registration");
    }

    let posters: Vec<_> = (0..4)
        .map(|_| {
            let actor = actor.clone();
            thread::spawn(move || {
                for _ in 0..MESSAGES / 4 {
                    actor.post(1);
                }
            })
        })
        .collect();
    for poster in posters {
        poster.join().unwrap();
    }

    assert!(wait_until(DEFAULT_DEADLINE, || {
        processed.load(Ordering::SeqCst) == MESSAGES
    }));
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn start_runs_the_body_once() {
    init_logging();
    let pool = small_pool();
    let runs = Arc::new(AtomicUsize::new(0));

    let actor: ActorRef<u32> = Actor::with_act(pool.clone(), {
        let runs = runs.clone();
        move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });
    actor.start();
    actor.start();

    assert!(wait_until(DEFAULT_DEADLINE, || runs.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn ring_of_actors_forwards_until_exhausted() {
    init_logging();
    const NODES: usize = 503;
    const HOPS: u64 = 100_000;

    let pool = Arc::new(FairPool::new(4).expect("pool"));
    let done: Future<u64> = Future::new();
    let forwards = Arc::new(AtomicUsize::new(0));

    let ring: Vec<ActorRef<u64>> = (0..NODES).map(|_| Actor::new(pool.clone())).collect();
    for (i, node) in ring.iter().enumerate() {
        let next = ring[(i + 1) % NODES].clone();
        let signal = done.clone();
        let forwards = forwards.clone();
        node.loop_react(move |hop| {
            if hop == 0 {
                let _ = signal.set_value(forwards.load(Ordering::Relaxed) as u64);
                false
            } else {
                forwards.fetch_add(1, Ordering::Relaxed);
                next.post(hop - 1);
                true
            }
        })
        .expect("ring registration");
    }

    ring[0].post(HOPS);
    assert!(done.wait_timeout(Duration::from_secs(60)));
    assert_eq!(done.get_value().unwrap(), HOPS);
}

#[test]
fn receive_loop_round_trips_between_two_actors() {
    init_logging();
    let scheduler = Arc::new(SpawnScheduler);
    let (tx, rx) = mpsc::channel();

    let echo: ActorRef<u32> = Actor::with_act(scheduler.clone(), |me: ActorRef<u32>| {
        loop {
            let again = me
                .receive_from(|msg, sender| {
                    if let Some(sender) = sender {
                        sender.post(msg + 1);
                    }
                    msg != 0
                })
                .expect("echo continuation");
            if !again {
                break;
            }
        }
    });
    echo.start();

    let caller = Actor::with_act(scheduler, {
        let echo = echo.clone();
        move |me: ActorRef<u32>| {
            echo.post_from(41, me.clone());
            let reply = me.receive(|msg| msg).expect("caller continuation");
            tx.send(reply).unwrap();
            echo.post(0);
        }
    });
    caller.start();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
}
