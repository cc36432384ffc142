// Ring benchmark: N actors in a ring pass a decrementing hop counter until
// it reaches zero. Usage: ring [nodes] [hops]
//
// With the defaults (503 nodes, 50_000_000 hops) this exercises the
// cooperative react path hard: every hop is one mailbox delivery plus at
// most one trip through the scheduler.

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fairpool::{Actor, ActorRef, FairPool, FairPoolConfig, Future};

fn main() -> anyhow::Result<()> {
    fairpool::logging::init_default();

    let mut args = env::args().skip(1);
    let nodes: usize = match args.next() {
        Some(arg) => arg.parse()?,
        None => 503,
    };
    let hops: u64 = match args.next() {
        Some(arg) => arg.parse()?,
        None => 50_000_000,
    };

    let pool = Arc::new(FairPool::with_config(FairPoolConfig::default())?);
    let done: Future<u64> = Future::new();
    let forwards = Arc::new(AtomicU64::new(0));

    let ring: Vec<ActorRef<u64>> = (0..nodes).map(|_| Actor::new(pool.clone())).collect();
    for (i, node) in ring.iter().enumerate() {
        let next = ring[(i + 1) % nodes].clone();
        let signal = done.clone();
        let forwards = forwards.clone();
        node.loop_react(move |hop| {
            if hop == 0 {
                let _ = signal.set_value(forwards.load(Ordering::Relaxed));
                false
            } else {
                forwards.fetch_add(1, Ordering::Relaxed);
                next.post(hop - 1);
                true
            }
        })
        .expect("ring registration");
    }

    println!("{nodes} nodes, {hops} hops");
    let started = Instant::now();
    ring[0].post(hops);

    let total = done.get_value()?;
    let elapsed = started.elapsed();
    println!(
        "completed {total} forwards in {elapsed:?} ({:.0} msg/s)",
        total as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
