// Two actors exchanging a counted volley over a shared pool.
//
// The ponger echoes every ball back to whoever sent it; the pinger counts
// volleys and publishes the total when the rally is over. Both actors run
// reactively, so the two-thread pool is never pinned between messages.

use std::sync::Arc;

use fairpool::{Actor, ActorRef, FairPool, Future};

const VOLLEYS: u32 = 10;

fn main() -> anyhow::Result<()> {
    fairpool::logging::init_default();

    let pool = Arc::new(FairPool::new(2)?);
    let done: Future<u32> = Future::new();

    let ponger: ActorRef<u32> = Actor::new(pool.clone());
    ponger
        .loop_react_from(|ball, sender| {
            println!("pong {ball}");
            if let Some(sender) = sender {
                sender.post(ball);
            }
            true
        })
        .expect("ponger registration");

    let signal = done.clone();
    let pinger = Actor::with_act(pool.clone(), {
        let ponger = ponger.clone();
        move |me: ActorRef<u32>| {
            let serve = me.clone();
            ponger.post_from(1, serve.clone());
            me.loop_react(move |ball| {
                println!("ping {ball}");
                if ball >= VOLLEYS {
                    let _ = signal.set_value(ball);
                    false
                } else {
                    ponger.post_from(ball + 1, serve.clone());
                    true
                }
            })
            .expect("pinger registration");
        }
    });

    pinger.start();
    let total = done.get_value()?;
    println!("rally over after {total} volleys");
    Ok(())
}
