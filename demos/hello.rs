// Smallest possible actor program: one actor, one blocking receive.

use std::sync::Arc;

use fairpool::{Actor, ActorRef, Future, SpawnScheduler};

fn main() {
    fairpool::logging::init_default();

    let scheduler = Arc::new(SpawnScheduler);
    let done: Future<bool> = Future::new();

    let signal = done.clone();
    let greeter = Actor::with_act(scheduler, move |me: ActorRef<String>| {
        let who = me.receive(|name| name).expect("first continuation");
        println!("hello, {who}!");
        let _ = signal.set_value(true);
    });

    greeter.start();
    greeter.post("world".to_string());
    done.wait();
}
