use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

use tracing::debug;

use crate::error::ActorError;
use crate::scheduler::Scheduler;

/// Shared handle to an actor.
pub type ActorRef<M> = Arc<Actor<M>>;

/// Continuation stored by `react`, consumed by the next delivered message.
type ReactHandler<M> = Box<dyn FnOnce(M, Option<ActorRef<M>>) + Send>;

/// Message-loop body scheduled by `start`.
type ActorBody<M> = Box<dyn FnOnce(ActorRef<M>) + Send>;

/// Where the actor is in its message-loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No pending continuation.
    Inactive,
    /// A thread is blocked inside `receive`.
    Receiving,
    /// A react handler is registered and waiting for a message.
    PendingReact,
    /// `inner_react` is draining the mailbox.
    Reacting,
}

/// State guarded by the actor's single mutex.
struct Core<M: Send + 'static> {
    mailbox: VecDeque<(M, Option<ActorRef<M>>)>,
    phase: Phase,
    handler: Option<ReactHandler<M>>,
    body: Option<ActorBody<M>>,
}

/// A message-driven entity whose loop runs on a shared [`Scheduler`].
///
/// An actor processes messages of type `M` one at a time. Two usage modes:
///
/// - *Blocking receive*: `receive` parks the calling thread on the mailbox
///   until a message arrives. Simple, but it pins a worker for the wait.
/// - *Reactive*: `react` registers a continuation and returns immediately;
///   the next `post` re-arms the actor on the scheduler. Many reactive
///   actors multiplex onto a small pool this way.
///
/// # Thread Safety
/// One mutex guards the mailbox, the phase, and the stored continuation; a
/// condition variable wakes blocked receivers. The phase machine admits at
/// most one active continuation, so no two handler invocations ever run
/// concurrently on the same actor, however parallel the scheduler is. The
/// scheduler is never invoked while the actor lock is held.
pub struct Actor<M: Send + 'static> {
    core: Mutex<Core<M>>,
    cond: Condvar,
    scheduler: Arc<dyn Scheduler>,
}

impl<M: Send + 'static> Actor<M> {
    /// Creates an actor with no body. Drive it with `post` plus `receive`,
    /// `react`, or `loop_react` from wherever the host likes.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> ActorRef<M> {
        Self::build(scheduler, None)
    }

    /// Creates an actor whose message loop is `act`, run on the scheduler
    /// once `start` is called.
    pub fn with_act<F>(scheduler: Arc<dyn Scheduler>, act: F) -> ActorRef<M>
    where
        F: FnOnce(ActorRef<M>) + Send + 'static,
    {
        Self::build(scheduler, Some(Box::new(act)))
    }

    fn build(scheduler: Arc<dyn Scheduler>, body: Option<ActorBody<M>>) -> ActorRef<M> {
        Arc::new(Self {
            core: Mutex::new(Core {
                mailbox: VecDeque::new(),
                phase: Phase::Inactive,
                handler: None,
                body,
            }),
            cond: Condvar::new(),
            scheduler,
        })
    }

    /// Schedules the actor's body. Does nothing when the actor has no body
    /// or has already been started.
    pub fn start(self: &Arc<Self>) {
        let body = self.core.lock().unwrap().body.take();
        if let Some(body) = body {
            let me = self.clone();
            self.scheduler.schedule(Box::new(move || body(me)));
        }
    }

    /// Appends a message to the mailbox.
    pub fn post(self: &Arc<Self>, msg: M) {
        self.deliver(msg, None);
    }

    /// Appends a message together with a reply-to reference.
    pub fn post_from(self: &Arc<Self>, msg: M, sender: ActorRef<M>) {
        self.deliver(msg, Some(sender));
    }

    fn deliver(self: &Arc<Self>, msg: M, sender: Option<ActorRef<M>>) {
        let mut core = self.core.lock().unwrap();
        core.mailbox.push_back((msg, sender));
        match core.phase {
            Phase::Receiving => {
                drop(core);
                self.cond.notify_one();
            }
            Phase::PendingReact => {
                core.phase = Phase::Reacting;
                drop(core);
                self.schedule_inner_react();
            }
            // An inactive actor just accumulates; a reacting one is already
            // draining and will pick this message up.
            Phase::Inactive | Phase::Reacting => {}
        }
    }

    /// Blocks the calling thread until a message arrives, then handles it
    /// and returns the handler's value.
    ///
    /// This pins the thread for the duration of the wait; prefer `react` on
    /// small pools.
    pub fn receive<R>(self: &Arc<Self>, handler: impl FnOnce(M) -> R) -> Result<R, ActorError> {
        self.receive_from(|msg, _sender| handler(msg))
    }

    /// `receive` variant whose handler also sees the sender reference.
    pub fn receive_from<R>(
        self: &Arc<Self>,
        handler: impl FnOnce(M, Option<ActorRef<M>>) -> R,
    ) -> Result<R, ActorError> {
        let mut core = self.core.lock().unwrap();
        if core.phase != Phase::Inactive {
            return Err(ActorError::AlreadySuspended);
        }
        core.phase = Phase::Receiving;
        while core.mailbox.is_empty() {
            core = self.cond.wait(core).unwrap();
        }
        let (msg, sender) = core.mailbox.pop_front().unwrap();
        drop(core);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(msg, sender)));
        self.core.lock().unwrap().phase = Phase::Inactive;
        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Registers `handler` for the next message and returns immediately.
    ///
    /// The actor is re-armed on the scheduler when a message is available;
    /// no thread is pinned in the meantime.
    pub fn react(self: &Arc<Self>, handler: impl FnOnce(M) + Send + 'static) -> Result<(), ActorError> {
        self.react_from(move |msg, _sender| handler(msg))
    }

    /// `react` variant whose handler also sees the sender reference.
    pub fn react_from(
        self: &Arc<Self>,
        handler: impl FnOnce(M, Option<ActorRef<M>>) + Send + 'static,
    ) -> Result<(), ActorError> {
        let mut core = self.core.lock().unwrap();
        match core.phase {
            Phase::Receiving | Phase::PendingReact => Err(ActorError::AlreadySuspended),
            Phase::Reacting => {
                // Called from inside a handler: the draining loop picks the
                // new continuation up without a trip through the scheduler.
                core.handler = Some(Box::new(handler));
                Ok(())
            }
            Phase::Inactive => {
                core.handler = Some(Box::new(handler));
                if core.mailbox.is_empty() {
                    core.phase = Phase::PendingReact;
                } else {
                    core.phase = Phase::Reacting;
                    drop(core);
                    self.schedule_inner_react();
                }
                Ok(())
            }
        }
    }

    /// Keeps reacting while `handler` returns `true`.
    pub fn loop_react<F>(self: &Arc<Self>, mut handler: F) -> Result<(), ActorError>
    where
        F: FnMut(M) -> bool + Send + 'static,
    {
        self.loop_react_from(move |msg, _sender| handler(msg))
    }

    /// `loop_react` variant whose handler also sees the sender reference.
    ///
    /// The continuation re-registers itself from inside the current handler
    /// invocation, so the drain loop carries on without rescheduling.
    pub fn loop_react_from<F>(self: &Arc<Self>, mut handler: F) -> Result<(), ActorError>
    where
        F: FnMut(M, Option<ActorRef<M>>) -> bool + Send + 'static,
    {
        let me = self.clone();
        self.react_from(move |msg, sender| {
            if handler(msg, sender) {
                let _ = me.loop_react_from(handler);
            }
        })
    }

    fn schedule_inner_react(self: &Arc<Self>) {
        let me = self.clone();
        self.scheduler.schedule(Box::new(move || me.inner_react()));
    }

    /// Drains the mailbox through the registered continuation.
    ///
    /// Bounded by the mailbox size observed on entry: once the budget is
    /// spent the actor reschedules itself, so one busy actor cannot
    /// monopolise a worker thread and fairness across actors is cooperative.
    fn inner_react(self: Arc<Self>) {
        let mut core = self.core.lock().unwrap();
        let mut budget = core.mailbox.len();
        loop {
            if core.mailbox.is_empty() {
                // The next post re-arms us.
                core.phase = Phase::PendingReact;
                return;
            }
            if budget == 0 {
                drop(core);
                self.schedule_inner_react();
                return;
            }
            let handler = match core.handler.take() {
                Some(handler) => handler,
                None => {
                    core.phase = Phase::Inactive;
                    return;
                }
            };
            let (msg, sender) = core.mailbox.pop_front().unwrap();
            budget -= 1;
            drop(core);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(msg, sender)));
            core = self.core.lock().unwrap();
            if let Err(payload) = outcome {
                // Restore a restartable state before the panic continues.
                core.phase = Phase::Inactive;
                core.handler = None;
                drop(core);
                debug!("actor handler panicked, state restored to inactive");
                panic::resume_unwind(payload);
            }
            if core.handler.is_none() {
                core.phase = Phase::Inactive;
                return;
            }
        }
    }
}
