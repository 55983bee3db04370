use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::JoinHandle as ThreadHandle,
};

use futures::future::{join_all, BoxFuture};
use log::{debug, error, info};
use tokio::{
    runtime::{Builder, Runtime},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::core::{Dispatcher, FetchResult, RunType, Task};

/// Cooperative single-threaded event loop.
///
/// Posted tasks run between turns of a current-thread tokio runtime, never
/// inside it, so a task may call [`Dispatcher::run`] itself. Spawned futures
/// only make progress while the loop is run in [`RunType::Block`] mode.
/// Callbacks executed by spawned futures must not call `run`.
pub struct EventLoop {
    runtime: Runtime,
    sender: UnboundedSender<Task>,
    receiver: Mutex<UnboundedReceiver<Task>>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
    exited: AtomicBool,
}

impl EventLoop {
    pub fn new() -> FetchResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name("pingfetch-loop")
            .build()?;
        let (sender, receiver) = unbounded_channel::<Task>();
        Ok(Self {
            runtime,
            sender,
            receiver: Mutex::new(receiver),
            inflight: Mutex::new(Vec::new()),
            exited: AtomicBool::new(false),
        })
    }

    /// Run the loop on a dedicated thread until [`Dispatcher::exit`].
    pub fn spawn_thread(self: Arc<Self>, name: &str) -> io::Result<ThreadHandle<()>> {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run_forever())
    }

    /// Wait for posted tasks and run each to completion.
    pub fn run_forever(&self) {
        while !self.is_exited() {
            let task = lock(&self.receiver).blocking_recv();
            match task {
                Some(task) => task(),
                None => break,
            }
            self.run(RunType::Block);
        }

        let mut dropped = 0;
        while let Some(task) = self.try_next() {
            drop(task);
            dropped += 1;
        }
        info!("Event loop stopped, {dropped} pending tasks dropped");
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Number of spawned futures not yet collected by a blocking run.
    pub fn inflight(&self) -> usize {
        lock(&self.inflight).len()
    }

    fn try_next(&self) -> Option<Task> {
        lock(&self.receiver).try_recv().ok()
    }

    fn run_posted(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.try_next() {
            task();
            ran += 1;
        }
        ran
    }
}

impl Dispatcher for EventLoop {
    fn post(&self, task: Task) {
        if self.is_exited() {
            debug!("Event loop exited, dropping posted task");
            return;
        }
        if self.sender.send(task).is_err() {
            error!("Event loop channel closed, dropping posted task");
        }
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        let handle = self.runtime.spawn(future);
        lock(&self.inflight).push(handle);
    }

    fn run(&self, run_type: RunType) {
        match run_type {
            RunType::NonBlock => {
                self.run_posted();
            }
            RunType::Block => loop {
                let ran = self.run_posted();

                let handles = std::mem::take(&mut *lock(&self.inflight));
                if handles.is_empty() {
                    if ran == 0 {
                        break;
                    }
                    continue;
                }

                for result in self.runtime.block_on(join_all(handles)) {
                    if let Err(e) = result {
                        error!("Event loop task failed: {e}");
                    }
                }
            },
        }
    }

    fn exit(&self) {
        if !self.exited.swap(true, Ordering::AcqRel) {
            info!("Event loop exit requested");
            // wake up run_forever
            let _ = self.sender.send(Box::new(|| {}));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
