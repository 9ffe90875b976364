//! Single background thread for replay saves and analysis.
//!
//! Tasks run one at a time and in submission order. [`Worker::add_task`]
//! waits for the previous task to finish before handing over the next,
//! so a save queued right after another never races it for the file.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::error::RewindError;

/// A unit of background work. Owns everything it touches.
pub type Task = Box<dyn FnOnce() -> Result<(), RewindError> + Send + 'static>;

/// Owner of the background thread.
///
/// Dropping the worker closes the task channel and joins the thread,
/// which finishes any task already handed over.
pub struct Worker {
    tx: Option<Sender<Task>>,
    done_rx: Receiver<()>,
    in_flight: bool,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread.
    pub fn new() -> Result<Self, RewindError> {
        let (tx, rx) = crossbeam_channel::bounded::<Task>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("rewind-worker".into())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    if let Err(e) = task() {
                        log::error!("background task failed: {e}");
                    }
                    if done_tx.send(()).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| RewindError::WorkerSpawn {
                detail: e.to_string(),
            })?;
        Ok(Self {
            tx: Some(tx),
            done_rx,
            in_flight: false,
            handle: Some(handle),
        })
    }

    /// Queue `task`, blocking until the previous one has finished.
    pub fn add_task(&mut self, task: Task) -> Result<(), RewindError> {
        self.wait_idle();
        let tx = self.tx.as_ref().ok_or(RewindError::WorkerGone)?;
        tx.send(task).map_err(|_| RewindError::WorkerGone)?;
        self.in_flight = true;
        Ok(())
    }

    /// Block until the last queued task has finished.
    pub fn wait_idle(&mut self) {
        if self.in_flight {
            // A closed channel means the thread is gone; nothing is running.
            let _ = self.done_rx.recv();
            self.in_flight = false;
        }
    }

    /// True while a task is queued or running.
    pub fn is_busy(&self) -> bool {
        self.in_flight && self.done_rx.is_empty()
    }
}

impl Worker {
    /// Finish any handed-over task and stop the thread. Later
    /// [`add_task`](Self::add_task) calls fail with `WorkerGone`.
    pub fn shutdown(&mut self) {
        self.tx.take();
        self.wait_idle();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn tasks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut w = Worker::new().unwrap();
        for i in 0..5 {
            let log = Arc::clone(&log);
            w.add_task(Box::new(move || {
                log.lock().unwrap().push(i);
                Ok(())
            }))
            .unwrap();
        }
        w.wait_idle();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failing_task_does_not_stop_the_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut w = Worker::new().unwrap();
        w.add_task(Box::new(|| Err(RewindError::WorkerGone)))
            .unwrap();
        let c = Arc::clone(&count);
        w.add_task(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
        w.wait_idle();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!w.is_busy());
    }

    #[test]
    fn drop_finishes_queued_task() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let mut w = Worker::new().unwrap();
            let c = Arc::clone(&count);
            w.add_task(Box::new(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shut_down_worker_rejects_tasks() {
        let mut w = Worker::new().unwrap();
        w.shutdown();
        assert!(matches!(
            w.add_task(Box::new(|| Ok(()))),
            Err(RewindError::WorkerGone)
        ));
    }
}
