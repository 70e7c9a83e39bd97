use std::thread;

/// Seam to the node's job-dispatch facility.
///
/// The store hands backend reads that could not be answered from cache to a
/// dispatcher and delivers the result through a oneshot channel. No ordering
/// is required between dispatched jobs. The facility itself lives outside
/// this crate; these implementations cover tests and embedding.
pub trait Dispatcher: Send + Sync {
    /// Run the job at some point, on any thread.
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs each job immediately on the calling thread.
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}

/// Runs each job on its own detached thread.
pub struct ThreadDispatcher;

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        thread::spawn(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn inline_runs_on_calling_thread() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        InlineDispatcher.dispatch(Box::new(move || flag.store(true, Ordering::SeqCst)));
        // Inline dispatch completes before returning.
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn thread_dispatcher_runs_job() {
        let (tx, rx) = mpsc::channel();
        ThreadDispatcher.dispatch(Box::new(move || tx.send(42).unwrap()));
        assert_eq!(rx.recv().unwrap(), 42);
    }
}
