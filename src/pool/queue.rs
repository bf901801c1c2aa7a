//! Bounded three-level priority queue.
//!
//! Dequeue strictly prefers higher priority; within one priority the order
//! is FIFO. Capacity covers all levels together, so a flood of low-priority
//! jobs can fill the queue but can never jump ahead of a high-priority one
//! that got in.

use crate::pool::worker::{Job, Priority};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

pub struct JobQueue {
    levels: Mutex<[VecDeque<Job>; 3]>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            levels: Mutex::new([VecDeque::new(), VecDeque::new(), VecDeque::new()]),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue, or hand the job back when the queue is full or closed.
    pub fn try_push(&self, job: Job) -> Result<(), Job> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(job);
        }
        let mut levels = self.levels.lock().expect("job queue lock poisoned");
        if levels.iter().map(VecDeque::len).sum::<usize>() >= self.capacity {
            return Err(job);
        }
        levels[job.priority.index()].push_back(job);
        drop(levels);
        self.notify.notify_one();
        Ok(())
    }

    fn try_pop(&self) -> Option<Job> {
        let mut levels = self.levels.lock().expect("job queue lock poisoned");
        // High sits at index 0.
        levels.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Wait for the next job; `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            if let Some(job) = self.try_pop() {
                return Some(job);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs and wake every waiting worker.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Remove and return everything still queued.
    pub fn drain(&self) -> Vec<Job> {
        let mut levels = self.levels.lock().expect("job queue lock poisoned");
        let mut jobs = Vec::new();
        for level in levels.iter_mut() {
            jobs.extend(level.drain(..));
        }
        jobs
    }

    /// Queue length per priority, high first.
    pub fn lens(&self) -> [usize; 3] {
        let levels = self.levels.lock().expect("job queue lock poisoned");
        [levels[0].len(), levels[1].len(), levels[2].len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchRequest;
    use url::Url;

    fn job(priority: Priority) -> Job {
        let (job, _rx) =
            Job::new(DispatchRequest::get(Url::parse("https://a.test/").unwrap()), priority, None);
        job
    }

    #[tokio::test]
    async fn strict_priority_order() {
        let queue = JobQueue::new(16);
        queue.try_push(job(Priority::Low)).unwrap();
        queue.try_push(job(Priority::Normal)).unwrap();
        queue.try_push(job(Priority::High)).unwrap();
        queue.try_push(job(Priority::Normal)).unwrap();

        assert_eq!(queue.pop().await.unwrap().priority, Priority::High);
        assert_eq!(queue.pop().await.unwrap().priority, Priority::Normal);
        assert_eq!(queue.pop().await.unwrap().priority, Priority::Normal);
        assert_eq!(queue.pop().await.unwrap().priority, Priority::Low);
    }

    #[tokio::test]
    async fn fifo_within_priority() {
        let queue = JobQueue::new(16);
        let first = job(Priority::Normal);
        let first_id = first.id;
        queue.try_push(first).unwrap();
        queue.try_push(job(Priority::Normal)).unwrap();
        assert_eq!(queue.pop().await.unwrap().id, first_id);
    }

    #[test]
    fn capacity_spans_all_levels() {
        let queue = JobQueue::new(2);
        queue.try_push(job(Priority::Low)).unwrap();
        queue.try_push(job(Priority::High)).unwrap();
        assert!(queue.try_push(job(Priority::High)).is_err());
    }

    #[tokio::test]
    async fn close_wakes_and_drains() {
        let queue = std::sync::Arc::new(JobQueue::new(16));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.close();
        assert!(waiter.await.unwrap().is_none());
        assert!(queue.try_push(job(Priority::Normal)).is_err());
    }
}
