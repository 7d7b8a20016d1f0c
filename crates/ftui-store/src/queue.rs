#![forbid(unsafe_code)]

//! FIFO of work deferred while the store is busy.

use std::collections::VecDeque;
use std::fmt;

use crate::config::UpdateOptions;
use crate::dispatch::Delivery;
use crate::error::{Result, StoreError};
use crate::store::Updater;

pub(crate) enum Job {
    /// An update issued with queueing engaged while another operation ran.
    Update {
        path: String,
        updater: Updater,
        options: UpdateOptions,
    },
    /// A delivery to a listener subscribed with `queue`.
    Deliver(Delivery),
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update { path, options, .. } => f
                .debug_struct("Update")
                .field("path", path)
                .field("options", options)
                .finish_non_exhaustive(),
            Self::Deliver(delivery) => f
                .debug_struct("Deliver")
                .field("listener", &delivery.listener.id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct JobQueue {
    jobs: VecDeque<Job>,
    limit: usize,
}

impl JobQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            limit,
        }
    }

    /// Append a job; a full queue means updates keep scheduling updates.
    pub fn push(&mut self, job: Job) -> Result<()> {
        if self.jobs.len() >= self.limit {
            return Err(StoreError::QueueOverflow { limit: self.limit });
        }
        self.jobs.push_back(job);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Remove every pending job, oldest first.
    pub fn take_all(&mut self) -> Vec<Job> {
        self.jobs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(path: &str) -> Job {
        Job::Update {
            path: path.to_owned(),
            updater: Updater::from(json!(1)),
            options: UpdateOptions::new(),
        }
    }

    #[test]
    fn fifo_order() {
        let mut queue = JobQueue::new(4);
        queue.push(update("a")).unwrap();
        queue.push(update("b")).unwrap();
        assert_eq!(queue.len(), 2);
        let Some(Job::Update { path, .. }) = queue.pop() else {
            panic!("expected update job");
        };
        assert_eq!(path, "a");
    }

    #[test]
    fn overflow_is_an_error() {
        let mut queue = JobQueue::new(1);
        queue.push(update("a")).unwrap();
        let err = queue.push(update("b")).unwrap_err();
        assert!(matches!(err, StoreError::QueueOverflow { limit: 1 }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn take_all_empties() {
        let mut queue = JobQueue::new(2);
        queue.push(update("a")).unwrap();
        assert_eq!(queue.take_all().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
        assert!(format!("{:?}", update("x")).contains("Update"));
    }
}
