//! Run-wide metric stream: a push-based observable opened at session start
//! and closed at session end. Emissions are delivered synchronously to
//! subscribers at push time; nothing is buffered.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::model::MetricBroadcast;

type SubscriberFn = dyn FnMut(&MetricBroadcast) + Send;

/// Cloneable handle to the run-wide metric stream.
///
/// Delivery happens while the stream's lock is held; subscribers must not
/// push back into the stream they observe.
#[derive(Clone)]
pub struct MetricStream {
    inner: Arc<Mutex<StreamInner>>,
}

struct StreamInner {
    open: bool,
    subscribers: Vec<Box<SubscriberFn>>,
}

impl MetricStream {
    pub(crate) fn open() -> Self {
        debug!("metric stream opened");
        Self {
            inner: Arc::new(Mutex::new(StreamInner {
                open: true,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a callback invoked synchronously for every pushed event.
    pub fn subscribe(&self, subscriber: impl FnMut(&MetricBroadcast) + Send + 'static) {
        self.inner
            .lock()
            .expect("metric stream lock")
            .subscribers
            .push(Box::new(subscriber));
    }

    /// Deliver an event to all subscribers. Pushes after close are dropped.
    pub fn push(&self, broadcast: MetricBroadcast) {
        let mut inner = self.inner.lock().expect("metric stream lock");
        if !inner.open {
            debug!(metric = %broadcast.metric, "dropping push on closed stream");
            return;
        }
        for subscriber in &mut inner.subscribers {
            subscriber(&broadcast);
        }
    }

    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().expect("metric stream lock");
        inner.open = false;
        debug!("metric stream closed");
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().expect("metric stream lock").open
    }
}
