use tokio::sync::watch;

/// A one-shot result that any number of tasks can await.
///
/// The first [`settle`](Signal::settle) wins; later attempts are rejected and
/// reported back to the caller instead of overwriting the value.
#[derive(Debug)]
pub struct Signal<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Store `value` unless the signal has already settled.
    ///
    /// Returns `false` when the signal was settled before.
    pub fn settle(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The settled value, without waiting.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Wait until the signal settles and return a copy of its value.
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();

        loop {
            if let Some(value) = rx.borrow_and_update().clone() {
                return value;
            }
            // the sender lives in `self`, so `changed` never reports a drop here
            let _ = rx.changed().await;
        }
    }
}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}
