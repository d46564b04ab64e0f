//! A growing text value shared between one writer and any number of readers.
//!
//! The writer appends deltas and finally seals the value. Readers observe a
//! monotonically growing snapshot through a `tokio::sync::watch` channel.

use futures::Stream;
use profrag_core::{AppError, AppResult};
use tokio::sync::watch;

/// Point-in-time view of a streamable text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSnapshot {
    pub text: String,

    /// No further text will be appended
    pub sealed: bool,
}

/// Writer half.
#[derive(Debug)]
pub struct StreamableText {
    tx: watch::Sender<TextSnapshot>,
}

/// Reader half.
#[derive(Debug, Clone)]
pub struct TextSubscriber {
    rx: watch::Receiver<TextSnapshot>,
}

impl StreamableText {
    pub fn new() -> (Self, TextSubscriber) {
        let (tx, rx) = watch::channel(TextSnapshot::default());
        (Self { tx }, TextSubscriber { rx })
    }

    pub fn subscribe(&self) -> TextSubscriber {
        TextSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Append `delta`. Fails once sealed.
    pub fn append(&self, delta: &str) -> AppResult<()> {
        let mut sealed = false;
        self.tx.send_if_modified(|state| {
            if state.sealed {
                sealed = true;
                return false;
            }
            if delta.is_empty() {
                return false;
            }
            state.text.push_str(delta);
            true
        });

        if sealed {
            return Err(AppError::Chat(
                "Cannot update a sealed text stream".to_string(),
            ));
        }
        Ok(())
    }

    /// Seal the value and return the final text. Fails if already sealed.
    pub fn seal(&self) -> AppResult<String> {
        let mut already = false;
        self.tx.send_if_modified(|state| {
            if state.sealed {
                already = true;
                return false;
            }
            state.sealed = true;
            true
        });

        if already {
            return Err(AppError::Chat("Text stream is already sealed".to_string()));
        }
        Ok(self.text())
    }

    pub fn text(&self) -> String {
        self.tx.borrow().text.clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.tx.borrow().sealed
    }
}

impl TextSubscriber {
    pub fn snapshot(&self) -> TextSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<TextSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until sealed and return the final text.
    pub async fn wait_sealed(&mut self) -> AppResult<String> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if state.sealed {
                    return Ok(state.text.clone());
                }
            }
            if self.rx.changed().await.is_err() {
                return Err(AppError::Chat(
                    "Text stream dropped before completion".to_string(),
                ));
            }
        }
    }

    /// Newly appended text, one item per observed change.
    ///
    /// Ends when the value is sealed or the writer is dropped. Concatenating
    /// the items gives the text as last observed.
    pub fn deltas(self) -> impl Stream<Item = String> + Send {
        futures::stream::unfold(Some((self, 0usize)), |state| async move {
            let (mut sub, sent) = state?;
            loop {
                let (delta, len, sealed) = {
                    let current = sub.rx.borrow_and_update();
                    (
                        current.text[sent..].to_string(),
                        current.text.len(),
                        current.sealed,
                    )
                };

                if sealed {
                    return Some((delta, None));
                }
                if !delta.is_empty() {
                    return Some((delta, Some((sub, len))));
                }
                if sub.rx.changed().await.is_err() {
                    return None;
                }
            }
        })
    }
}
