//! Text producers feeding the bridge.
//!
//! A text source is any blocking iterator of fragments. It finishes by
//! running out; a failing transport shows up as an `Err` item.

use std::io::{BufRead, BufReader, Stdin};
use std::pin::Pin;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use futures::executor::{block_on_stream, BlockingStream};
use futures::Stream;
use rand::Rng;

use crate::error::TransportError;

pub type Fragment = Result<String, TransportError>;

pub trait TextSource: Iterator<Item = Fragment> + Send {}

impl<T: Iterator<Item = Fragment> + Send> TextSource for T {}

/// Fixed fragments, optionally separated by a random pause to mimic a
/// model generating text at its own pace.
pub struct ScriptedSource {
    fragments: std::vec::IntoIter<String>,
    pause: Option<(Duration, Duration)>,
    first: bool,
}

impl ScriptedSource {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedSource {
            fragments: fragments
                .into_iter()
                .map(Into::into)
                .collect::<Vec<_>>()
                .into_iter(),
            pause: None,
            first: true,
        }
    }

    /// Sleep a random duration in `min..=max` before every fragment but the
    /// first.
    pub fn with_pause(mut self, min: Duration, max: Duration) -> Self {
        self.pause = Some((min.min(max), max.max(min)));
        self
    }
}

impl Iterator for ScriptedSource {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        let fragment = self.fragments.next()?;

        if let (Some((min, max)), false) = (self.pause, self.first) {
            let pause = rand::rng().random_range(min..=max);
            std::thread::sleep(pause);
        }
        self.first = false;

        Some(Ok(fragment))
    }
}

/// One fragment per line of a reader; blank lines are skipped.
pub struct LineSource<R> {
    reader: R,
    failed: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            reader,
            failed: false,
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if self.failed {
            return None;
        }

        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let text = line.trim_end_matches(['\r', '\n']);
                    if text.trim().is_empty() {
                        continue;
                    }
                    // Keep a word boundary between lines
                    return Some(Ok(format!("{text} ")));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Producer half of a [`ChannelSource`].
#[derive(Clone)]
pub struct TextSender {
    tx: Sender<Fragment>,
}

impl TextSender {
    /// Push a fragment. Returns false when the source has been dropped.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.tx.send(Ok(text.into())).is_ok()
    }

    /// Deliver a transport failure to the consumer.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// End the sequence for this sender. The source finishes once every
    /// sender is gone.
    pub fn close(self) {}
}

/// Fragments pushed from other threads through a [`TextSender`].
pub struct ChannelSource {
    rx: Receiver<Fragment>,
}

pub fn text_channel() -> (TextSender, ChannelSource) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (TextSender { tx }, ChannelSource { rx })
}

impl Iterator for ChannelSource {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        self.rx.recv().ok()
    }
}

type BoxedFragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Blocking view of an async fragment stream, such as a streamed chat
/// completion.
///
/// Must not be iterated from inside an async task; run the consumer on a
/// blocking thread.
pub struct StreamSource {
    inner: BlockingStream<BoxedFragmentStream>,
}

impl StreamSource {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Fragment> + Send + 'static,
    {
        let boxed: BoxedFragmentStream = Box::pin(stream);
        StreamSource {
            inner: block_on_stream(boxed),
        }
    }
}

impl Iterator for StreamSource {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        self.inner.next()
    }
}
