//! In-memory output sinks.
//!
//! Snippets never touch the process's real stdout or stderr. `print` and
//! `eprint` in the execution context write here, and so does the engine
//! when it reports results and faults. Nothing global is redirected, so
//! there is nothing to restore on any exit path.

use parking_lot::Mutex;
use std::sync::Arc;

/// Which sink a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

#[derive(Debug, Default)]
struct Buffers {
    out: String,
    err: String,
    used: usize,
    truncated: bool,
}

/// Pair of capped output buffers shared by the engine and the context's
/// output functions.
///
/// The cap applies to both buffers together. Writes past it are cut at a
/// character boundary and a single truncation marker is emitted at the end.
#[derive(Debug, Clone)]
pub struct OutputCapture {
    inner: Arc<Mutex<Buffers>>,
    limit: usize,
}

impl OutputCapture {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffers::default())),
            limit,
        }
    }

    pub fn write(&self, stream: Stream, text: &str) {
        let mut buf = self.inner.lock();
        let room = self.limit.saturating_sub(buf.used);
        let take = if text.len() <= room {
            text.len()
        } else {
            buf.truncated = true;
            floor_char_boundary(text, room)
        };
        if take == 0 {
            return;
        }
        buf.used += take;
        let target = match stream {
            Stream::Out => &mut buf.out,
            Stream::Err => &mut buf.err,
        };
        target.push_str(&text[..take]);
    }

    pub fn write_out(&self, text: &str) {
        self.write(Stream::Out, text);
    }

    pub fn write_err(&self, text: &str) {
        self.write(Stream::Err, text);
    }

    /// Appends to the normal sink without counting against the cap.
    ///
    /// For console-generated notices that must always reach the operator.
    pub fn notice(&self, text: &str) {
        self.inner.lock().out.push_str(text);
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.inner.lock().truncated
    }

    /// Returns `(normal, error)` text, with the truncation marker appended
    /// to the error text when output was cut.
    #[must_use]
    pub fn parts(&self) -> (String, String) {
        let buf = self.inner.lock();
        let mut err = buf.err.clone();
        if buf.truncated {
            err.push_str(&truncation_marker(self.limit));
        }
        (buf.out.clone(), err)
    }

    /// Normal text followed by error text.
    #[must_use]
    pub fn combined(&self) -> String {
        let (mut out, err) = self.parts();
        out.push_str(&err);
        out
    }
}

fn truncation_marker(limit: usize) -> String {
    format!("\n[output truncated at {limit} bytes]\n")
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_text_precedes_error_text() {
        let cap = OutputCapture::new(1024);
        cap.write_err("boom\n");
        cap.write_out("hello\n");
        assert_eq!(cap.combined(), "hello\nboom\n");
    }

    #[test]
    fn cap_is_shared_and_marked_once() {
        let cap = OutputCapture::new(8);
        cap.write_out("12345");
        cap.write_err("67890");
        cap.write_out("more");
        let (out, err) = cap.parts();
        assert_eq!(out, "12345");
        assert!(err.starts_with("678"));
        assert_eq!(err.matches("output truncated").count(), 1);
        assert!(cap.is_truncated());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let cap = OutputCapture::new(3);
        cap.write_out("aé€");
        let (out, _) = cap.parts();
        assert_eq!(out, "aé");
    }

    #[test]
    fn notices_bypass_the_cap() {
        let cap = OutputCapture::new(0);
        cap.write_out("dropped");
        cap.notice("kept\n");
        assert!(cap.combined().starts_with("kept\n"));
    }
}
