//! Network-free generator with scripted responses.
//!
//! Records every request it receives and feeds the scripted bytes through a
//! real [`StreamBuffer`], either all at once or chunk-by-chunk from a
//! background thread to exercise readers that attach mid-stream.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::buffer::StreamBuffer;
use crate::request::{GenerationRequest, Generator};

type Script = Box<dyn Fn(&GenerationRequest) -> MockResponse + Send + Sync>;

/// What a scripted generation produces.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Complete successfully with this body.
    Body(String),
    /// Fail the stream with this error message.
    Error(String),
}

/// How scripted bytes are delivered to the buffer.
#[derive(Debug, Clone, Copy)]
enum Delivery {
    /// Append everything and complete before returning the buffer.
    Immediate,
    /// Append from a background thread in pieces of `chunk` bytes,
    /// sleeping `pause` between them.
    Chunked { chunk: usize, pause: Duration },
}

/// Scripted [`Generator`] for tests.
pub struct MockGenerator {
    script: Script,
    delivery: Delivery,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Always produce `body`, delivered synchronously.
    pub fn fixed(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::with_script(move |_| MockResponse::Body(body.clone()))
    }

    /// Always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_script(move |_| MockResponse::Error(message.clone()))
    }

    /// Decide the response per request.
    pub fn with_script(
        script: impl Fn(&GenerationRequest) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        MockGenerator {
            script: Box::new(script),
            delivery: Delivery::Immediate,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Deliver bodies in `chunk`-byte pieces with `pause` between them, so
    /// readers observe a live stream.
    pub fn chunked(mut self, chunk: usize, pause: Duration) -> Self {
        self.delivery = Delivery::Chunked { chunk, pause };
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Generator for MockGenerator {
    fn generate_stream(&self, request: GenerationRequest) -> Arc<StreamBuffer> {
        let response = (self.script)(&request);
        self.requests.lock().unwrap().push(request);

        let buffer = Arc::new(StreamBuffer::new());
        match response {
            MockResponse::Error(message) => buffer.mark_error(message),
            MockResponse::Body(body) => match self.delivery {
                Delivery::Immediate => {
                    buffer.append(body.as_bytes());
                    buffer.mark_complete();
                }
                Delivery::Chunked { chunk, pause } => {
                    let writer = Arc::clone(&buffer);
                    thread::spawn(move || {
                        for piece in body.as_bytes().chunks(chunk.max(1)) {
                            writer.append(piece);
                            thread::sleep(pause);
                        }
                        writer.mark_complete();
                    });
                }
            },
        }
        buffer
    }
}
