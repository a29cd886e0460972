/*
    SacdFS
    https://github.com/dbalsom/sacdfs

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! The `decoder` module schedules DST decode work across a shared pool of worker
//! threads while preserving the order in which jobs were dispatched.
//!
//! The DST algorithm itself is an external capability: callers supply a
//! [`DstDecoderFactory`] and the coordinator owns a fixed set of decoder instances,
//! handing them to worker tasks one frame at a time.

use std::{
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};

use crate::{SacdFsError, FRAME_BYTES_PER_CHANNEL};

/// A DST frame decoder. One instance decodes one frame at a time; the coordinator
/// provides mutual exclusion, so implementations need interior state only.
pub trait DstDecoder: Send {
    /// Decode one DST frame into raw DSD. `output` holds `4704 * channels` bytes;
    /// the return value is the number of bytes produced (byte-interleaved across
    /// channels, matching the raw DSD disc layout).
    fn decode_frame(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, SacdFsError>;
}

/// Creates decoder instances for a given channel count.
pub type DstDecoderFactory = Arc<dyn Fn(u8) -> Box<dyn DstDecoder> + Send + Sync>;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads draining a task queue. One pool is shared by every
/// mount of an overlay context; coordinators borrow it rather than owning threads.
pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> WorkerPool {
        let threads = threads.max(1);
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();

        let workers = (0..threads)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                    }
                })
            })
            .collect();

        WorkerPool {
            tx: Some(tx),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task. Tasks submitted after the pool has begun shutdown are dropped.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, task: F) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Box::new(task));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's recv loop.
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// The "available" set of decoder instances. `acquire` blocks until an instance is
/// free; `release` returns it and wakes one waiter.
struct DecoderSlots {
    free: Mutex<Vec<Box<dyn DstDecoder>>>,
    available: Condvar,
}

impl DecoderSlots {
    fn acquire(&self) -> Box<dyn DstDecoder> {
        let mut free = self.free.lock().unwrap();
        loop {
            if let Some(decoder) = free.pop() {
                return decoder;
            }
            free = self.available.wait(free).unwrap();
        }
    }

    fn release(&self, decoder: Box<dyn DstDecoder>) {
        self.free.lock().unwrap().push(decoder);
        self.available.notify_one();
    }
}

struct CompletionQueue {
    tx: Sender<(usize, Result<Vec<u8>, SacdFsError>)>,
    rx: Receiver<(usize, Result<Vec<u8>, SacdFsError>)>,
}

/// Dispatches DST decode jobs onto a borrowed [`WorkerPool`] and collects the results
/// in dispatch order.
pub struct DecodeCoordinator {
    pool: Arc<WorkerPool>,
    slots: Arc<DecoderSlots>,
    channels: u8,
    // One batch in flight at a time; the completion queue is created once and reused
    // so the single-frame path allocates nothing per call.
    batch: Mutex<CompletionQueue>,
}

impl DecodeCoordinator {
    /// Create a coordinator with `instances` decoder instances for `channels`-channel
    /// frames, all decode work running on `pool`.
    pub fn new(channels: u8, instances: usize, factory: &DstDecoderFactory, pool: Arc<WorkerPool>) -> Self {
        let instances = instances.max(1);
        let free = (0..instances).map(|_| factory(channels)).collect();
        let (tx, rx) = crossbeam_channel::unbounded();

        DecodeCoordinator {
            pool,
            slots: Arc::new(DecoderSlots {
                free: Mutex::new(free),
                available: Condvar::new(),
            }),
            channels,
            batch: Mutex::new(CompletionQueue { tx, rx }),
        }
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Decode a batch of DST frames. The returned buffers are raw DSD
    /// (`4704 * channels` bytes each, byte-interleaved) in the order the inputs were
    /// passed, regardless of completion order in the pool.
    ///
    /// A decoder failure invalidates the whole batch, but the queue is drained before
    /// the first error is returned so no completion leaks into the next batch.
    pub fn decode_batch(&self, inputs: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, SacdFsError> {
        let job_count = inputs.len();
        if job_count == 0 {
            return Ok(Vec::new());
        }

        let queue = self.batch.lock().unwrap();
        let output_size = FRAME_BYTES_PER_CHANNEL * self.channels as usize;

        for (seq, input) in inputs.into_iter().enumerate() {
            let slots = self.slots.clone();
            let tx = queue.tx.clone();
            self.pool.execute(move || {
                let mut decoder = slots.acquire();
                let mut output = vec![0u8; output_size];
                let result = decoder.decode_frame(&input, &mut output).map(|size| {
                    output.truncate(size);
                    output
                });
                slots.release(decoder);
                let _ = tx.send((seq, result));
            });
        }

        let mut results: Vec<Option<Vec<u8>>> = (0..job_count).map(|_| None).collect();
        let mut first_error = None;
        for _ in 0..job_count {
            let (seq, result) = queue
                .rx
                .recv()
                .map_err(|_| SacdFsError::DecodeError("worker pool shut down".to_string()))?;
            match result {
                Ok(bytes) => results[seq] = Some(bytes),
                Err(e) => {
                    log::error!("decode_batch(): frame {} failed: {}", seq, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(results.into_iter().map(|r| r.unwrap_or_default()).collect())
    }

    /// Decode a single frame through the persistent queue.
    pub fn decode_one(&self, input: Vec<u8>) -> Result<Vec<u8>, SacdFsError> {
        let mut out = self.decode_batch(vec![input])?;
        Ok(out.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Copies its input, stamping the first byte, and sleeps longer for earlier
    /// sequence numbers so completion order inverts submission order.
    struct StaggeredDecoder;

    impl DstDecoder for StaggeredDecoder {
        fn decode_frame(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, SacdFsError> {
            let tag = input[0];
            thread::sleep(Duration::from_millis(((8 - tag.min(8)) as u64) * 5));
            let n = input.len().min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            Ok(n)
        }
    }

    struct FailingDecoder;

    impl DstDecoder for FailingDecoder {
        fn decode_frame(&mut self, input: &[u8], _output: &mut [u8]) -> Result<usize, SacdFsError> {
            if input[0] == 3 {
                return Err(SacdFsError::DecodeError("bad frame".to_string()));
            }
            Ok(0)
        }
    }

    fn factory_of<D: DstDecoder + Default + 'static>() -> DstDecoderFactory {
        Arc::new(|_channels| Box::new(D::default()) as Box<dyn DstDecoder>)
    }

    impl Default for StaggeredDecoder {
        fn default() -> Self {
            StaggeredDecoder
        }
    }

    impl Default for FailingDecoder {
        fn default() -> Self {
            FailingDecoder
        }
    }

    #[test]
    fn pool_runs_tasks() {
        let pool = WorkerPool::new(4);
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..32 {
            let tx = tx.clone();
            pool.execute(move || {
                let _ = tx.send(i);
            });
        }
        let mut seen: Vec<i32> = (0..32).map(|_| rx.recv().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn batch_results_preserve_dispatch_order() {
        let pool = Arc::new(WorkerPool::new(4));
        let coordinator = DecodeCoordinator::new(2, 4, &factory_of::<StaggeredDecoder>(), pool);

        let inputs: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 16]).collect();
        let outputs = coordinator.decode_batch(inputs).unwrap();

        assert_eq!(outputs.len(), 8);
        for (i, out) in outputs.iter().enumerate() {
            assert_eq!(out[0], i as u8);
        }
    }

    #[test]
    fn failed_frame_fails_batch_after_draining() {
        let pool = Arc::new(WorkerPool::new(2));
        let coordinator = DecodeCoordinator::new(2, 2, &factory_of::<FailingDecoder>(), pool);

        let inputs: Vec<Vec<u8>> = (0..6u8).map(|i| vec![i; 4]).collect();
        assert!(matches!(
            coordinator.decode_batch(inputs),
            Err(SacdFsError::DecodeError(_))
        ));

        // The queue drained; a subsequent batch must not see stale completions.
        let ok = coordinator.decode_batch(vec![vec![0u8; 4]]).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn acquire_blocks_until_release() {
        let pool = Arc::new(WorkerPool::new(4));
        // More jobs than decoder instances forces waiting on the condition variable.
        let coordinator = DecodeCoordinator::new(2, 1, &factory_of::<StaggeredDecoder>(), pool);
        let inputs: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 8]).collect();
        let outputs = coordinator.decode_batch(inputs).unwrap();
        assert_eq!(outputs.len(), 4);
    }
}
