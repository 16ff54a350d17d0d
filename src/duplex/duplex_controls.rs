use crossbeam::channel::{Receiver, RecvTimeoutError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::duplex::{CounterSnapshot, StreamCounters, StreamEvent, StreamShape};

/// This is the "Controls" part, which lives on the control thread.
/// It drains what the playhead had to say and reads the counters.
pub struct DuplexControls {
    shape: StreamShape,
    counters: Arc<StreamCounters>,
    event_q_rec: Receiver<StreamEvent>,
}

impl DuplexControls {
    pub(crate) fn new(
        shape: &StreamShape,
        counters: &Arc<StreamCounters>,
        rx: Receiver<StreamEvent>,
    ) -> DuplexControls {
        DuplexControls {
            shape: *shape,
            counters: Arc::clone(counters),
            event_q_rec: rx,
        }
    }

    pub fn shape(&self) -> StreamShape {
        self.shape
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn counter_handle(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }

    /// Take whatever events are queued right now, without logging them.
    pub fn pending_events(&self) -> Vec<StreamEvent> {
        self.event_q_rec.try_iter().collect()
    }

    /// Log all queued events, returns how many there were.
    pub fn report_pending(&self) -> usize {
        let mut count = 0;
        for ev in self.event_q_rec.try_iter() {
            log_event(&ev);
            count += 1;
        }
        count
    }

    /// Log events from a background thread as they arrive.
    /// The thread ends when the handle is dropped or the playhead is gone.
    pub fn spawn_reporter(&self, poll_interval: Duration) -> std::io::Result<ReporterHandle> {
        let rx = self.event_q_rec.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("duplex-reporter".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    match rx.recv_timeout(poll_interval) {
                        Ok(ev) => log_event(&ev),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                // whatever came in late
                for ev in rx.try_iter() {
                    log_event(&ev);
                }
            })?;

        Ok(ReporterHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Keeps the reporter thread alive, stops and joins it on drop.
pub struct ReporterHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_event(ev: &StreamEvent) {
    match ev {
        StreamEvent::Xrun {
            stream_time,
            status,
        } => {
            if status.input_overflow {
                log::warn!("stream over/underflow detected: input overflow at {stream_time:.3}s");
            }
            if status.output_underflow {
                log::warn!("stream over/underflow detected: output underflow at {stream_time:.3}s");
            }
        }
        StreamEvent::StreamTime(t) => log::info!("stream time: {t:.3}s"),
        StreamEvent::CaptureFull { kind, stream_time } => {
            log::info!("{kind} capture full at {stream_time:.3}s, no longer recording it")
        }
        StreamEvent::Overrun {
            stream_time,
            elapsed,
            budget,
        } => log::warn!(
            "block at {stream_time:.3}s took {:.3} ms, budget is {:.3} ms",
            elapsed.as_secs_f64() * 1000.0,
            budget.as_secs_f64() * 1000.0
        ),
    }
}
