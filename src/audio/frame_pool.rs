// FramePool - pre-allocated sample buffers on dual lock-free SPSC queues
//
// The capture callback must never allocate, so all frame buffers are created
// up front and circulate between the two threads on a pair of ring buffers:
//
//   data queue: capture thread pushes filled buffers, detection thread pops
//   pool queue: detection thread returns drained buffers, capture reuses
//
// Each side of the pipeline gets its own half of the queue pair, so the
// producer/consumer ends can be moved into their threads independently.

use rtrb::{Consumer, Producer, RingBuffer};

pub const DEFAULT_POOL_BUFFERS: usize = 16;

/// Pre-allocated sample buffer circulating between threads
pub type SampleBuffer = Vec<f32>;

/// Capture-thread half: take a free buffer, fill it, hand it off.
pub struct CaptureChannels {
    pool_consumer: Consumer<SampleBuffer>,
    data_producer: Producer<SampleBuffer>,
}

impl CaptureChannels {
    /// Copy `samples` into a pooled buffer and queue it for detection.
    /// Returns false when the pool is exhausted and the chunk was dropped.
    pub fn publish(&mut self, samples: &[f32]) -> bool {
        let mut buffer = match self.pool_consumer.pop() {
            Ok(buffer) => buffer,
            Err(_) => return false,
        };
        buffer.clear();
        buffer.extend_from_slice(samples);
        // Queue capacity equals the pool size, so this cannot fail.
        self.data_producer.push(buffer).is_ok()
    }

    /// Like `publish`, but copies only the first channel of interleaved
    /// multi-channel data. `channel_count` must be at least 1.
    pub fn publish_first_channel(&mut self, interleaved: &[f32], channel_count: usize) -> bool {
        if channel_count <= 1 {
            return self.publish(interleaved);
        }
        let mut buffer = match self.pool_consumer.pop() {
            Ok(buffer) => buffer,
            Err(_) => return false,
        };
        buffer.clear();
        buffer.extend(interleaved.iter().step_by(channel_count));
        self.data_producer.push(buffer).is_ok()
    }
}

/// Detection-thread half: drain filled buffers, return them to the pool.
pub struct DetectionChannels {
    data_consumer: Consumer<SampleBuffer>,
    pool_producer: Producer<SampleBuffer>,
}

impl DetectionChannels {
    /// Pop the next filled buffer, if any
    pub fn next_filled(&mut self) -> Option<SampleBuffer> {
        self.data_consumer.pop().ok()
    }

    /// Return a drained buffer to the capture side
    pub fn recycle(&mut self, buffer: SampleBuffer) {
        // Ignore failure: the queue holds the full pool, so a push can only
        // fail if a foreign buffer was handed in.
        let _ = self.pool_producer.push(buffer);
    }
}

/// Allocate `buffer_count` buffers of `buffer_capacity` samples and return
/// the two thread-side handles. All heap allocation happens here.
///
/// # Panics
/// Panics if either argument is 0.
pub fn frame_pool(buffer_count: usize, buffer_capacity: usize) -> (CaptureChannels, DetectionChannels) {
    assert!(buffer_count > 0, "buffer_count must be greater than 0");
    assert!(buffer_capacity > 0, "buffer_capacity must be greater than 0");

    let (mut pool_producer, pool_consumer) = RingBuffer::new(buffer_count);
    let (data_producer, data_consumer) = RingBuffer::new(buffer_count);

    for _ in 0..buffer_count {
        let buffer = SampleBuffer::with_capacity(buffer_capacity);
        if pool_producer.push(buffer).is_err() {
            unreachable!("pool queue sized to buffer_count");
        }
    }

    (
        CaptureChannels {
            pool_consumer,
            data_producer,
        },
        DetectionChannels {
            data_consumer,
            pool_producer,
        },
    )
}
