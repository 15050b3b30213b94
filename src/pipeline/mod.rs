//! Device-stream ingestion pipeline.
//!
//! Raw device bytes flow through three stages before reaching the broadcast hub:
//!
//! ```text
//! bytes ──► [FrameLexer] ──► [PacketDecoder] ──► [RateLimiter] ──► BroadcastHub
//!            lines/noise      typed frames        waveform gate
//! ```
//!
//! # Design
//!
//! - **Synchronous stages**: every stage is plain state with no I/O, so the
//!   ingestion task drives them inline and tests drive them directly.
//! - **Contained errors**: lexer garbage and decode failures are counted and
//!   logged, never propagated out of [`IngestPipeline::ingest`].
//! - **One instance per link**: the link supervisor builds a fresh
//!   [`IngestPipeline`] each time the device is opened.

pub mod decoder;
pub mod error;
pub mod lexer;
pub mod limiter;

pub use decoder::{DecoderStats, PacketDecoder, EPOCH_THRESHOLD_MS, MAX_FUTURE_SKEW_MS};
pub use error::{DecodeError, DecodeResult};
pub use lexer::{FrameLexer, LexerStats, LineClass, Rule};
pub use limiter::RateLimiter;

use crate::broadcast::BroadcastHub;
use crate::clock::Clock;
use crate::config::RelayConfig;
use crate::types::PipelineStats;
use std::sync::Arc;
use std::time::Instant;

/// One live lexer → decoder → limiter → hub chain.
pub struct IngestPipeline {
    lexer: FrameLexer,
    decoder: PacketDecoder,
    limiter: RateLimiter,
    hub: Arc<BroadcastHub>,
    bytes_read: u64,
    frames_published: u64,
}

impl IngestPipeline {
    pub fn new(config: &RelayConfig, clock: Arc<dyn Clock>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            lexer: FrameLexer::new(&config.lexer),
            decoder: PacketDecoder::new(config.decoder.clone(), clock),
            limiter: RateLimiter::new(&config.limiter),
            hub,
            bytes_read: 0,
            frames_published: 0,
        }
    }

    /// Feed a chunk of device bytes; returns the number of frames published.
    pub fn ingest(&mut self, bytes: &[u8], now: Instant) -> usize {
        self.bytes_read += bytes.len() as u64;
        self.lexer.push(bytes);

        let mut published = 0;
        while let Some(packet) = self.lexer.next_packet() {
            match self.decoder.decode(&packet) {
                Ok(Some(frame)) => {
                    if self.limiter.admit(&frame, now) {
                        self.hub.publish(&frame);
                        published += 1;
                    } else {
                        tracing::trace!("Waveform burst throttled");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Dropping packet: {} (line: {})", e, packet),
            }
        }

        self.frames_published += published as u64;
        published
    }

    pub fn stats(&self) -> PipelineStats {
        let lexer = self.lexer.stats();
        let decoder = self.decoder.stats();
        PipelineStats {
            bytes_read: self.bytes_read,
            lines: lexer.lines,
            noise_lines: lexer.noise_lines,
            garbage_lines: lexer.garbage_lines,
            decode_errors: decoder.errors,
            unknown_packets: decoder.unknown,
            truncated_bursts: decoder.truncated,
            frames_decoded: decoder.decoded,
            bursts_throttled: self.limiter.throttled(),
            frames_published: self.frames_published,
        }
    }
}
