//! Asynchronous chunk generation executor
//!
//! The scheduling loop and the generation workers share no mutable state:
//! requests go in over a channel, finished buffers come back over another,
//! and ownership of the buffers moves with the message. Dispatch never
//! blocks; completion is observed by draining the result channel.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use noise::Perlin;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::generation::descriptor::GeneratorKind;
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::voxel::position_color;

/// Request to generate one chunk's contents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub coord: ChunkCoord,
    pub chunk_size: u32,
    pub seed: u32,
    pub generator: GeneratorKind,
}

/// Generated flat buffers for one chunk, ready for direct adoption
#[derive(Debug)]
pub struct GeneratedChunk {
    pub coord: ChunkCoord,
    /// Voxel type per cell in `x + y*S + z*S*S` order
    pub types: Vec<u8>,
    /// RGBA color per cell; zeroed for air voxels
    pub colors: Vec<f32>,
}

/// Outcome of a generation request
#[derive(Debug)]
pub enum GenerationResult {
    /// Buffers generated successfully
    Completed(GeneratedChunk),
    /// The generator failed for this request; the chunk can be retried
    Failed { coord: ChunkCoord, reason: String },
}

impl GenerationResult {
    /// Coordinate this result belongs to
    pub fn coord(&self) -> ChunkCoord {
        match self {
            GenerationResult::Completed(generated) => generated.coord,
            GenerationResult::Failed { coord, .. } => *coord,
        }
    }
}

/// Generate one chunk's buffers synchronously.
///
/// Pure: identical requests produce identical buffers. The scan order
/// (z outer, y middle, x inner) writes cells sequentially in the same
/// linearization `Chunk::voxel_index` uses, so the output adopts directly.
pub fn generate_chunk(request: &GenerationRequest) -> GeneratedChunk {
    let s = request.chunk_size as i32;
    let volume = (s * s * s) as usize;
    let mut types = vec![0u8; volume];
    let mut colors = vec![0.0f32; volume * 4];
    let perlin = Perlin::new(request.seed);

    let mut i = 0usize;
    for lz in 0..s {
        for ly in 0..s {
            for lx in 0..s {
                let wx = request.coord.x * s + lx;
                let wy = request.coord.y * s + ly;
                let wz = request.coord.z * s + lz;

                let type_id = request.generator.evaluate(&perlin, wx, wy, wz);
                types[i] = type_id;
                if type_id > 0 {
                    let color = position_color(wx, wy, wz);
                    colors[i * 4..i * 4 + 4].copy_from_slice(&color);
                }
                i += 1;
            }
        }
    }

    GeneratedChunk {
        coord: request.coord,
        types,
        colors,
    }
}

/// Runs generation requests on a dedicated runtime.
///
/// Requests execute concurrently up to `max_concurrent`; there is no
/// ordering guarantee between completions and no cancellation once
/// dispatched. A stalled request stalls only its own chunk.
pub struct GenerationExecutor {
    request_tx: mpsc::UnboundedSender<GenerationRequest>,
    result_rx: mpsc::UnboundedReceiver<GenerationResult>,
    /// Keeps the worker runtime alive for the executor's lifetime
    #[allow(dead_code)]
    runtime: Runtime,
}

impl GenerationExecutor {
    /// Create an executor with up to `max_concurrent` in-flight generations
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<GenerationRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<GenerationResult>();

        let runtime = Runtime::new().expect("Failed to create tokio runtime");
        runtime.spawn(async move {
            Self::worker_loop(max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx,
            runtime,
        }
    }

    /// Worker loop: pulls requests, runs them with bounded concurrency
    async fn worker_loop(
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<GenerationRequest>,
        result_tx: mpsc::UnboundedSender<GenerationResult>,
    ) {
        let mut active = JoinSet::new();
        let mut queued: VecDeque<GenerationRequest> = VecDeque::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    queued.push_back(request);
                }

                Some(joined) = active.join_next(), if !active.is_empty() => {
                    match joined {
                        Ok(result) => {
                            let _ = result_tx.send(result);
                        }
                        Err(e) => {
                            log::error!("generation task failed to join: {e}");
                        }
                    }
                }

                else => {
                    if queued.is_empty() && active.is_empty() {
                        break;
                    }
                }
            }

            while active.len() < max_concurrent {
                let Some(request) = queued.pop_front() else {
                    break;
                };
                active.spawn(async move { Self::run_request(request) });
            }
        }
    }

    /// Run one request, containing any generator panic as a `Failed` result
    /// so the control loop keeps its in-flight bookkeeping intact
    fn run_request(request: GenerationRequest) -> GenerationResult {
        let coord = request.coord;
        match std::panic::catch_unwind(AssertUnwindSafe(|| generate_chunk(&request))) {
            Ok(generated) => GenerationResult::Completed(generated),
            Err(_) => {
                log::warn!("generator panicked for chunk {coord:?}");
                GenerationResult::Failed {
                    coord,
                    reason: "generator panicked".into(),
                }
            }
        }
    }

    /// Queue a request; never blocks the caller
    pub fn dispatch(&self, request: GenerationRequest) {
        self.request_tx.send(request).expect("Generation worker died");
    }

    /// Pop one completed result if any is ready (non-blocking)
    pub fn try_next(&mut self) -> Option<GenerationResult> {
        self.result_rx.try_recv().ok()
    }
}
