//! Shared round-based protocol driver: session id binding, progress
//! tracing and identifiable-abort blame collection used by every protocol
//! in this workspace (DKG, reshare, ECDSA/FROST signing).

pub mod blame;
pub mod echo;
pub mod execution_id;
pub mod progress;

pub use blame::AbortBlame;
pub use echo::EchoHash;
pub use execution_id::{EvaluatedExecutionId, ExecutionId, ProtocolChoice};
pub use progress::{PerfProfiler, Tracer};

pub use round_based;
