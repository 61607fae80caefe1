//! Backend for spawning and talking to local child processes.

mod process;

pub use process::{
    OutputChunk, ProcessEvent, ProcessHandle, ProcessSpawner, StreamKind, send_signal,
};
