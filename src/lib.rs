//! # chunkalloc - A Chunked Bump/Free-List Arena
//!
//! This crate provides a single-threaded arena that implements the classic
//! C `realloc` contract (allocate, grow, shrink and free through one entry
//! point). It is meant to be installed as the allocation hook of an embedded
//! interpreter or any host that wants its memory served from one place.
//!
//! ## Overview
//!
//! Memory comes from a list of chunks. New requests are served first-fit from
//! a free list of previously released regions, and otherwise bumped from the
//! current chunk:
//!
//! ```text
//!   Arena:
//!
//!   chunks[0]                                       chunks[1]
//!   ┌────┬─────┬────┬──────┬────┬──────┬─────────┐  ┌────┬───────┬───────────┐
//!   │ H  │ A1  │ H  │ free │ H  │ A3   │ unused  │  │ H  │ A4    │  unused   │
//!   └────┴─────┴────┴──────┴────┴──────┴─────────┘  └────┴───────┴───────────┘
//!                 └────┬────┘           ▲                         ▲
//!                      │             offset                  offset (current)
//!              free_blocks: [(chunk 0, offset, size)]
//! ```
//!
//! Every payload is preceded by a header:
//!
//! ```text
//!   ┌─────────────────────────┬──────────────────────────────┐
//!   │      Block Header       │          Payload             │
//!   │  ┌───────────────────┐  │                              │
//!   │  │ size:  N          │  │   N bytes usable, N % 8 == 0 │
//!   │  │ magic: 0xCAFEBABE │  │                              │
//!   │  └───────────────────┘  │                              │
//!   └─────────────────────────┴──────────────────────────────┘
//!                             ▲
//!                             └── Pointer returned to the caller
//! ```
//!
//! The magic value is cleared on free, so a double free or a pointer the
//! arena never produced is reported as [`ArenaError::InvalidPointer`].
//!
//! ## Crate Structure
//!
//! ```text
//!   chunkalloc
//!   ├── align   - align! macro, 8 byte rounding
//!   ├── arena   - Arena and all allocation paths
//!   ├── block   - BlockHeader and FreeBlock (internal header layout)
//!   ├── chunk   - backing buffers and header access (internal)
//!   ├── config  - ArenaConfig
//!   ├── error   - ArenaError
//!   ├── ffi     - realloc-style C hook
//!   ├── guard   - single caller enforcement (internal)
//!   ├── limit   - LimitedArena
//!   └── stats   - ArenaStats
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use chunkalloc::Arena;
//!
//! let arena = Arena::new().unwrap();
//!
//! let ptr = arena.realloc(None, 100).unwrap().unwrap();
//! assert_eq!(arena.size(ptr).unwrap(), 104);
//!
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 104) };
//!
//! let grown = arena.realloc(Some(ptr), 400).unwrap().unwrap();
//! assert_eq!(unsafe { *grown.as_ptr().add(103) }, 0xAB);
//!
//! assert_eq!(arena.realloc(Some(grown), 0).unwrap(), None);
//! ```
//!
//! ## Realloc Paths
//!
//! ```text
//!   realloc(ptr, n)
//!     ├── ptr == None          -> fresh allocation
//!     ├── n == 0               -> free, returns None
//!     ├── round8(n) == size    -> same pointer
//!     ├── round8(n) <  size    -> shrink in place, tail joins the free list
//!     └── round8(n) >  size
//!           ├── block ends at the chunk cursor  -> bump the cursor
//!           ├── free block starts at block end  -> eat into it
//!           └── otherwise                       -> allocate, copy, free
//! ```
//!
//! ## Limitations
//!
//! - **Single caller only**: overlapping calls panic, they are never queued
//! - **8 byte alignment**: no support for stricter alignment
//! - **No compaction**: only touching free blocks are merged
//! - **Chunks are kept**: storage is released by `free_all` or drop only
//!
//! ## Safety
//!
//! The arena itself is safe to call. Writing through the returned pointers
//! is not: callers must stay within the size recorded for the block and stop
//! using a pointer once it has been freed, moved by `realloc`, or the arena
//! has been reset.

pub mod align;
mod arena;
mod block;
mod chunk;
mod config;
mod error;
mod ffi;
mod guard;
mod limit;
mod stats;

pub use arena::Arena;
pub use block::{FreeBlock, HEADER_SIZE, MAGIC, MIN_SPLIT};
pub use config::{ArenaConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERSIZE_FACTOR};
pub use error::ArenaError;
pub use ffi::{AllocFn, arena_realloc};
pub use limit::{LimitedArena, limited_realloc};
pub use stats::ArenaStats;
