//! Session module - The windowed buffering engine
//!
//! - `collaborators`: Traits for everything the engine calls out to
//! - `context`: Generation tokens and guarded collaborator access
//! - `shuffle`: Pool of not-yet-played positions
//! - `fetcher`: Catalog page fetching
//! - `resolver`: Track to playable source resolution
//! - `window`: The playback session state machine

mod collaborators;
mod context;
mod fetcher;
mod resolver;
mod shuffle;
mod window;

pub use collaborators::{
    CancelPrompt, CatalogClient, EntryId, ErrorSink, ProgressSink, QueueSink, StreamCandidate,
    VideoIndexClient,
};

pub use context::{Collaborators, SessionContext, SessionGuard};

pub use fetcher::{FetchedPage, RemotePageFetcher};

pub use resolver::{pick_candidates, SourceResolver, VideoResolver};

pub use shuffle::ShufflePool;

pub use window::{AdvanceOutcome, AdvancePlan, LoadOutcome, LoadReport, PlaybackSession, SessionRequest, WindowSnapshot};
