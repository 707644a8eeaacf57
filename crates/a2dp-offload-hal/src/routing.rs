//! Use-case routing queries

/// Identifier of an active audio use case in the audio server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsecaseId(pub u32);

/// View of the audio server's active playback use cases
pub trait PlaybackRouter: Send + Sync {
    /// Playback use cases currently routed to an A2DP output device
    fn a2dp_playback_usecases(&self) -> Vec<UsecaseId>;

    /// Ask the router to re-evaluate a use case's device routing.
    ///
    /// `restore == false` moves the stream off A2DP (suspend), `true` lets it
    /// come back (resume). Called with no session locked, so an implementation
    /// may stop or start playback synchronously while re-routing.
    fn check_restore(&self, usecase: UsecaseId, restore: bool);
}
