pub mod artifact;
pub mod bot;
pub mod meeting;
pub mod transcript_chunk;

pub use artifact::ArtifactRepository;
pub use bot::BotRepository;
pub use meeting::{MeetingRepository, NewMeeting};
pub use transcript_chunk::{AppendOutcome, NewChunk, TranscriptChunkRepository};
