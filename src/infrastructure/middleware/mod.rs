pub mod actor_extractor;

pub use actor_extractor::Actor;
