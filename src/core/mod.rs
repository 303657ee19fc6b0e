/// Core functionality modules
///
/// Contains the search scheduling, detail caching and display ordering
/// that sit between the store and whatever shows prompts to a user.

pub mod cache;
pub mod library;
pub mod scheduler;
pub mod sorter;

pub use cache::{DetailCache, EvictionPolicy};
pub use library::{LibraryStats, PromptLibrary};
pub use scheduler::{SearchBackend, SearchScheduler, SearchTicket, SessionState};
pub use sorter::{Column, Direction, SortState};
