//! Terminal front end
//!
//! Progress bars, the results summary, and interactive prompts.

pub mod progress;
pub mod prompt;
pub mod summary;

pub use progress::ConsoleSink;
pub use prompt::Prompter;
pub use summary::Summary;
