//! GitHub Actions integration: run context, PR comments and step outputs.

pub mod comments;
pub mod context;
pub mod outputs;

pub use comments::{CommentPublisher, GithubCommentPublisher};
pub use context::CiContext;
pub use outputs::{annotate_failure, ActionOutputs, OutputSink};
