//! Engineer assignment: validation, suggestions and team membership

pub mod resolver;
pub mod suggestion;
pub mod team;

pub use resolver::AssignmentResolver;
pub use suggestion::{
    provider_from_config, Candidate, HttpSuggestionProvider, RuleBasedProvider,
    SharedSuggestionProvider, Suggestion, SuggestionProvider, SuggestionRequest,
};
pub use team::{apply_member_changes, unassigned_engineers, MemberChanges};
