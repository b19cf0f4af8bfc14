// Résumé section model and the Markdown extractor/serializer.
// Refinement code works only with the typed sections; Markdown stays at this boundary.

pub mod markdown;
pub mod models;
