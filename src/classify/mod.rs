pub mod meanings;
pub mod oracle;
pub mod orchestrator;
pub mod taxonomy;
