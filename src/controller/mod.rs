pub mod bootstrap;
pub mod deadline;
pub mod finalize;
pub mod progress;
pub mod supervisor;
