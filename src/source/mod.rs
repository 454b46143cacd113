// ABOUTME: Source sync: keeps a local working copy of the repository at the requested branch.
// ABOUTME: Also detects which deployment descriptor the working copy provides.

mod descriptor;
mod git;
mod working_copy;

pub use descriptor::{COMPOSE_FILES, DOCKERFILE, Descriptor, detect_descriptor};
pub use git::{SyncError, Synced, checkout, scrub_credential, sync};
pub use working_copy::WorkingCopy;
