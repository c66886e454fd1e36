pub mod fingerprint;

pub use fingerprint::{fingerprint, fingerprint_all, FileFingerprint};
