//! Intake pipeline stages.
//!
//! Each submodule implements exactly one transformation step, keeping every
//! stage independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! codec ──▶ sniff + hints ──▶ classify ──▶ dispatch ──▶ {pdftext | assure} ──▶ capability
//! (base64)  (magic bytes)     (precedence)  (branching)  (PDF text / image)    (analysis)
//! ```
//!
//! 1. [`codec`]    — strip the data-URL envelope, decode untrusted base64
//! 2. [`sniff`]    — classify the buffer by magic bytes, no client input
//! 3. [`classify`] — merge every hint with the sniff under fixed precedence
//! 4. [`artifact`] — persist decoded bytes for inspection, scoped release
//! 5. [`dispatch`] — route to the PDF or image branch, guarantee cleanup
//! 6. [`pdftext`]  — embedded-text extraction (PDF branch)
//! 7. [`assure`]   — validate/re-encode the image (image branch)

pub mod artifact;
pub mod assure;
pub mod classify;
pub mod codec;
pub mod dispatch;
pub mod pdftext;
pub mod sniff;
