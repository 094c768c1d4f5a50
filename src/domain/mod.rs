// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Pure Rust structs and traits that describe what a CAPTCHA
// sample IS, independent of how it is loaded or learned.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Image geometry, label shape, and the CaptchaLabel type
pub mod captcha;

// Which split of the dataset a sample belongs to
pub mod usage;

// Core abstractions (traits) that other layers implement
pub mod traits;
