// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting persistence that the training and prediction
// workflows share:
//
//   checkpoint.rs - Saving and loading model weights
//                   Uses Burn's CompactRecorder to serialise
//                   model parameters to disk. Also saves/loads
//                   TrainConfig as JSON so prediction can
//                   rebuild the model.
//
//   metrics.rs    - Training metrics logging
//                   Writes epoch-level loss and per-position
//                   accuracy to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
