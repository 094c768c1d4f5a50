// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn model, loss and training code.
//
// What's in this layer:
//
//   backbone.rs   - ResNet v1 feature extractor
//                   Stem, four residual stages (basic or
//                   bottleneck units), global pool, linear head
//
//   splitter.rs   - Output splitter
//                   Turns the backbone's single [N, P*O] output
//                   into P per-position [N, O] logit tensors
//
//   model.rs      - CaptchaModel = backbone + splitter
//
//   evaluator.rs  - Composite per-position cross-entropy loss
//                   and per-position accuracy
//
//   trainer.rs    - The training loop
//                   Forward, loss, backward, Adam step,
//                   validation, metrics and checkpoint per epoch
//
//   inferencer.rs - Loads a checkpoint and reads the digits
//                   of a single image
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            He et al. (2016) Deep Residual Learning

/// ResNet v1 backbone
pub mod backbone;

/// Per-position output splitting
pub mod splitter;

/// CAPTCHA classifier architecture
pub mod model;

/// Composite loss and accuracy evaluators
pub mod evaluator;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine, loads checkpoint and predicts digits
pub mod inferencer;
