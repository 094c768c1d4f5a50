// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish a
// specific goal (training or predicting).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern

// The training workflow
pub mod train_use_case;

// The single-image prediction workflow
pub mod predict_use_case;
