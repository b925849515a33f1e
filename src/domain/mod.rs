// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that name the concepts
// every other layer talks about: image samples, which dataset
// they came from, which backbone / head / distance an experiment
// uses.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO tensor math
//   - Only plain Rust structs, enums, and traits
//
// Keeping the experiment vocabulary free of Burn means the CLI,
// the config JSON and the data readers can all be tested
// without building a single tensor.
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// One decoded image with its class label
pub mod sample;

// Experiment vocabulary: dataset, backbone, head, distance, metric loss
pub mod kinds;

// Core abstractions (traits) that the data layer implements
pub mod traits;
