// THEORY:
// `core_modules` holds the per-variant image math, leaf-first:
//   color_space -> pixel_buffer -> tolerance_mask / prng / gradient -> compositor.
// Nothing in here knows about batches, seeds lists or files; that is the job of
// `pipeline`, `parallel_pipeline` and `manifest` one layer up.

pub mod color_space;
pub mod compositor;
pub mod gradient;
pub mod pixel_buffer;
pub mod prng;
pub mod tolerance_mask;
pub mod utils;
