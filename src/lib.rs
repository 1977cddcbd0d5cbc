use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod aggregate;
pub mod check;
pub mod common;
pub mod ddf;
pub mod loader;
pub mod pipeline;
pub mod resolver;
pub mod synonyms;
pub mod transform;
pub mod writer;
