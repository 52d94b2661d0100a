mod client_ctx;

pub use client_ctx::{ClientCtx, ME_SENTINEL};
