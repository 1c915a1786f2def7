//! HTTP clients for the third-party providers, each behind a trait so the
//! pipeline can run against fakes.

pub mod apify;
pub mod elevenlabs;
pub mod fal;
pub mod gemini;
