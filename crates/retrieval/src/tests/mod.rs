//! Cross-module scenarios: cascade ordering and response orchestration.

mod support;
