//! Shared test fixtures of the launcher core
