//! Tests for the frame evaluator
//!
//! Organized by feature area

mod helpers;
