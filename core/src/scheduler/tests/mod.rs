mod helpers;
mod lifecycle_tests;
