mod common;
mod harvest_tests;
