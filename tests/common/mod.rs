#![allow(dead_code)]

pub mod harness;
pub mod mocks;
pub mod vectors;
