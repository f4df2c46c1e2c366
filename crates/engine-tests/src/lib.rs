#![allow(dead_code)]

pub mod fakes;
pub mod scenarios;
pub mod utils;
