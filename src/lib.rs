// src/lib.rs

//! Tuition Crawler Library
//!
//! Harvests program listings from an admissions search site, fetches
//! each program's detail page and exports the results as CSV and XLSX.

pub mod browser;
pub mod error;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
