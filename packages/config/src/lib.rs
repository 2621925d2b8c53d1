// ABOUTME: Configuration constants shared across the social-login workspace
// ABOUTME: Exposes environment variable names and vendor SDK defaults

pub mod constants;
