//! # Neural Network Layer Modules
//!
//! Contains implementations of common neural network layers (modules).

pub mod linear;
pub use linear::Linear;

pub mod activation;
pub use activation::{ReLU, Sigmoid, Tanh};

pub mod dropout;
pub use dropout::Dropout;
